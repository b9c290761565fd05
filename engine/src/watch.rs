//! Filesystem watcher driving incremental re-scans.
//!
//! Watches the workspace root for change events, debounces them, and runs an
//! incremental scan once the filesystem goes quiet. Events under ignored or
//! hidden-denied paths are dropped before they can schedule work (the cache
//! directory writes itself on every scan and must never retrigger one).

use crate::cancel::CancelToken;
use crate::scan::{IncrementalResult, Scanner};
use crate::walk::{event_path_excluded, IgnorePatterns};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Debounce window: wait this long after the last event before scanning.
const DEBOUNCE_MS: u64 = 500;

/// Start watching the scanner's workspace. Returns the watcher handle (must
/// be kept alive — dropping it stops the watcher). `on_delta` receives every
/// non-empty incremental result.
pub fn start_watcher<F>(
    root: &Path,
    scanner: Arc<Scanner>,
    ignore_patterns: Vec<String>,
    cancel: CancelToken,
    on_delta: F,
) -> Option<RecommendedWatcher>
where
    F: Fn(IncrementalResult) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Event>();

    let mut watcher = match RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            warn!("failed to create file watcher: {e}");
            return None;
        }
    };

    if let Err(e) = watcher.watch(root, RecursiveMode::Recursive) {
        warn!("failed to watch {}: {e}", root.display());
        return None;
    }
    info!("watching {}", root.display());

    let root = root.to_path_buf();
    std::thread::spawn(move || {
        debounce_loop(rx, root, scanner, ignore_patterns, cancel, on_delta);
    });

    Some(watcher)
}

/// Collect events and run a scan after a debounce period of quiet.
fn debounce_loop<F>(
    rx: mpsc::Receiver<Event>,
    root: PathBuf,
    scanner: Arc<Scanner>,
    ignore_patterns: Vec<String>,
    cancel: CancelToken,
    on_delta: F,
) where
    F: Fn(IncrementalResult),
{
    let patterns = IgnorePatterns::new(&ignore_patterns);
    let mut pending_since: Option<Instant> = None;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        match rx.recv_timeout(Duration::from_millis(DEBOUNCE_MS)) {
            Ok(event) => {
                let relevant = matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                );
                if !relevant {
                    continue;
                }
                let any_in_scope = event
                    .paths
                    .iter()
                    .any(|path| !event_path_excluded(&root, path, &patterns));
                if any_in_scope {
                    pending_since = Some(Instant::now());
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let Some(since) = pending_since else {
                    continue;
                };
                if since.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
                    continue;
                }
                pending_since = None;

                match scanner.scan_incremental(&cancel) {
                    Ok(result) if result.unchanged => {}
                    Ok(result) => {
                        info!(
                            changed = result.changed_files.len(),
                            new = result.new_files.len(),
                            deleted = result.deleted_files.len(),
                            "watch rescan"
                        );
                        on_delta(result);
                    }
                    Err(crate::error::ScanError::Cancelled) => return,
                    Err(e) => warn!("watch rescan failed: {e}"),
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}
