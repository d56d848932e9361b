//! Watch a document and rerun an operation whenever it is saved.
//!
//! The parent directory is watched rather than the file itself so that
//! editors which save by replacing the file keep triggering events. Events
//! that arrive while the operation runs (including the ones caused by the
//! operation's own writes) are discarded.

use crate::config::WatchSettings;
use crate::operation::OperationError;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Watch loop settings.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Delay between a change event and the operation.
    pub debounce: Duration,
    /// Number of operations after which watching stops.
    pub max_cycles: u32,
}

impl From<&WatchSettings> for WatchOptions {
    fn from(settings: &WatchSettings) -> Self {
        Self {
            debounce: Duration::from_millis(settings.debounce_ms),
            max_cycles: settings.max_cycles,
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::from(&WatchSettings::default())
    }
}

/// Why the watch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// The cycle limit was reached.
    MaxCycles(u32),
    /// Ctrl-C (or SIGTERM on Unix) was received.
    Interrupted,
    /// The file system watcher stopped delivering events.
    WatcherClosed,
}

/// Whether `event` is a content change of `target`.
pub fn is_relevant(event: &Event, target: &Path) -> bool {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return false;
    }
    let Some(name) = target.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}

fn create_watcher(
    target: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
) -> Result<RecommendedWatcher, WatchError> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default(),
    )?;

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
///
/// The handlers are installed before this returns, so a signal arriving
/// before the future is first polled is not lost.
#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        let _ = tokio::signal::ctrl_c().await;
    })
}

/// Watch `path` and call `on_change` after each save, until Ctrl-C or
/// SIGTERM.
///
/// Failures of `on_change` are logged and watching continues.
pub async fn watch_file<F, Fut>(
    path: &Path,
    options: WatchOptions,
    on_change: F,
) -> Result<WatchExit, WatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), OperationError>>,
{
    let shutdown = shutdown_signal().map_err(WatchError::Signal)?;
    watch_file_until(path, options, shutdown, on_change).await
}

/// Like [`watch_file`], but stops when `shutdown` resolves.
pub async fn watch_file_until<F, Fut, S>(
    path: &Path,
    options: WatchOptions,
    shutdown: S,
    mut on_change: F,
) -> Result<WatchExit, WatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), OperationError>>,
    S: Future<Output = ()>,
{
    if !path.exists() {
        return Err(WatchError::NotFound(path.to_path_buf()));
    }

    let (tx, mut rx) = mpsc::channel(256);
    let _watcher = create_watcher(path, tx)?;

    info!(file = %path.display(), "file watching started");
    info!("press Ctrl+C to exit");

    tokio::pin!(shutdown);

    let mut cycles = 0u32;

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            () = &mut shutdown => {
                info!("received signal to terminate");
                return Ok(WatchExit::Interrupted);
            }
        };

        let event = match event {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                error!(error = %e, "watcher error");
                continue;
            }
            None => return Ok(WatchExit::WatcherClosed),
        };

        if !is_relevant(&event, path) {
            continue;
        }

        cycles += 1;
        if cycles > options.max_cycles {
            info!(cycles = options.max_cycles, "maximum cycles reached");
            return Ok(WatchExit::MaxCycles(options.max_cycles));
        }

        info!(file = %path.display(), cycle = cycles, "file changed");
        tokio::time::sleep(options.debounce).await;

        match on_change().await {
            Ok(()) => info!("operation completed"),
            Err(e) => warn!(error = %e, "operation failed"),
        }

        while rx.try_recv().is_ok() {}
    }
}

/// Errors from watch mode.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}
