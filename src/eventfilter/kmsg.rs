use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Callback invoked serially, from a single background task, with each
/// decoded line (spec.md §4.3: "`on_line` is invoked serially from a single
/// task"). Synchronous because an `EventFilter::match_line` call is itself
/// synchronous; a handler that needs to do async work should hand the line
/// off to a channel rather than block this callback.
pub type LineHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Strips a `/dev/kmsg`-style envelope (`<pri>,<seq>,<ts>,<flags>;message`)
/// down to the message, returning the input unchanged if no `;` is present.
#[must_use]
pub fn strip_envelope(raw: &str) -> &str {
    raw.split_once(';').map_or(raw, |(_, message)| message)
}

/// Tails a byte stream formatted like `/dev/kmsg`, delivering each decoded
/// line to a handler from a background task (spec.md §4.3).
///
/// `tail_only` records whether this reader was configured for `skipPercent
/// == 100` (spec.md §9: treated as boolean, not a real percentage). Seeking
/// a real file to its end for tail-only mode is the caller's job — done
/// once, before calling `start`, on whatever concrete `std::fs::File` or
/// similar backs `reader` — since a generic `AsyncRead` has no seek
/// capability to rely on for the non-seekable sources (pipes, test
/// buffers) this type also needs to support.
pub struct KmsgReader {
    tail_only: bool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl KmsgReader {
    pub fn new(tail_only: bool) -> Self {
        Self {
            tail_only,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn tail_only(&self) -> bool {
        self.tail_only
    }

    /// Spawns the background reader task. Idempotent only in the sense that
    /// a second call spawns a second task against a second `reader` — callers
    /// own at most one `KmsgReader` per stream, matching the Component
    /// singleton discipline (spec.md §9).
    pub fn start<R>(&self, reader: R, on_line: LineHandler)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                tokio::select! {
                    next = lines.next_line() => match next {
                        Ok(Some(raw)) => on_line(strip_envelope(&raw)),
                        Ok(None) => break,
                        Err(err) => {
                            warn!(error = %err, "kmsg reader I/O error, stopping");
                            break;
                        }
                    },
                    () = cancel.cancelled() => break,
                }
            }
        });
        *self.task.lock() = Some(handle);
    }

    /// Closes the signalling channel and waits (bounded) for the reader task
    /// to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(2), handle).await.is_err() {
                warn!("timed out waiting for kmsg reader task to stop");
            }
        }
    }
}
