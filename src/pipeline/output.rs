//! The byte stream handed to the caller of an export.
//!
//! The sink writes encoded chunks through an [`OutputWriter`]; the caller
//! reads them from a [`ReportStream`]. The supervisor keeps an
//! [`OutputCloser`] so the stream only ends once every stage has terminated,
//! and so a failed export ends the stream with its error instead of a clean
//! end-of-file.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error_handling::ExportError;

type Chunk = Result<Bytes, ExportError>;

// Terminal error of the export, yielded once the chunk channel is drained.
type FailureSlot = Arc<Mutex<Option<ExportError>>>;

/// Creates the three ends of an output stream.
///
/// Dropping the returned [`ReportStream`] cancels `scope`, which is how a
/// client disconnect tears the pipeline down.
pub(crate) fn output_stream(scope: CancellationToken) -> (OutputWriter, OutputCloser, ReportStream) {
    let (tx, rx) = mpsc::channel(1);
    let failure: FailureSlot = Arc::new(Mutex::new(None));
    (
        OutputWriter { tx: tx.clone() },
        OutputCloser {
            tx,
            failure: Arc::clone(&failure),
        },
        ReportStream {
            _cancel_on_drop: scope.drop_guard(),
            rx,
            failure,
        },
    )
}

/// Incremental CSV bytes of one export.
///
/// Yields `Ok(chunk)` until the export finishes. An export that failed or was
/// cancelled yields exactly one final `Err` after its last chunk, so a
/// truncated stream never looks like a complete one.
pub struct ReportStream {
    // Declared first so the scope is cancelled before the receiver closes.
    _cancel_on_drop: DropGuard,
    rx: mpsc::Receiver<Chunk>,
    failure: FailureSlot,
}

impl Stream for ReportStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match ready!(self.rx.poll_recv(cx)) {
            Some(chunk) => Poll::Ready(Some(chunk)),
            None => Poll::Ready(take_failure(&self.failure).map(Err)),
        }
    }
}

impl std::fmt::Debug for ReportStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportStream").finish_non_exhaustive()
    }
}

fn take_failure(slot: &FailureSlot) -> Option<ExportError> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

/// Sink-side handle.
pub(crate) struct OutputWriter {
    tx: mpsc::Sender<Chunk>,
}

impl OutputWriter {
    /// Writes one chunk, waiting while the reader is behind.
    pub(crate) async fn write(&self, cancel: &CancellationToken, chunk: Bytes) -> Result<(), ExportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExportError::Cancelled),
            sent = self.tx.send(Ok(chunk)) => sent.map_err(|_| {
                ExportError::Encoding("output stream closed by reader".to_string())
            }),
        }
    }
}

/// Supervisor-side handle. Dropping it (with the writer gone) ends the stream.
pub(crate) struct OutputCloser {
    tx: mpsc::Sender<Chunk>,
    failure: FailureSlot,
}

impl OutputCloser {
    /// Ends the stream cleanly.
    pub(crate) fn close(self) {
        drop(self.tx);
    }

    /// Ends the stream with `err`.
    ///
    /// Never blocks: the reader sees `err` after every chunk already queued.
    pub(crate) fn abort(self, err: ExportError) {
        *self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(err);
        drop(self.tx);
    }
}
