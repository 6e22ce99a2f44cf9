//! Backpressured handoff channel connecting the pipeline stages.
//!
//! A [`Pipe`] holds at most one item in flight. Senders wait until the slot
//! is free, which bounds the memory of the whole pipeline by the number of
//! stages rather than by the number of rows.
//!
//! A pipe has three states:
//!
//! - `Open`: items flow.
//! - `Closed`: no more sends; receivers drain what is buffered, then see
//!   end-of-stream.
//! - `Failed`: sends fail fast and every receive returns the stored error.
//!
//! Both terminal states are final; the first terminal transition wins.
//!
//! Every blocking operation also observes a [`CancellationToken`] and returns
//! [`ExportError::Cancelled`] once it fires.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::error_handling::ExportError;

#[derive(Debug)]
enum PipeState {
    Open,
    Closed,
    Failed(ExportError),
}

struct Inner<T> {
    state: PipeState,
    // Dropped on the first terminal transition so receivers observe the end
    // of the stream once in-flight sends have finished.
    sender: Option<mpsc::Sender<T>>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    receiver: AsyncMutex<mpsc::Receiver<T>>,
    // Fires on any terminal transition.
    closed: CancellationToken,
    // Fires only on close_with_error.
    failed: CancellationToken,
}

/// Multi-producer, multi-consumer handoff queue with a single slot.
///
/// Cloning a `Pipe` yields another handle to the same channel.
pub struct Pipe<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Pipe<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send> Default for Pipe<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Pipe<T> {
    /// Creates an open pipe.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: PipeState::Open,
                    sender: Some(tx),
                }),
                receiver: AsyncMutex::new(rx),
                closed: CancellationToken::new(),
                failed: CancellationToken::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // The guarded state is valid even after a poisoning panic
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn terminal_error(&self) -> ExportError {
        match &self.lock().state {
            PipeState::Failed(err) => err.clone(),
            PipeState::Open | PipeState::Closed => ExportError::PipeClosed,
        }
    }

    fn stored_error(&self) -> Option<ExportError> {
        match &self.lock().state {
            PipeState::Failed(err) => Some(err.clone()),
            PipeState::Open | PipeState::Closed => None,
        }
    }

    /// Hands `item` to a consumer, waiting while the slot is occupied.
    ///
    /// # Errors
    ///
    /// - the stored error if the pipe was closed with an error
    /// - [`ExportError::PipeClosed`] if the pipe was closed normally
    /// - [`ExportError::Cancelled`] if `cancel` fires first
    ///
    /// The item is dropped on error.
    pub async fn send(&self, cancel: &CancellationToken, item: T) -> Result<(), ExportError> {
        let sender = {
            let inner = self.lock();
            match (&inner.state, &inner.sender) {
                (PipeState::Failed(err), _) => return Err(err.clone()),
                (PipeState::Closed, _) | (PipeState::Open, None) => {
                    return Err(ExportError::PipeClosed)
                }
                (PipeState::Open, Some(sender)) => sender.clone(),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExportError::Cancelled),
            _ = self.shared.closed.cancelled() => Err(self.terminal_error()),
            sent = sender.send(item) => sent.map_err(|_| ExportError::PipeClosed),
        }
    }

    /// Takes the next item.
    ///
    /// Returns `Ok(Some(item))` for an item, `Ok(None)` once the pipe was
    /// closed normally and drained.
    ///
    /// # Errors
    ///
    /// - the stored error, on every call, once the pipe was closed with an error
    /// - [`ExportError::Cancelled`] if `cancel` fires first
    pub async fn recv(&self, cancel: &CancellationToken) -> Result<Option<T>, ExportError> {
        if let Some(err) = self.stored_error() {
            return Err(err);
        }

        let next = async { self.shared.receiver.lock().await.recv().await };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExportError::Cancelled),
            _ = self.shared.failed.cancelled() => Err(self.terminal_error()),
            item = next => match item {
                Some(item) => Ok(Some(item)),
                None => match self.stored_error() {
                    Some(err) => Err(err),
                    None => Ok(None),
                },
            },
        }
    }

    /// Closes the pipe normally.
    ///
    /// Returns `false` if the pipe was already in a terminal state.
    pub fn close(&self) -> bool {
        let mut inner = self.lock();
        if !matches!(inner.state, PipeState::Open) {
            return false;
        }
        inner.state = PipeState::Closed;
        inner.sender = None;
        drop(inner);

        self.shared.closed.cancel();
        true
    }

    /// Closes the pipe with `err`.
    ///
    /// Returns `false` if the pipe was already in a terminal state, in which
    /// case `err` is discarded.
    pub fn close_with_error(&self, err: ExportError) -> bool {
        let mut inner = self.lock();
        if !matches!(inner.state, PipeState::Open) {
            return false;
        }
        inner.state = PipeState::Failed(err);
        inner.sender = None;
        drop(inner);

        self.shared.failed.cancel();
        self.shared.closed.cancel();
        true
    }

    /// True once the pipe reached a terminal state.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }
}
