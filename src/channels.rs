use thingbuf::mpsc::errors::{TryRecvError, TrySendError};
use thingbuf::mpsc::{Receiver, Sender};

use crate::output::{UploadOutcome, UploadRequest};

/// The control loop's view of the upload collaborator. Neither call may block.
pub trait Uploader {
    /// Hands a request over. Returns false if it could not be queued.
    fn submit(&mut self, request: UploadRequest) -> bool;

    /// Next finished upload, if any.
    fn poll_outcome(&mut self) -> Option<UploadOutcome>;
}

impl<U: Uploader + ?Sized> Uploader for &mut U {
    fn submit(&mut self, request: UploadRequest) -> bool {
        (**self).submit(request)
    }

    fn poll_outcome(&mut self) -> Option<UploadOutcome> {
        (**self).poll_outcome()
    }
}

/// Bounded queues to and from the upload task.
pub struct QueuedUploader {
    pub requests: Sender<Option<UploadRequest>>,
    pub outcomes: Receiver<UploadOutcome>,
}

impl Uploader for QueuedUploader {
    fn submit(&mut self, request: UploadRequest) -> bool {
        match self.requests.try_send(Some(request)) {
            Ok(_) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Upload queue full, dropping request");
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::warn!("Upload task gone, dropping request");
                false
            }
            Err(_) => false,
        }
    }

    fn poll_outcome(&mut self) -> Option<UploadOutcome> {
        match self.outcomes.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
            Err(_) => None,
        }
    }
}
