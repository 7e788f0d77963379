use std::sync::Arc;

use canbridge_frame::{Envelope, FrameRecord, TimeStamp};

use crate::error::Result;

/// Callback invoked for every inbound envelope, on the session's own thread.
pub type EnvelopeHandler = Arc<dyn Fn(Envelope) + Send + Sync>;

/// The pub/sub collaborator frames are published to when not recording.
pub trait Session: Send + Sync {
    /// Whether the session is still alive. Polled once per capture iteration.
    fn is_running(&self) -> bool;

    /// Publish one frame tagged with its sample time and sender identity.
    fn send(&self, record: &FrameRecord, sample_time: TimeStamp, sender_stamp: u32) -> Result<()>;
}

impl<S: Session + ?Sized> Session for Arc<S> {
    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn send(&self, record: &FrameRecord, sample_time: TimeStamp, sender_stamp: u32) -> Result<()> {
        (**self).send(record, sample_time, sender_stamp)
    }
}
