//! Recording sink and remote recording control.
//!
//! A [`Recorder`] owns the single active [`RecordingSink`] behind one lock and
//! decides, per frame, whether it is recorded or published. In remote mode it
//! also interprets start/stop commands arriving from the session.

pub mod error;
pub mod naming;
pub mod recorder;
pub mod sink;

pub use error::{RecorderError, Result};
pub use naming::{local_now, timestamp_name, Clock, FileNaming};
pub use recorder::{Recorder, RecorderMode, RecorderStats, RecordingState, Route};
pub use sink::RecordingSink;
