use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canbridge_frame::{Envelope, FrameRecord};
use canbridge_session::{RecorderCommand, RecordingRequest};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::naming::{local_now, Clock, FileNaming};
use crate::sink::RecordingSink;

/// How the process records.
#[derive(Debug, Clone)]
pub enum RecorderMode {
    /// Never record; every frame is published. Remote start/stop commands
    /// are ignored here; only [`RecorderMode::Remote`] listens for them.
    Live,
    /// Record to one file for the whole process lifetime.
    Fixed(PathBuf),
    /// Record on remote start/stop commands.
    Remote(FileNaming),
}

/// Current recording state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingState {
    NoRecording,
    Recording(PathBuf),
}

/// Where a frame went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Handed to the active sink (the write itself may have failed).
    Recorded,
    /// No sink is active; the caller publishes the frame.
    Publish,
}

/// Counters kept under the recorder lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Frames written to a sink.
    pub recorded: u64,
    /// Inbound non-command envelopes written to a sink.
    pub passed_through: u64,
    /// Appends that failed; the frame or envelope is lost.
    pub dropped: u64,
    pub files_opened: u64,
}

struct Inner {
    sink: Option<RecordingSink>,
    /// Set after a failed append until the next successful one.
    failing: bool,
    stats: RecorderStats,
}

/// Owner of the active recording sink.
///
/// The capture loop (via [`Recorder::route_frame`]) and the session's inbound
/// thread (via [`Recorder::handle_envelope`]) both go through the same lock,
/// held only for the duration of one sink operation.
pub struct Recorder {
    naming: Option<FileNaming>,
    clock: Clock,
    inner: Mutex<Inner>,
}

impl Recorder {
    /// Build a recorder for `mode`. A fixed recording is opened immediately.
    pub fn new(mode: RecorderMode) -> Result<Self> {
        match mode {
            RecorderMode::Live => Ok(Self::with_parts(None, None)),
            RecorderMode::Fixed(path) => {
                let sink = RecordingSink::open(path)?;
                let recorder = Self::with_parts(None, Some(sink));
                recorder.lock().stats.files_opened = 1;
                Ok(recorder)
            }
            RecorderMode::Remote(naming) => Ok(Self::with_parts(Some(naming), None)),
        }
    }

    fn with_parts(naming: Option<FileNaming>, sink: Option<RecordingSink>) -> Self {
        Self {
            naming,
            clock: Arc::new(local_now),
            inner: Mutex::new(Inner {
                sink,
                failing: false,
                stats: RecorderStats::default(),
            }),
        }
    }

    /// Replace the clock used to name remote recordings.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Whether start/stop commands are honoured.
    pub fn is_remote(&self) -> bool {
        self.naming.is_some()
    }

    pub fn state(&self) -> RecordingState {
        match &self.lock().sink {
            Some(sink) if sink.is_open() => RecordingState::Recording(sink.path().to_path_buf()),
            _ => RecordingState::NoRecording,
        }
    }

    pub fn stats(&self) -> RecorderStats {
        self.lock().stats
    }

    /// Record `record` if a sink is active, otherwise tell the caller to
    /// publish it. Exactly one of the two happens per frame.
    pub fn route_frame(&self, record: &FrameRecord, sender_stamp: u32) -> Route {
        let mut inner = self.lock();
        if !inner.sink.as_ref().is_some_and(RecordingSink::is_open) {
            return Route::Publish;
        }
        let envelope = Envelope::from_frame(record, sender_stamp);
        if inner.append(&envelope) {
            inner.stats.recorded += 1;
        }
        Route::Recorded
    }

    /// Inbound session callback.
    ///
    /// Recognised start/stop commands drive the state machine; everything else
    /// is persisted verbatim while recording. Outside remote mode inbound
    /// traffic is ignored.
    pub fn handle_envelope(&self, envelope: Envelope) {
        if !self.is_remote() {
            return;
        }

        let request = RecorderCommand::from_envelope(&envelope).and_then(|cmd| cmd.request());
        match request {
            Some(request) => {
                if let Err(err) = self.apply(request) {
                    warn!(error = %err, ?request, "recorder command failed");
                }
            }
            None => {
                let mut inner = self.lock();
                if inner.sink.as_ref().is_some_and(RecordingSink::is_open) {
                    if inner.append(&envelope) {
                        inner.stats.passed_through += 1;
                    }
                }
            }
        }
    }

    /// Apply a start or stop request.
    pub fn apply(&self, request: RecordingRequest) -> Result<RecordingState> {
        match request {
            RecordingRequest::Start => self.start().map(RecordingState::Recording),
            RecordingRequest::Stop => {
                self.stop()?;
                Ok(RecordingState::NoRecording)
            }
        }
    }

    /// Start a new recording, closing the current one first.
    pub fn start(&self) -> Result<PathBuf> {
        let path = match &self.naming {
            Some(naming) => naming.path(&(self.clock)()),
            None => {
                debug!("ignoring start outside remote mode");
                return match self.state() {
                    RecordingState::Recording(path) => Ok(path),
                    RecordingState::NoRecording => Err(crate::RecorderError::SinkClosed),
                };
            }
        };

        let mut inner = self.lock();
        inner.close_sink();
        let sink = RecordingSink::open(&path)?;
        inner.sink = Some(sink);
        inner.failing = false;
        inner.stats.files_opened += 1;
        Ok(path)
    }

    /// Stop the current recording. Stopping while not recording is a no-op.
    pub fn stop(&self) -> Result<()> {
        if !self.is_remote() {
            debug!("ignoring stop outside remote mode");
            return Ok(());
        }
        self.lock().close_sink();
        Ok(())
    }

    /// Close whatever sink is active, in any mode. Used at shutdown.
    pub fn close(&self) {
        self.lock().close_sink();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    /// Append to the open sink. Failures are counted and logged once per
    /// streak; the return value says whether the write landed.
    fn append(&mut self, envelope: &Envelope) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        match sink.append(envelope) {
            Ok(()) => {
                if self.failing {
                    info!(path = %sink.path().display(), "recording writes recovered");
                    self.failing = false;
                }
                true
            }
            Err(err) => {
                self.stats.dropped += 1;
                if !self.failing {
                    warn!(path = %sink.path().display(), error = %err, "recording write failed");
                    self.failing = true;
                }
                false
            }
        }
    }

    fn close_sink(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(err) = sink.close() {
                warn!(path = %sink.path().display(), error = %err, "closing recording failed");
            }
        }
        self.failing = false;
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("remote", &self.is_remote())
            .field("state", &self.state())
            .finish()
    }
}
