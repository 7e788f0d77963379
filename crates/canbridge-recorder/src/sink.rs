use std::fs::File;
use std::path::{Path, PathBuf};

use canbridge_frame::{Envelope, EnvelopeWriter};
use tracing::{info, warn};

use crate::error::{RecorderError, Result};

/// An append-only recording file.
///
/// Every append is written and flushed before returning. Only one sink should
/// be open at a time; enforcing that is up to the owner.
pub struct RecordingSink {
    path: PathBuf,
    writer: Option<EnvelopeWriter<File>>,
    appended: u64,
}

impl RecordingSink {
    /// Create the file at `path`, truncating any existing file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| RecorderError::Open {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "created recording");
        Ok(Self {
            path,
            writer: Some(EnvelopeWriter::new(file)),
            appended: 0,
        })
    }

    /// Append one envelope and flush.
    pub fn append(&mut self, envelope: &Envelope) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(RecorderError::SinkClosed)?;
        writer.write_envelope(envelope)?;
        self.appended += 1;
        Ok(())
    }

    /// Flush buffered data, if open.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush and close. Closing a closed sink is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush()?;
        drop(writer);
        info!(path = %self.path.display(), envelopes = self.appended, "closed recording");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Envelopes appended so far.
    pub fn appended(&self) -> u64 {
        self.appended
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(path = %self.path.display(), error = %err, "closing recording failed");
        }
    }
}

impl std::fmt::Debug for RecordingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSink")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("appended", &self.appended)
            .finish()
    }
}
