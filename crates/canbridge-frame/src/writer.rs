use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_envelope, CodecConfig};
use crate::envelope::Envelope;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete envelopes to any `Write` stream.
///
/// Every envelope is followed by a flush, so an abrupt exit loses at most the
/// envelope in flight.
pub struct EnvelopeWriter<T> {
    inner: T,
    buf: BytesMut,
    config: CodecConfig,
}

impl<T: Write> EnvelopeWriter<T> {
    /// Create a new envelope writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, CodecConfig::default())
    }

    /// Create a new envelope writer with explicit configuration.
    pub fn with_config(inner: T, config: CodecConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode, write and flush one envelope (blocking).
    pub fn write_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        self.buf.clear();
        encode_envelope(envelope, &mut self.buf)?;
        self.write_encoded()
    }

    fn write_encoded(&mut self) -> Result<()> {
        let body = self.buf.len().saturating_sub(crate::codec::HEADER_SIZE);
        if body > self.config.max_body_size {
            return Err(FrameError::PayloadTooLarge {
                size: body,
                max: self.config.max_body_size,
            });
        }

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::envelope::RECORDER_COMMAND;
    use crate::reader::EnvelopeReader;

    #[test]
    fn write_then_read_back() {
        let mut writer = EnvelopeWriter::new(Cursor::new(Vec::<u8>::new()));
        writer
            .write_envelope(&Envelope::new(RECORDER_COMMAND, &b"a"[..]))
            .unwrap();
        writer.write_envelope(&Envelope::new(77, &b"bc"[..])).unwrap();

        let bytes = writer.into_inner().into_inner();
        let types: Vec<i32> = EnvelopeReader::new(Cursor::new(bytes))
            .map(|env| env.unwrap().data_type)
            .collect();
        assert_eq!(types, vec![RECORDER_COMMAND, 77]);
    }

    #[test]
    fn every_envelope_is_flushed() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = EnvelopeWriter::new(sink);

        writer.write_envelope(&Envelope::new(1, &b"x"[..])).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn oversized_body_rejected() {
        let cfg = CodecConfig { max_body_size: 30 };
        let mut writer = EnvelopeWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);
        let err = writer
            .write_envelope(&Envelope::new(1, vec![0u8; 16]))
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn handles_interrupted_write() {
        let mut writer = EnvelopeWriter::new(InterruptedOnce {
            interrupted: false,
            data: Vec::new(),
        });
        writer.write_envelope(&Envelope::new(1, &b"retry"[..])).unwrap();
        assert!(!writer.into_inner().data.is_empty());
    }

    #[test]
    fn zero_write_is_connection_closed() {
        let mut writer = EnvelopeWriter::new(ZeroWriter);
        let err = writer.write_envelope(&Envelope::new(1, Vec::new())).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
