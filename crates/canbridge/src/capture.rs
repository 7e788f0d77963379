//! The capture multiplexer.
//!
//! One thread waits for readiness across every channel endpoint, reads one
//! frame per ready endpoint, and routes each decoded frame either to the
//! active recording or to the session. The loop ends when the session stops
//! running.

use std::sync::Arc;
use std::time::Duration;

use canbridge_frame::{decode_frame, FrameRecord, TimeStamp};
use canbridge_recorder::{Recorder, Route};
use canbridge_session::Session;
use canbridge_transport::{wait_readable, ChannelEndpoint, Result};
use tracing::{debug, info, trace, warn};

/// Capture loop settings.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Upper bound on one readiness wait; also bounds shutdown latency.
    pub poll_timeout: Duration,
    /// Print one diagnostic line per frame to stdout.
    pub verbose: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            verbose: false,
        }
    }
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub recorded: u64,
    pub published: u64,
    pub short_reads: u64,
    pub read_errors: u64,
    pub fallback_timestamps: u64,
    pub publish_errors: u64,
}

/// Single-threaded capture loop over a fixed set of endpoints.
pub struct CaptureLoop<S: Session> {
    endpoints: Vec<ChannelEndpoint>,
    session: S,
    recorder: Arc<Recorder>,
    config: CaptureConfig,
    stats: CaptureStats,
}

impl<S: Session> CaptureLoop<S> {
    pub fn new(
        endpoints: Vec<ChannelEndpoint>,
        session: S,
        recorder: Arc<Recorder>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            endpoints,
            session,
            recorder,
            config,
            stats: CaptureStats::default(),
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Run until the session stops. Returns immediately with no endpoints.
    ///
    /// Only a failing readiness wait is fatal; per-frame problems are counted
    /// and skipped.
    pub fn run(&mut self) -> Result<CaptureStats> {
        if self.endpoints.is_empty() {
            warn!("no channels to capture from");
            return Ok(self.stats);
        }
        info!(channels = self.endpoints.len(), "capture started");

        while self.session.is_running() {
            let ready = wait_readable(&self.endpoints, self.config.poll_timeout)?;
            for index in ready {
                self.service(index);
            }
        }

        info!(
            frames = self.stats.frames,
            recorded = self.stats.recorded,
            published = self.stats.published,
            "capture stopped"
        );
        Ok(self.stats)
    }

    /// Consume the loop, handing back its endpoints.
    pub fn into_endpoints(self) -> Vec<ChannelEndpoint> {
        self.endpoints
    }

    fn service(&mut self, index: usize) {
        let Some(endpoint) = self.endpoints.get(index) else {
            return;
        };

        let raw = match endpoint.read_frame() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.stats.short_reads += 1;
                return;
            }
            Err(err) => {
                debug!(device = endpoint.name(), error = %err, "read failed");
                self.stats.read_errors += 1;
                return;
            }
        };

        let capture_time = match endpoint.receive_timestamp() {
            Ok(since_epoch) => TimeStamp::from(since_epoch),
            Err(err) => {
                trace!(device = endpoint.name(), error = %err, "using wall-clock timestamp");
                self.stats.fallback_timestamps += 1;
                TimeStamp::now()
            }
        };

        let record = decode_frame(&raw, capture_time);
        let sender = endpoint.sender_id();
        self.stats.frames += 1;

        if self.config.verbose {
            println!("{}", verbose_line(endpoint.name(), &record, sender));
        }

        match self.recorder.route_frame(&record, sender) {
            Route::Recorded => self.stats.recorded += 1,
            Route::Publish => match self.session.send(&record, capture_time, sender) {
                Ok(()) => self.stats.published += 1,
                Err(err) => {
                    warn!(device = endpoint.name(), error = %err, "publish failed");
                    self.stats.publish_errors += 1;
                }
            },
        }
    }
}

impl<S: Session> std::fmt::Debug for CaptureLoop<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLoop")
            .field("endpoints", &self.endpoints)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}

/// `can0 0x100 [2] 0xbbaa (ID = 0)`
pub fn verbose_line(device: &str, record: &FrameRecord, sender: u32) -> String {
    format!(
        "{device} 0x{:x} [{}] 0x{:x} (ID = {sender})",
        record.can_id,
        record.length,
        record.data()
    )
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixDatagram;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use canbridge_frame::{Envelope, EnvelopeReader};
    use canbridge_recorder::RecorderMode;
    use canbridge_session::SessionError;
    use canbridge_transport::CAN_MTU;

    use super::*;

    /// Session that stays up for a fixed number of loop iterations.
    #[derive(Default)]
    struct MockSession {
        iterations: AtomicUsize,
        fail_sends: bool,
        sent: Mutex<Vec<(FrameRecord, TimeStamp, u32)>>,
    }

    impl MockSession {
        fn running_for(iterations: usize) -> Arc<Self> {
            Arc::new(Self {
                iterations: AtomicUsize::new(iterations),
                ..Self::default()
            })
        }

        fn sent(&self) -> Vec<(FrameRecord, TimeStamp, u32)> {
            let mut sent = self.sent.lock().unwrap().clone();
            sent.sort_by_key(|(_, _, sender)| *sender);
            sent
        }
    }

    impl Session for MockSession {
        fn is_running(&self) -> bool {
            self.iterations
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }

        fn send(
            &self,
            record: &FrameRecord,
            sample_time: TimeStamp,
            sender_stamp: u32,
        ) -> canbridge_session::Result<()> {
            if self.fail_sends {
                return Err(SessionError::Stopped);
            }
            self.sent
                .lock()
                .unwrap()
                .push((*record, sample_time, sender_stamp));
            Ok(())
        }
    }

    fn channel(name: &str, sender_id: u32) -> (UnixDatagram, ChannelEndpoint) {
        let (tx, rx) = UnixDatagram::pair().unwrap();
        (tx, ChannelEndpoint::from_fd(name, sender_id, OwnedFd::from(rx)))
    }

    fn raw_frame(can_id: u32, data: &[u8]) -> [u8; CAN_MTU] {
        let mut raw = [0u8; CAN_MTU];
        raw[..4].copy_from_slice(&can_id.to_ne_bytes());
        raw[4] = data.len() as u8;
        raw[8..8 + data.len()].copy_from_slice(data);
        raw
    }

    fn live() -> Arc<Recorder> {
        Arc::new(Recorder::new(RecorderMode::Live).unwrap())
    }

    fn quick() -> CaptureConfig {
        CaptureConfig {
            poll_timeout: Duration::from_millis(50),
            verbose: false,
        }
    }

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "canbridge-capture-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn two_channels_publish_tagged_frames() {
        let (tx0, can0) = channel("can0", 0);
        let (tx1, can1) = channel("can1", 1);
        tx0.send(&raw_frame(0x100, &[0xAA, 0xBB])).unwrap();
        tx1.send(&raw_frame(0x200, &[])).unwrap();

        let session = MockSession::running_for(1);
        let mut capture = CaptureLoop::new(vec![can0, can1], Arc::clone(&session), live(), quick());
        let stats = capture.run().unwrap();

        let sent = session.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0.can_id, 0x100);
        assert_eq!(sent[0].0.data(), 0x0000_0000_0000_BBAA);
        assert_eq!(sent[0].2, 0);
        assert_eq!(sent[1].0.can_id, 0x200);
        assert_eq!(sent[1].0.data(), 0);
        assert_eq!(sent[1].2, 1);
        // The sample time handed to the session is the capture time.
        assert_eq!(sent[0].1, sent[0].0.capture_time);

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.recorded, 0);
        // Unix sockets have no kernel receive stamp.
        assert_eq!(stats.fallback_timestamps, 2);
    }

    #[test]
    fn short_reads_are_discarded() {
        let (tx, can0) = channel("can0", 4);
        tx.send(&[1, 2, 3, 4, 5]).unwrap();
        tx.send(&raw_frame(0x7FF, &[1])).unwrap();

        let session = MockSession::running_for(2);
        let mut capture = CaptureLoop::new(vec![can0], Arc::clone(&session), live(), quick());
        let stats = capture.run().unwrap();

        assert_eq!(stats.short_reads, 1);
        assert_eq!(stats.frames, 1);
        assert_eq!(session.sent()[0].0.can_id, 0x7FF);
    }

    #[test]
    fn recording_takes_frames_away_from_session() {
        let dir = unique_temp_dir("record");
        let path = dir.join("fixed.rec");
        let recorder = Arc::new(Recorder::new(RecorderMode::Fixed(path.clone())).unwrap());

        let (tx0, can0) = channel("can0", 0);
        let (tx1, can1) = channel("can1", 1);
        tx0.send(&raw_frame(0x100, &[0xAA, 0xBB])).unwrap();
        tx1.send(&raw_frame(0x200, &[])).unwrap();

        let session = MockSession::running_for(1);
        let mut capture = CaptureLoop::new(
            vec![can0, can1],
            Arc::clone(&session),
            Arc::clone(&recorder),
            quick(),
        );
        let stats = capture.run().unwrap();
        recorder.close();

        assert!(session.sent().is_empty());
        assert_eq!(stats.recorded, 2);
        assert_eq!(stats.published, 0);

        let envelopes: Vec<Envelope> = EnvelopeReader::new(File::open(&path).unwrap())
            .collect::<canbridge_frame::Result<_>>()
            .unwrap();
        let mut ids: Vec<u32> = envelopes
            .iter()
            .map(|env| env.frame_record().unwrap().can_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0x100, 0x200]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn publish_failures_are_counted_and_skipped() {
        let (tx, can0) = channel("can0", 0);
        tx.send(&raw_frame(1, &[])).unwrap();
        tx.send(&raw_frame(2, &[])).unwrap();

        let session = Arc::new(MockSession {
            iterations: AtomicUsize::new(2),
            fail_sends: true,
            ..MockSession::default()
        });
        let mut capture = CaptureLoop::new(vec![can0], session, live(), quick());
        let stats = capture.run().unwrap();

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.publish_errors, 2);
        assert_eq!(stats.published, 0);
    }

    #[test]
    fn empty_channel_list_returns_immediately() {
        let session = MockSession::running_for(usize::MAX);
        let mut capture = CaptureLoop::new(Vec::new(), Arc::clone(&session), live(), quick());
        assert_eq!(capture.run().unwrap(), CaptureStats::default());
    }

    #[test]
    fn stopped_session_ends_loop_without_reading() {
        let (tx, can0) = channel("can0", 0);
        tx.send(&raw_frame(1, &[])).unwrap();

        let session = MockSession::running_for(0);
        let mut capture = CaptureLoop::new(vec![can0], Arc::clone(&session), live(), quick());
        assert_eq!(capture.run().unwrap().frames, 0);
        assert_eq!(capture.into_endpoints().len(), 1);
    }

    #[test]
    fn idle_iterations_wait_for_the_timeout() {
        let (_tx, can0) = channel("can0", 0);
        let session = MockSession::running_for(2);
        let mut capture = CaptureLoop::new(vec![can0], session, live(), quick());

        let started = std::time::Instant::now();
        let stats = capture.run().unwrap();
        assert_eq!(stats.frames, 0);
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn verbose_line_uses_unpadded_hex() {
        let record = FrameRecord::new(0x100, &[0xAA, 0xBB], TimeStamp::default());
        assert_eq!(verbose_line("can0", &record, 0), "can0 0x100 [2] 0xbbaa (ID = 0)");

        let empty = FrameRecord::new(0x200, &[], TimeStamp::default());
        assert_eq!(verbose_line("can1", &empty, 1), "can1 0x200 [0] 0x0 (ID = 1)");
    }
}
