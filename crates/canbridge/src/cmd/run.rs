use canbridge_recorder::{FileNaming, RecorderMode};

use crate::cmd::RunArgs;
use crate::exit::CliResult;

#[cfg(target_os = "linux")]
pub fn run(args: RunArgs) -> CliResult<i32> {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use canbridge::capture::{CaptureConfig, CaptureLoop};
    use canbridge_recorder::Recorder;
    use canbridge_session::{SessionConfig, UdpSession};
    use canbridge_transport::{open_all, parse_channel_list};
    use tracing::{info, warn};

    use crate::cmd::parse_duration;
    use crate::exit::{
        recorder_error, session_error, transport_error, CliError, INTERNAL, SUCCESS,
    };

    let poll_timeout = parse_duration(&args.poll_timeout)?;
    let specs = parse_channel_list(&args.can_channels);
    if specs.is_empty() {
        warn!(list = %args.can_channels, "no usable channels configured");
    }

    // Channels first, so a bad device fails before anything touches the network.
    let endpoints =
        open_all(&specs).map_err(|err| transport_error("channel setup failed", err))?;

    let mode = recorder_mode(&args);
    let recorder = Arc::new(
        Recorder::new(mode).map_err(|err| recorder_error("recording setup failed", err))?,
    );

    let config = SessionConfig {
        port: args.port,
        ..SessionConfig::new(args.cid)
    };
    let opened = if recorder.is_remote() {
        let inbound = Arc::clone(&recorder);
        UdpSession::open_with_handler(&config, move |envelope| inbound.handle_envelope(envelope))
    } else {
        UdpSession::open(&config)
    };
    let session = Arc::new(opened.map_err(|err| session_error("session setup failed", err))?);

    let running: Arc<AtomicBool> = session.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    let capture_config = CaptureConfig {
        poll_timeout,
        verbose: args.verbose,
    };
    let mut capture = CaptureLoop::new(
        endpoints,
        Arc::clone(&session),
        Arc::clone(&recorder),
        capture_config,
    );
    let result = capture.run();

    drop(capture);
    session.stop();
    recorder.close();

    let stats = result.map_err(|err| transport_error("capture failed", err))?;
    let recorder_stats = recorder.stats();
    info!(
        frames = stats.frames,
        published = stats.published,
        recorded = stats.recorded,
        short_reads = stats.short_reads,
        publish_errors = stats.publish_errors,
        dropped = recorder_stats.dropped,
        recordings = recorder_stats.files_opened,
        "shutdown complete"
    );
    Ok(SUCCESS)
}

#[cfg(not(target_os = "linux"))]
pub fn run(_args: RunArgs) -> CliResult<i32> {
    Err(crate::exit::CliError::new(
        crate::exit::TRANSPORT_ERROR,
        "SocketCAN is not available on this platform",
    ))
}

/// `--remote` wins; `--rec` alone records one file for the whole run.
pub(crate) fn recorder_mode(args: &RunArgs) -> RecorderMode {
    let rec = args.rec.clone().filter(|name| !name.is_empty());
    if args.remote {
        return RecorderMode::Remote(
            FileNaming::new(rec, args.recsuffix.clone()).in_directory(&args.rec_dir),
        );
    }
    match rec {
        Some(name) => RecorderMode::Fixed(args.rec_dir.join(format!("{name}{}", args.recsuffix))),
        None => RecorderMode::Live,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn args(remote: bool, rec: Option<&str>, recsuffix: &str) -> RunArgs {
        RunArgs {
            cid: 111,
            can_channels: "can0:0".to_string(),
            remote,
            rec: rec.map(str::to_string),
            recsuffix: recsuffix.to_string(),
            rec_dir: PathBuf::from("/data"),
            verbose: false,
            port: canbridge_session::DEFAULT_PORT,
            poll_timeout: "1s".to_string(),
        }
    }

    #[test]
    fn neither_flag_is_live() {
        assert!(matches!(recorder_mode(&args(false, None, "")), RecorderMode::Live));
        assert!(matches!(
            recorder_mode(&args(false, Some(""), "-x")),
            RecorderMode::Live
        ));
    }

    #[test]
    fn rec_without_remote_is_fixed_with_suffix() {
        match recorder_mode(&args(false, Some("drive"), ".rec")) {
            RecorderMode::Fixed(path) => assert_eq!(path, PathBuf::from("/data/drive.rec")),
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn remote_keeps_base_name_and_directory() {
        match recorder_mode(&args(true, Some("drive"), "-a")) {
            RecorderMode::Remote(naming) => {
                assert_eq!(naming.base.as_deref(), Some("drive"));
                assert_eq!(naming.suffix, "-a");
                assert_eq!(naming.directory, PathBuf::from("/data"));
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn remote_without_rec_uses_timestamps() {
        match recorder_mode(&args(true, None, "")) {
            RecorderMode::Remote(naming) => assert!(naming.base.is_none()),
            other => panic!("unexpected mode {other:?}"),
        }
    }
}
