use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod dump;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture CAN frames and publish or record them.
    Run(RunArgs),
    /// Print the envelopes stored in a recording.
    Dump(DumpArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Dump(args) => dump::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Session id; frames are published to multicast group 225.0.0.<CID>.
    #[arg(long, env = "CANBRIDGE_CID")]
    pub cid: u8,
    /// CAN devices with the sender id tagging their frames, e.g. can0:0,can1:1.
    #[arg(long, value_name = "LIST", env = "CANBRIDGE_CAN_CHANNELS")]
    pub can_channels: String,
    /// Start and stop recordings on remote recorder commands.
    #[arg(long)]
    pub remote: bool,
    /// Recording file name. Without --remote, records for the whole run.
    #[arg(long, value_name = "NAME")]
    pub rec: Option<String>,
    /// Suffix appended to recording file names.
    #[arg(long, value_name = "SUFFIX", default_value = "")]
    pub recsuffix: String,
    /// Directory recordings are created in.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub rec_dir: PathBuf,
    /// Print every received frame.
    #[arg(long)]
    pub verbose: bool,
    /// UDP port of the session.
    #[arg(long, default_value_t = canbridge_session::DEFAULT_PORT)]
    pub port: u16,
    /// Longest wait for channel readiness (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub poll_timeout: String,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Recording file to read.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }
}
