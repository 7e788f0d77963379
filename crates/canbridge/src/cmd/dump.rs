use std::fs::File;
use std::io::BufReader;

use canbridge_frame::EnvelopeReader;

use crate::cmd::DumpArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_rows, EnvelopeRow, OutputFormat};

/// Print every envelope in a recording, in file order.
///
/// Envelopes read before a decode failure are still printed.
pub fn run(args: DumpArgs, format: OutputFormat) -> CliResult<i32> {
    let file = File::open(&args.path)
        .map_err(|err| io_error(&format!("cannot open {}", args.path.display()), err))?;
    let mut reader = EnvelopeReader::new(BufReader::new(file));

    let mut rows = Vec::new();
    let mut failure = None;
    loop {
        match reader.read_envelope() {
            Ok(Some(envelope)) => rows.push(EnvelopeRow::new(rows.len(), &envelope)),
            Ok(None) => break,
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    print_rows(&rows, format);

    match failure {
        Some(err) => Err(frame_error(
            &format!(
                "{} is damaged after {} envelopes",
                args.path.display(),
                rows.len()
            ),
            err,
        )),
        None => Ok(SUCCESS),
    }
}
