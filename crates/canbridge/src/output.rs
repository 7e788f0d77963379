use std::io::IsTerminal;

use canbridge_frame::{data_type_name, Envelope};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One recorded envelope, flattened for printing.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EnvelopeRow {
    pub index: usize,
    pub data_type: i32,
    pub data_type_name: &'static str,
    pub sender_stamp: u32,
    pub sent: String,
    pub sample_time: String,
    pub payload_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u8>,
    pub payload: String,
}

impl EnvelopeRow {
    pub fn new(index: usize, envelope: &Envelope) -> Self {
        let (can_id, length, payload) = match envelope.frame_record() {
            Ok(record) => (
                Some(format!("0x{:x}", record.can_id)),
                Some(record.length),
                format!("0x{:x}", record.data()),
            ),
            Err(_) => (None, None, payload_preview(envelope.payload.as_ref())),
        };
        Self {
            index,
            data_type: envelope.data_type,
            data_type_name: data_type_name(envelope.data_type),
            sender_stamp: envelope.sender_stamp,
            sent: envelope.sent.to_string(),
            sample_time: envelope.sample_time.to_string(),
            payload_size: envelope.payload.len(),
            can_id,
            length,
            payload,
        }
    }
}

pub fn print_rows(rows: &[EnvelopeRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "TYPE", "SENDER", "SAMPLE TIME", "ID", "LEN", "PAYLOAD"]);
            for row in rows {
                table.add_row(vec![
                    row.index.to_string(),
                    row.data_type_name.to_string(),
                    row.sender_stamp.to_string(),
                    row.sample_time.clone(),
                    row.can_id.clone().unwrap_or_default(),
                    row.length.map(|l| l.to_string()).unwrap_or_default(),
                    row.payload.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!("{}", pretty_line(row));
            }
        }
    }
}

fn pretty_line(row: &EnvelopeRow) -> String {
    match (&row.can_id, row.length) {
        (Some(id), Some(length)) => format!(
            "#{} {} sender={} sample={} id={} [{}] {}",
            row.index,
            row.data_type_name,
            row.sender_stamp,
            row.sample_time,
            id,
            length,
            row.payload
        ),
        _ => format!(
            "#{} {} ({}) sender={} sample={} size={} payload={}",
            row.index,
            row.data_type_name,
            row.data_type,
            row.sender_stamp,
            row.sample_time,
            row.payload_size,
            row.payload
        ),
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}
