//! Channel list parsing.
//!
//! The list has the form `device:id[,device:id]*`, e.g. `can0:0,can1:1`.

use tracing::debug;

/// One well-formed `device:id` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Interface name, e.g. `can0` or `vcan0`.
    pub name: String,
    /// Sender identity attached to every frame read from this channel.
    pub sender_id: u32,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>, sender_id: u32) -> Self {
        Self {
            name: name.into(),
            sender_id,
        }
    }
}

/// Parse a comma-separated channel list.
///
/// Items that are not exactly two colon-separated tokens, have an empty device
/// name, or carry a sender id that is not a `u32` are skipped. Well-formed
/// items keep their relative order.
pub fn parse_channel_list(list: &str) -> Vec<ChannelSpec> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            let spec = parse_item(item);
            if spec.is_none() {
                debug!(item, "skipping malformed channel entry");
            }
            spec
        })
        .collect()
}

fn parse_item(item: &str) -> Option<ChannelSpec> {
    let mut tokens = item.split(':');
    let name = tokens.next()?;
    let id = tokens.next()?;
    if tokens.next().is_some() || name.is_empty() {
        return None;
    }
    let sender_id = id.parse::<u32>().ok()?;
    Some(ChannelSpec::new(name, sender_id))
}
