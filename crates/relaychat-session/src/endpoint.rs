//! Endpoint address construction.

use relaychat_core::ChannelId;

/// Build the channel-scoped endpoint: `base + "/" + channel`.
///
/// Trailing slashes on `base` are dropped so the join never produces `//`.
pub fn endpoint_address(base: &str, channel: &ChannelId) -> String {
    format!("{}/{}", base.trim_end_matches('/'), channel.as_str())
}
