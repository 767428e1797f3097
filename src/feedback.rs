//! Status markers posted on the originating message
//!
//! Each handled message gets reactions describing its progress: a warning
//! when the first dispatch attempt failed and devices are being re-discovered,
//! then success or failure.

use crate::Result;
use crate::channels::{Channel, IncomingMessage};

/// Kind of status marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// First attempt failed, retrying with a refreshed fleet
    Warning,
    /// Every device spoke the command
    Success,
    /// Handling failed for good
    Failure,
}

/// Emoji names used for each marker kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSet {
    /// Emoji for [`Marker::Warning`]
    pub warning: String,
    /// Emoji for [`Marker::Success`]
    pub success: String,
    /// Emoji for [`Marker::Failure`]
    pub failure: String,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self {
            warning: "warning".to_string(),
            success: "sound".to_string(),
            failure: "no_entry_sign".to_string(),
        }
    }
}

impl MarkerSet {
    /// Emoji name for a marker kind
    #[must_use]
    pub fn emoji(&self, marker: Marker) -> &str {
        match marker {
            Marker::Warning => &self.warning,
            Marker::Success => &self.success,
            Marker::Failure => &self.failure,
        }
    }
}

/// Posts markers through a channel
pub struct Reporter<'a> {
    channel: &'a dyn Channel,
    markers: &'a MarkerSet,
}

impl<'a> Reporter<'a> {
    /// Create a reporter posting through `channel`
    #[must_use]
    pub fn new(channel: &'a dyn Channel, markers: &'a MarkerSet) -> Self {
        Self { channel, markers }
    }

    /// Attach `marker` to `message`
    ///
    /// Not deduplicated: marking twice posts twice.
    ///
    /// # Errors
    ///
    /// Returns error if the channel rejects the reaction
    pub async fn mark(&self, message: &IncomingMessage, marker: Marker) -> Result<()> {
        let emoji = self.markers.emoji(marker);
        tracing::debug!(
            channel = %message.channel_id,
            ts = %message.ts,
            ?marker,
            emoji,
            "posting marker"
        );
        self.channel
            .add_reaction(&message.channel_id, &message.ts, emoji)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_markers_match_emoji_names() {
        let set = MarkerSet::default();
        assert_eq!(set.emoji(Marker::Warning), "warning");
        assert_eq!(set.emoji(Marker::Success), "sound");
        assert_eq!(set.emoji(Marker::Failure), "no_entry_sign");
    }

    #[test]
    fn custom_markers() {
        let set = MarkerSet {
            success: "white_check_mark".to_string(),
            ..MarkerSet::default()
        };
        assert_eq!(set.emoji(Marker::Success), "white_check_mark");
        assert_eq!(set.emoji(Marker::Warning), "warning");
    }
}
