//! Data exchanged with the messaging bridge.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Event on a client's QR pairing channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrEvent {
    /// A (possibly rotated) pairing code to show to the user.
    Code(String),
    /// The phone scanned the code and pairing succeeded.
    Success,
    /// All codes expired without being scanned.
    Timeout,
    /// Pairing failed for the given reason.
    Error(String),
}

impl QrEvent {
    /// Whether this event ends the pairing attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QrEvent::Code(_))
    }
}

impl fmt::Display for QrEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QrEvent::Code(_) => write!(f, "code"),
            QrEvent::Success => write!(f, "success"),
            QrEvent::Timeout => write!(f, "timeout"),
            QrEvent::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Event on a client's long-lived event stream.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A batch of conversation snapshots from history sync.
    HistorySync(Vec<Conversation>),
    /// The client is connected to the network.
    Connected,
    /// The device was logged out from the phone.
    LoggedOut,
}

/// Snapshot of one conversation delivered by history sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id (chat JID).
    pub id: String,
    /// Display name; group conversations carry the group subject.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

/// A single message inside a conversation snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: String,
    #[serde(default)]
    pub media: Option<MediaAttachment>,
}

/// Media carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    /// Original file name, or the base name of the bridge's local path.
    pub file_name: String,
    /// Opaque bridge handle passed back for download.
    #[serde(default)]
    pub handle: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

/// A group the account has joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub jid: String,
    pub name: String,
    #[serde(default)]
    pub topic: String,
}

/// App-state patch collections fetched after pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppStatePatch {
    CriticalBlock,
    CriticalUnblockLow,
    RegularHigh,
    Regular,
    RegularLow,
}

impl AppStatePatch {
    pub const ALL: [AppStatePatch; 5] = [
        AppStatePatch::CriticalBlock,
        AppStatePatch::CriticalUnblockLow,
        AppStatePatch::RegularHigh,
        AppStatePatch::Regular,
        AppStatePatch::RegularLow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatePatch::CriticalBlock => "critical_block",
            AppStatePatch::CriticalUnblockLow => "critical_unblock_low",
            AppStatePatch::RegularHigh => "regular_high",
            AppStatePatch::Regular => "regular",
            AppStatePatch::RegularLow => "regular_low",
        }
    }
}

impl fmt::Display for AppStatePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
