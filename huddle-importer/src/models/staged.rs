//! Staged import records
//!
//! Records parsed out of an export file and parked in the `import_data`
//! table until the converter turns them into live users, rooms and messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of staged record, stored in `import_data.data_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportRecordType {
    User,
    Channel,
    Message,
}

impl ImportRecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportRecordType::User => "user",
            ImportRecordType::Channel => "channel",
            ImportRecordType::Message => "message",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserKind {
    #[default]
    User,
    Bot,
}

impl UserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserKind::User => "user",
            UserKind::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    #[default]
    Public,
    Private,
    Direct,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Public => "public",
            RoomType::Private => "private",
            RoomType::Direct => "direct",
        }
    }
}

/// User as found in the export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedUser {
    /// Source-system identifiers; the first one is authoritative
    pub import_ids: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, rename = "type")]
    pub kind: UserKind,
}

impl StagedUser {
    pub fn primary_id(&self) -> &str {
        self.import_ids.first().map(String::as_str).unwrap_or_default()
    }
}

/// Channel (public, private or direct conversation) as found in the export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedChannel {
    pub import_ids: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, rename = "type")]
    pub room_type: RoomType,
    /// Member user import ids
    #[serde(default)]
    pub members: Vec<String>,
    /// Creator user import id
    #[serde(default)]
    pub creator: Option<String>,
}

impl StagedChannel {
    pub fn primary_id(&self) -> &str {
        self.import_ids.first().map(String::as_str).unwrap_or_default()
    }

    pub fn is_direct(&self) -> bool {
        self.room_type == RoomType::Direct
    }

    /// Id this channel is matched against in a selection.
    ///
    /// Direct conversations are selected as one group.
    pub fn selection_id(&self) -> &str {
        if self.is_direct() {
            crate::models::DIRECT_MESSAGES_ID
        } else {
            self.primary_id()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedMessage {
    pub import_ids: Vec<String>,
    /// Import id of the channel the message belongs to
    pub channel: String,
    /// Import id of the sending user
    pub sender: String,
    #[serde(default)]
    pub text: String,
    pub ts: DateTime<Utc>,
}

impl StagedMessage {
    pub fn primary_id(&self) -> &str {
        self.import_ids.first().map(String::as_str).unwrap_or_default()
    }
}

/// Any staged record
#[derive(Debug, Clone, PartialEq)]
pub enum StagedData {
    User(StagedUser),
    Channel(StagedChannel),
    Message(StagedMessage),
}

impl StagedData {
    pub fn record_type(&self) -> ImportRecordType {
        match self {
            StagedData::User(_) => ImportRecordType::User,
            StagedData::Channel(_) => ImportRecordType::Channel,
            StagedData::Message(_) => ImportRecordType::Message,
        }
    }

    pub fn import_ids(&self) -> &[String] {
        match self {
            StagedData::User(user) => &user.import_ids,
            StagedData::Channel(channel) => &channel.import_ids,
            StagedData::Message(message) => &message.import_ids,
        }
    }

    /// JSON payload stored in `import_data.data`
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            StagedData::User(user) => serde_json::to_string(user),
            StagedData::Channel(channel) => serde_json::to_string(channel),
            StagedData::Message(message) => serde_json::to_string(message),
        }
    }

    pub fn from_json(record_type: ImportRecordType, data: &str) -> serde_json::Result<Self> {
        Ok(match record_type {
            ImportRecordType::User => StagedData::User(serde_json::from_str(data)?),
            ImportRecordType::Channel => StagedData::Channel(serde_json::from_str(data)?),
            ImportRecordType::Message => StagedData::Message(serde_json::from_str(data)?),
        })
    }
}

/// A staged row together with its `import_data` id
#[derive(Debug, Clone)]
pub struct StagedEntry {
    pub id: Uuid,
    pub data: StagedData,
}
