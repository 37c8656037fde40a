//! Operator selection of what to import
//!
//! Built from staged data for review, sent back with `do_import` flags
//! toggled, then consulted by the inclusion callback during the run.

use serde::{Deserialize, Serialize};

use super::{StagedChannel, StagedUser, UserKind};
use crate::error::ImportError;

/// Selection id of the pseudo-channel grouping every direct conversation
pub const DIRECT_MESSAGES_ID: &str = "__directMessages__";

/// Display name of the direct-message pseudo-channel
pub const DIRECT_MESSAGES_NAME: &str = "Direct Messages";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionUser {
    pub user_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_deleted: bool,
    pub is_bot: bool,
    pub do_import: bool,
}

impl From<&StagedUser> for SelectionUser {
    fn from(user: &StagedUser) -> Self {
        Self {
            user_id: user.primary_id().to_string(),
            username: user.username.clone(),
            email: user.emails.first().cloned(),
            is_deleted: user.deleted,
            is_bot: user.kind == UserKind::Bot,
            do_import: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionChannel {
    pub channel_id: String,
    pub name: Option<String>,
    pub is_archived: bool,
    pub do_import: bool,
    pub is_private: bool,
    pub is_direct: bool,
}

impl SelectionChannel {
    /// The pseudo-channel standing in for all direct conversations
    pub fn direct_messages() -> Self {
        Self {
            channel_id: DIRECT_MESSAGES_ID.to_string(),
            name: Some(DIRECT_MESSAGES_NAME.to_string()),
            is_archived: false,
            do_import: true,
            is_private: true,
            is_direct: true,
        }
    }
}

impl From<&StagedChannel> for SelectionChannel {
    fn from(channel: &StagedChannel) -> Self {
        Self {
            channel_id: channel.primary_id().to_string(),
            name: channel.name.clone(),
            is_archived: channel.archived,
            do_import: true,
            is_private: channel.room_type == super::RoomType::Private,
            is_direct: channel.is_direct(),
        }
    }
}

/// What the operator chose to import.
///
/// A missing list means "no filtering" for that record type; a present list
/// is default-deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub name: String,
    #[serde(default)]
    pub users: Option<Vec<SelectionUser>>,
    #[serde(default)]
    pub channels: Option<Vec<SelectionChannel>>,
    #[serde(default)]
    pub message_count: i64,
}

impl Selection {
    pub fn new(
        name: impl Into<String>,
        users: Vec<SelectionUser>,
        channels: Vec<SelectionChannel>,
        message_count: i64,
    ) -> Self {
        Self {
            name: name.into(),
            users: Some(users),
            channels: Some(channels),
            message_count,
        }
    }

    /// Both lists must be present before an import can start
    pub fn validate(&self, importer_name: &str) -> Result<(), ImportError> {
        if self.users.is_none() {
            return Err(ImportError::InvalidSelection(format!(
                "users list is missing from the {} selection",
                importer_name
            )));
        }
        if self.channels.is_none() {
            return Err(ImportError::InvalidSelection(format!(
                "channels list is missing from the {} selection",
                importer_name
            )));
        }
        Ok(())
    }

    /// Whether the staged user with this import id should be converted.
    ///
    /// `allow_all_when_empty` is set for the API-driven importer, whose
    /// callers send an empty user list to mean "everyone".
    pub fn includes_user(&self, user_id: &str, allow_all_when_empty: bool) -> bool {
        let Some(users) = &self.users else {
            return true;
        };
        if users.is_empty() && allow_all_when_empty {
            return true;
        }
        users
            .iter()
            .find(|user| user.user_id == user_id)
            .is_some_and(|user| user.do_import)
    }

    /// Whether the channel with this selection id should be converted
    pub fn includes_channel(&self, channel_id: &str) -> bool {
        let Some(channels) = &self.channels else {
            return true;
        };
        channels
            .iter()
            .find(|channel| channel.channel_id == channel_id)
            .is_some_and(|channel| channel.do_import)
    }
}
