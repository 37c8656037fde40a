//! Import workflow type definitions
//!
//! Progress types shared between the importer and anything that renders its
//! progress (SSE clients, admin tooling).

use serde::{Deserialize, Serialize};

/// Import pipeline phase
///
/// Variant order is pipeline order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStep {
    /// Record created, nothing uploaded yet
    New,
    /// Export file being uploaded
    Uploading,
    /// Export file being fetched from a remote location
    DownloadingFile,
    /// Export file stored and ready to be parsed
    FileLoaded,
    /// Format-specific preparation started
    PreparingStarted,
    /// Staging user records
    PreparingUsers,
    /// Staging channel records
    PreparingChannels,
    /// Staging message records
    PreparingMessages,
    /// Waiting for the operator to review the selection
    UserSelection,
    /// Import accepted, conversion about to run
    ImportingStarted,
    /// Converting users
    ImportingUsers,
    /// Converting channels
    ImportingChannels,
    /// Converting messages
    ImportingMessages,
    /// Converting file attachments
    ImportingFiles,
    /// Conversion done, cleaning up
    Finishing,
    /// Import finished successfully
    Done,
    /// Import failed (terminal)
    Error,
    /// Import cancelled before it started converting
    Cancelled,
}

impl ProgressStep {
    /// Steps during which the preparer reports its own progress shape
    pub const PREPARING: [ProgressStep; 4] = [
        ProgressStep::PreparingStarted,
        ProgressStep::PreparingUsers,
        ProgressStep::PreparingChannels,
        ProgressStep::PreparingMessages,
    ];

    pub fn is_preparing(&self) -> bool {
        Self::PREPARING.contains(self)
    }

    /// Users and channels are flushed in small batches, everything else in large ones
    pub fn is_importing_users_or_channels(&self) -> bool {
        matches!(self, ProgressStep::ImportingUsers | ProgressStep::ImportingChannels)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressStep::Done | ProgressStep::Error | ProgressStep::Cancelled
        )
    }

    /// A deferred run is between IMPORTING_STARTED and FINISHING
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ProgressStep::ImportingStarted
                | ProgressStep::ImportingUsers
                | ProgressStep::ImportingChannels
                | ProgressStep::ImportingMessages
                | ProgressStep::ImportingFiles
                | ProgressStep::Finishing
        )
    }

    /// Wire name (e.g. "IMPORTING_USERS")
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStep::New => "NEW",
            ProgressStep::Uploading => "UPLOADING",
            ProgressStep::DownloadingFile => "DOWNLOADING_FILE",
            ProgressStep::FileLoaded => "FILE_LOADED",
            ProgressStep::PreparingStarted => "PREPARING_STARTED",
            ProgressStep::PreparingUsers => "PREPARING_USERS",
            ProgressStep::PreparingChannels => "PREPARING_CHANNELS",
            ProgressStep::PreparingMessages => "PREPARING_MESSAGES",
            ProgressStep::UserSelection => "USER_SELECTION",
            ProgressStep::ImportingStarted => "IMPORTING_STARTED",
            ProgressStep::ImportingUsers => "IMPORTING_USERS",
            ProgressStep::ImportingChannels => "IMPORTING_CHANNELS",
            ProgressStep::ImportingMessages => "IMPORTING_MESSAGES",
            ProgressStep::ImportingFiles => "IMPORTING_FILES",
            ProgressStep::Finishing => "FINISHING",
            ProgressStep::Done => "DONE",
            ProgressStep::Error => "ERROR",
            ProgressStep::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ProgressStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProgressStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("Unknown progress step: {}", s))
    }
}

/// Total/completed counter pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCount {
    pub total: i64,
    pub completed: i64,
}

/// Immutable view of an importer's progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Importer key (e.g. "json", "api")
    pub key: String,
    /// Importer display name
    pub name: String,
    pub step: ProgressStep,
    pub count: ProgressCount,
}

/// Preparation-phase progress, reported by format-specific preparers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationReport {
    pub users: usize,
    pub channels: usize,
    pub messages: usize,
}
