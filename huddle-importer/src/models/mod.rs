//! Data models for huddle-importer

pub mod import_record;
pub mod importer_info;
pub mod progress;
pub mod selection;
pub mod staged;

pub use import_record::{ImportRecord, ImportRecordUpdate};
pub use importer_info::{ImporterInfo, API_IMPORTER_KEY};
pub use progress::Progress;
pub use selection::{
    Selection, SelectionChannel, SelectionUser, DIRECT_MESSAGES_ID, DIRECT_MESSAGES_NAME,
};
pub use staged::{
    ImportRecordType, RoomType, StagedChannel, StagedData, StagedEntry, StagedMessage,
    StagedUser, UserKind,
};
