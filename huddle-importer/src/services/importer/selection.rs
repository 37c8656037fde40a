//! Operator selection built from staged data

use huddle_common::events::ProgressStep;
use tracing::debug;

use super::Importer;
use crate::error::ImportError;
use crate::models::{Selection, SelectionChannel, SelectionUser};

impl Importer {
    /// Step → USER_SELECTION; list every staged user and channel, all
    /// selected, plus the direct-message pseudo-channel when any direct
    /// conversation was staged.
    pub async fn build_selection(&self) -> Result<Selection, ImportError> {
        self.update_progress(ProgressStep::UserSelection).await?;

        let staging = &self.services.staging;
        let users: Vec<SelectionUser> = staging
            .get_all_users_for_selection()
            .await?
            .iter()
            .map(SelectionUser::from)
            .collect();
        let mut channels: Vec<SelectionChannel> = staging
            .get_all_channels_for_selection()
            .await?
            .iter()
            .map(SelectionChannel::from)
            .collect();
        let message_count = staging.count_messages().await?;

        if staging.check_if_direct_messages_exists().await? {
            channels.push(SelectionChannel::direct_messages());
        }

        debug!(
            importer = %self.info.key,
            users = users.len(),
            channels = channels.len(),
            messages = message_count,
            "Selection built"
        );
        Ok(Selection::new(self.info.name.clone(), users, channels, message_count))
    }
}
