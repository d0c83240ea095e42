//! Import of a group's shared files into a fresh board.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::boards::MondayClient;
use super::error::{MondayError, MondayResult};
use crate::messaging::{MediaAttachment, MediaKind, MessagingClient};

/// Title of the file column created on every imported board.
pub const FILES_COLUMN: &str = "Files";

/// Board group a file is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetGroup {
    Exercises,
    Tests,
    Tirgulim,
    Lectures,
}

impl TargetGroup {
    pub const ALL: [TargetGroup; 4] = [
        TargetGroup::Exercises,
        TargetGroup::Tests,
        TargetGroup::Tirgulim,
        TargetGroup::Lectures,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            TargetGroup::Exercises => "Exercises",
            TargetGroup::Tests => "Tests",
            TargetGroup::Tirgulim => "Tirgulim",
            TargetGroup::Lectures => "Lectures",
        }
    }
}

/// Pick the board group for an attachment. First matching rule wins.
pub fn classify(media: &MediaAttachment) -> TargetGroup {
    let name = media.file_name.to_lowercase();
    if name.contains("sol") {
        TargetGroup::Exercises
    } else if media.kind == MediaKind::Image {
        TargetGroup::Tests
    } else if name.contains("2020") {
        TargetGroup::Tests
    } else if name.contains("practice") {
        TargetGroup::Tirgulim
    } else {
        TargetGroup::Exercises
    }
}

/// Outcome of importing one messaging group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub board_id: String,
    pub uploaded: usize,
    pub failed: usize,
}

/// Copies media from a messaging account into monday.com boards.
#[derive(Clone)]
pub struct BoardImporter {
    monday: MondayClient,
    messaging: Arc<dyn MessagingClient>,
}

impl BoardImporter {
    pub fn new(monday: MondayClient, messaging: Arc<dyn MessagingClient>) -> Self {
        Self { monday, messaging }
    }

    /// Create a board named `board_name` and upload every attachment into it.
    ///
    /// Board setup errors abort the import. Per-file errors are logged and
    /// counted in the summary.
    pub async fn import_group(
        &self,
        board_name: &str,
        media: Vec<MediaAttachment>,
    ) -> MondayResult<ImportSummary> {
        let board_id = self.monday.create_board(board_name).await?;

        let mut groups = HashMap::new();
        for target in TargetGroup::ALL {
            let group_id = self.monday.create_group(&board_id, target.title()).await?;
            groups.insert(target, group_id);
        }
        let column_id = self
            .monday
            .create_file_column(&board_id, FILES_COLUMN)
            .await?;

        let mut summary = ImportSummary {
            board_id,
            ..ImportSummary::default()
        };
        for attachment in media {
            match self
                .upload(&summary.board_id, &groups, &column_id, &attachment)
                .await
            {
                Ok(()) => summary.uploaded += 1,
                Err(e) => {
                    warn!(
                        board_id = %summary.board_id,
                        file = %attachment.file_name,
                        "File import failed: {}", e
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            board = board_name,
            board_id = %summary.board_id,
            uploaded = summary.uploaded,
            failed = summary.failed,
            "Group import finished"
        );
        Ok(summary)
    }

    async fn upload(
        &self,
        board_id: &str,
        groups: &HashMap<TargetGroup, String>,
        column_id: &str,
        attachment: &MediaAttachment,
    ) -> MondayResult<()> {
        let bytes = self.messaging.download_media(attachment).await?;
        let group_id = group_id(groups, classify(attachment))?;

        let item_id = self
            .monday
            .create_item(board_id, group_id, &attachment.file_name)
            .await?;
        self.monday
            .add_file_to_column(&item_id, column_id, &attachment.file_name, bytes)
            .await?;
        Ok(())
    }
}

fn group_id(groups: &HashMap<TargetGroup, String>, target: TargetGroup) -> MondayResult<&str> {
    groups
        .get(&target)
        .map(String::as_str)
        .ok_or(MondayError::MissingGroup(target.title()))
}
