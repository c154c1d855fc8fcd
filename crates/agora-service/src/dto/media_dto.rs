//! Media-related DTOs.

use agora_core::{AgoraError, AgoraResult, UserId};

/// An uploaded file to store for a user.
#[derive(Debug, Clone)]
pub struct UploadMediaRequest {
    pub user_id: UserId,
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadMediaRequest {
    /// Rejects requests without a file.
    pub fn validate(&self) -> AgoraResult<()> {
        if self.bytes.is_empty() || self.original_name.trim().is_empty() {
            return Err(AgoraError::validation(
                "No file found. Please add a file and try again",
            ));
        }
        Ok(())
    }
}
