/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::{MAX_UPLOAD_PARTS, MIN_PART_SIZE};

const TOKEN_TYPE: &str = "AWS_S3_META_REQUEST_TYPE_PUT_OBJECT";

/// Persistable state of a paused upload.
///
/// Serialized as JSON; the caller stores it wherever it likes and hands it
/// back via [`Builder::resume`](crate::upload::request::Builder::resume)
/// together with the same input stream and content length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseToken {
    #[serde(rename = "type")]
    token_type: String,
    multipart_upload_id: String,
    partition_size: u64,
    total_num_parts: u32,
}

impl PauseToken {
    pub(crate) fn new(upload_id: String, partition_size: u64, total_num_parts: u32) -> Self {
        Self {
            token_type: TOKEN_TYPE.to_string(),
            multipart_upload_id: upload_id,
            partition_size,
            total_num_parts,
        }
    }

    /// Server-assigned id of the multipart upload to resume
    pub fn upload_id(&self) -> &str {
        &self.multipart_upload_id
    }

    /// Part size the paused upload was using, in bytes
    pub fn partition_size(&self) -> u64 {
        self.partition_size
    }

    /// Total number of parts of the paused upload
    pub fn total_num_parts(&self) -> u32 {
        self.total_num_parts
    }

    /// Serialize the token for persistence
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("token serializes")
    }

    /// Load a previously persisted token.
    ///
    /// Rejects tokens with missing fields, an unexpected type, a part size
    /// below the multipart minimum, or a part count beyond what S3
    /// supports.
    pub fn from_json(token: &str) -> Result<Self, UploadError> {
        let token: PauseToken = serde_json::from_str(token).map_err(|err| {
            UploadError::InvalidArgument(format!("could not load persisted upload state: {err}"))
        })?;

        if token.token_type != TOKEN_TYPE {
            return Err(UploadError::InvalidArgument(
                "persisted upload state has an unexpected type".to_string(),
            ));
        }
        if token.partition_size < MIN_PART_SIZE {
            return Err(UploadError::InvalidArgument(format!(
                "part size {} in persisted upload state is below the multipart minimum",
                token.partition_size
            )));
        }
        if token.total_num_parts > MAX_UPLOAD_PARTS {
            return Err(UploadError::InvalidArgument(format!(
                "part count {} in persisted upload state is too large",
                token.total_num_parts
            )));
        }

        Ok(token)
    }
}
