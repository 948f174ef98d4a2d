/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::transport::TransportError;

/// Failed upload result
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum UploadError {
    /// The request was invalid
    #[error("invalid upload request: {0}")]
    InvalidArgument(String),

    /// The create-multipart-upload response had no `UploadId`, or an
    /// upload-part response had no `ETag` header.
    #[error("response did not contain an upload id")]
    MissingUploadId,

    /// The list-parts response could not be parsed
    #[error("failed to parse list-parts response: {0}")]
    ListPartsParseFailed(String),

    /// The input stream could not be advanced while resuming
    #[error("failed to resume upload; input stream cannot be read")]
    ResumeFailed(#[source] crate::io::error::Error),

    /// A previously uploaded part does not match the bytes read from the
    /// input stream on resume.
    #[error("checksum of part {part_number} does not match previously uploaded part")]
    ResumedPartChecksumMismatch {
        /// 1-based number of the mismatched part
        part_number: u32,
    },

    /// The upload was paused; previously uploaded parts are preserved so the
    /// upload can be resumed.
    #[error("upload paused")]
    Paused,

    /// The upload was canceled
    #[error("upload canceled")]
    Canceled,

    /// The service reported an error inside an HTTP 200 response body
    #[error("service error: {code}: {message}")]
    Service {
        /// S3 error code from the response body
        code: String,
        /// Human readable message from the response body
        message: String,
    },

    /// An I/O error occurred reading the upload body
    #[error("I/O error")]
    Io(#[from] crate::io::error::Error),

    /// The transport failed to carry out an exchange
    #[error("transport error")]
    Transport(#[from] TransportError),
}

impl UploadError {
    /// Short stable name for this error, recorded in per-phase state
    pub(crate) fn code(&self) -> &'static str {
        match self {
            UploadError::InvalidArgument(_) => "InvalidArgument",
            UploadError::MissingUploadId => "MissingUploadId",
            UploadError::ListPartsParseFailed(_) => "ListPartsParseFailed",
            UploadError::ResumeFailed(_) => "ResumeFailed",
            UploadError::ResumedPartChecksumMismatch { .. } => "ResumedPartChecksumMismatch",
            UploadError::Paused => "Paused",
            UploadError::Canceled => "Canceled",
            UploadError::Service { .. } => "Service",
            UploadError::Io(_) => "Io",
            UploadError::Transport(_) => "Transport",
        }
    }

    /// Whether this terminal state preserves server-side parts.
    ///
    /// Paused and resume-failed uploads must never abort the multipart
    /// upload: the server-side parts are what a later resume reconciles
    /// against.
    pub(crate) fn preserves_upload(&self) -> bool {
        matches!(
            self,
            UploadError::Paused | UploadError::ResumeFailed(_)
        )
    }
}
