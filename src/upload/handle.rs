/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::UploadError;
use crate::upload::meta_request::UploadMetaRequest;
use crate::upload::resume::PauseToken;
use crate::upload::UploadResponse;

/// Handle for an in-progress upload.
///
/// The upload advances regardless of the handle; join it to observe the
/// outcome. Dropping the handle does not cancel the upload.
#[derive(Debug)]
#[non_exhaustive]
pub struct UploadHandle {
    pub(crate) meta: Arc<UploadMetaRequest>,
    pub(crate) done_rx: oneshot::Receiver<Result<UploadResponse, UploadError>>,
}

impl UploadHandle {
    /// Consume the handle and wait for the upload to complete.
    ///
    /// The completion fires exactly once per upload, with either the final
    /// response or the first terminal error.
    pub async fn join(self) -> Result<UploadResponse, UploadError> {
        match self.done_rx.await {
            Ok(result) => result,
            // the client (and its work loop) went away before the upload finished
            Err(_) => Err(UploadError::Canceled),
        }
    }

    /// Pause the upload.
    ///
    /// In-flight parts run to completion and are recorded; no new parts
    /// start, no complete- or abort-multipart-upload is sent, and the
    /// server-side parts stay in place. The returned token resumes the
    /// upload in a later session via
    /// [`Builder::resume`](crate::upload::request::Builder::resume).
    ///
    /// Returns `None` when there is nothing to resume yet (the multipart
    /// upload was not created at the time of the pause); the upload is
    /// still canceled.
    pub fn pause(&self) -> Option<PauseToken> {
        self.meta.pause()
    }

    /// Cancel the upload and abort the server-side multipart upload.
    pub fn cancel(&self) {
        self.meta.cancel()
    }
}
