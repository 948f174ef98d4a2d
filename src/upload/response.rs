/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use http::{HeaderMap, StatusCode};

/// Response for a completed upload.
///
/// Carries the complete-multipart-upload response headers overlaid with the
/// customer-encryption headers captured when the upload started.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct UploadResponse {
    pub(crate) e_tag: Option<String>,
    pub(crate) upload_id: Option<String>,
    pub(crate) status: Option<StatusCode>,
    pub(crate) headers: HeaderMap,
}

impl UploadResponse {
    /// Entity tag of the uploaded object.
    ///
    /// For a multipart upload this is the compound ETag computed by the
    /// service over the part ETags, in its quoted wire form.
    pub fn e_tag(&self) -> Option<&str> {
        self.e_tag.as_deref()
    }

    /// ID of the multipart upload that produced the object
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// HTTP status of the complete-multipart-upload response
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
