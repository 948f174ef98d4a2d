/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::mem;
use std::sync::Arc;

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::checksum::ChecksumAlgorithm;
use crate::io::InputStream;
use crate::types::{ProgressListener, TargetPartSize, TransferProgress};
use crate::upload::resume::PauseToken;

/// Input for uploading a single object to Amazon S3
#[non_exhaustive]
pub struct UploadRequest {
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) body: InputStream,
    pub(crate) part_size: TargetPartSize,
    pub(crate) checksum_algorithm: Option<ChecksumAlgorithm>,
    /// Additional headers forwarded onto the multipart requests (object
    /// metadata, SSE settings, request payer, ...)
    pub(crate) headers: HeaderMap,
    pub(crate) resume_token: Option<PauseToken>,
    pub(crate) progress_listener: Option<ProgressListener>,
}

impl UploadRequest {
    /// Create a new [`Builder`]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Split the body out of the request.
    ///
    /// The engine reads the body through its own sequential reader; the
    /// remaining fields describe the upload.
    pub(crate) fn take_body(&mut self) -> InputStream {
        mem::take(&mut self.body)
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("part_size", &self.part_size)
            .field("checksum_algorithm", &self.checksum_algorithm)
            .field("resume_token", &self.resume_token)
            .finish_non_exhaustive()
    }
}

/// Fluent style builder for [`UploadRequest`]
#[derive(Default)]
pub struct Builder {
    bucket: String,
    key: String,
    body: InputStream,
    part_size: TargetPartSize,
    checksum_algorithm: Option<ChecksumAlgorithm>,
    headers: HeaderMap,
    resume_token: Option<PauseToken>,
    progress_listener: Option<ProgressListener>,
}

impl Builder {
    fn new() -> Self {
        Self::default()
    }

    /// Set the bucket to upload into
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Set the object key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set the object contents
    pub fn body(mut self, body: InputStream) -> Self {
        self.body = body;
        self
    }

    /// Set the target part size. Default is [`TargetPartSize::Auto`].
    pub fn part_size(mut self, part_size: TargetPartSize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Upload an additional checksum with every part.
    ///
    /// Also required for verifying object integrity when resuming a paused
    /// upload: without a checksum algorithm, skipped parts are not compared
    /// against the fresh input.
    pub fn checksum_algorithm(mut self, checksum_algorithm: ChecksumAlgorithm) -> Self {
        self.checksum_algorithm = Some(checksum_algorithm);
        self
    }

    /// Add a header forwarded with the upload (object metadata, SSE
    /// settings, request payer, ...)
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Resume a previously paused upload.
    ///
    /// The body must be the same stream (same contents, same length) the
    /// original upload used.
    pub fn resume(mut self, token: PauseToken) -> Self {
        self.resume_token = Some(token);
        self
    }

    /// Register a callback invoked as parts complete
    pub fn on_progress(
        mut self,
        listener: impl Fn(TransferProgress) + Send + Sync + 'static,
    ) -> Self {
        self.progress_listener = Some(Arc::new(listener));
        self
    }

    /// Consumes the builder and constructs an [`UploadRequest`]
    pub fn build(self) -> UploadRequest {
        UploadRequest {
            bucket: self.bucket,
            key: self.key,
            body: self.body,
            part_size: self.part_size,
            checksum_algorithm: self.checksum_algorithm,
            headers: self.headers,
            resume_token: self.resume_token,
            progress_listener: self.progress_listener,
        }
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
