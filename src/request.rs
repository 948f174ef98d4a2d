/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::transport::S3RequestMessage;
use crate::upload::meta_request::UploadMetaRequest;

/// Role a request plays within its owning upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestTag {
    ListParts,
    CreateMultipartUpload,
    UploadPart,
    CompleteMultipartUpload,
    AbortMultipartUpload,
}

impl RequestTag {
    pub(crate) const COUNT: usize = 5;

    /// Stable index, used for per-type network I/O accounting
    pub(crate) fn index(self) -> usize {
        match self {
            RequestTag::ListParts => 0,
            RequestTag::CreateMultipartUpload => 1,
            RequestTag::UploadPart => 2,
            RequestTag::CompleteMultipartUpload => 3,
            RequestTag::AbortMultipartUpload => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RequestFlags {
    /// Capture response headers for later delivery to the caller
    pub(crate) record_response_headers: bool,
    /// Send even when the owning upload already has a finish result.
    /// Abort-multipart-upload sets this: it is emitted *because* the upload
    /// finished.
    pub(crate) always_send: bool,
}

impl RequestFlags {
    pub(crate) fn record_response_headers() -> Self {
        Self {
            record_response_headers: true,
            always_send: false,
        }
    }

    pub(crate) fn always_send() -> Self {
        Self {
            record_response_headers: true,
            always_send: true,
        }
    }
}

/// One HTTP exchange belonging to an upload.
///
/// Allocated by the meta-request state machine on demand, prepared on the
/// work scheduler (which may read the upload body), dispatched onto a
/// connection, and fed back to the meta-request when it finishes.
pub(crate) struct Request {
    /// The upload this request belongs to. The upload always outlives its
    /// requests.
    pub(crate) meta: Arc<UploadMetaRequest>,
    pub(crate) tag: RequestTag,
    /// 1-based part number; 0 when not an upload-part request
    pub(crate) part_number: u32,
    pub(crate) flags: RequestFlags,
    /// Number of times this request went through preparation. The upload
    /// body is only read from the stream on the first preparation.
    pub(crate) num_times_prepared: u32,
    /// Prepared part body (empty for non-part requests)
    pub(crate) body: Bytes,
    /// The wire message, populated by preparation
    pub(crate) message: Option<S3RequestMessage>,
}

impl Request {
    pub(crate) fn new(
        meta: Arc<UploadMetaRequest>,
        tag: RequestTag,
        part_number: u32,
        flags: RequestFlags,
    ) -> Self {
        Self {
            meta,
            tag,
            part_number,
            flags,
            num_times_prepared: 0,
            body: Bytes::new(),
            message: None,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("tag", &self.tag)
            .field("part_number", &self.part_number)
            .field("num_times_prepared", &self.num_times_prepared)
            .finish_non_exhaustive()
    }
}
