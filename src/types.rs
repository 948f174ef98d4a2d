/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

/// The target part size for an upload request.
#[derive(Debug, Clone, Default)]
pub enum TargetPartSize {
    /// Automatically configure an optimal target part size based on the
    /// object size.
    #[default]
    Auto,

    /// Explicitly configured part size.
    ///
    /// The minimum part size is 5 MiB and an object may span at most
    /// 10,000 parts; sizes that violate either bound are rejected.
    Explicit(u64),
}

/// Progress of a single upload, reported after each part finishes.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct TransferProgress {
    /// Bytes transferred by the part that just completed
    pub bytes_transferred: u64,

    /// Total length of the object being uploaded
    pub content_length: u64,
}

/// Callback invoked as parts of an upload complete
pub type ProgressListener = Arc<dyn Fn(TransferProgress) + Send + Sync>;
