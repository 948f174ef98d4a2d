/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */

//! Auto-ranged multipart upload engine for Amazon S3
//!
//! Splits a single logical `PutObject` into a `CreateMultipartUpload`,
//! many concurrent `UploadPart` requests, and a final
//! `CompleteMultipartUpload` (or `AbortMultipartUpload` on failure),
//! sharing a connection budget across every in-progress upload.
//! Uploads can be paused and later resumed across process restarts; the
//! engine reconciles previously uploaded parts with `ListParts` and
//! verifies them against the fresh input with per-part checksums.
//!
//! HTTP/TLS, connection pooling, request signing, and retry policy are
//! external collaborators supplied through the
//! [`HttpTransport`](crate::transport::HttpTransport) trait.

#![warn(
    // TODO - re-enable missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

pub(crate) const MEBI_BYTE: u64 = 1024 * 1024;

/// Minimum size for any part except the last one
pub(crate) const MIN_PART_SIZE: u64 = 5 * MEBI_BYTE;

/// Part size used when the caller does not pick one explicitly
pub(crate) const DEFAULT_PART_SIZE_TARGET: u64 = 8 * MEBI_BYTE;

/// Maximum number of parts that a single S3 multipart upload supports
pub(crate) const MAX_UPLOAD_PARTS: u32 = 10_000;

pub mod checksum;
pub mod client;
pub mod error;
pub mod io;
pub(crate) mod request;
pub(crate) mod s3;
pub mod transport;
pub mod types;
pub mod upload;
