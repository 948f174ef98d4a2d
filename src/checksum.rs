/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_smithy_types::base64;
use sha1::Digest;

/// Checksum algorithms supported for multipart uploads.
///
/// The computed digest travels as a base64 string, both in the
/// `x-amz-checksum-*` request header of each part and in the
/// complete-multipart-upload body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChecksumAlgorithm {
    /// CRC32 (IEEE)
    Crc32,
    /// CRC32C (Castagnoli)
    Crc32c,
    /// SHA-1
    Sha1,
    /// SHA-256
    Sha256,
}

impl ChecksumAlgorithm {
    /// Algorithm name as sent in the `x-amz-checksum-algorithm` header
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Crc32 => "CRC32",
            ChecksumAlgorithm::Crc32c => "CRC32C",
            ChecksumAlgorithm::Sha1 => "SHA1",
            ChecksumAlgorithm::Sha256 => "SHA256",
        }
    }

    /// The `x-amz-checksum-*` header that carries a part digest for this
    /// algorithm
    pub fn header_name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Crc32 => "x-amz-checksum-crc32",
            ChecksumAlgorithm::Crc32c => "x-amz-checksum-crc32c",
            ChecksumAlgorithm::Sha1 => "x-amz-checksum-sha1",
            ChecksumAlgorithm::Sha256 => "x-amz-checksum-sha256",
        }
    }

    /// Compute the base64-encoded digest of `data`
    pub fn checksum(&self, data: &[u8]) -> String {
        match self {
            ChecksumAlgorithm::Crc32 => base64::encode(crc32fast::hash(data).to_be_bytes()),
            ChecksumAlgorithm::Crc32c => base64::encode(crc32c::crc32c(data).to_be_bytes()),
            ChecksumAlgorithm::Sha1 => base64::encode(sha1::Sha1::digest(data)),
            ChecksumAlgorithm::Sha256 => base64::encode(sha2::Sha256::digest(data)),
        }
    }
}
