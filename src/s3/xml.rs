/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Serde models for the XML documents exchanged by the multipart API.

use crate::checksum::ChecksumAlgorithm;
use serde::{Deserialize, Serialize};

/// Response body of `CreateMultipartUpload`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InitiateMultipartUploadResult {
    pub(crate) upload_id: String,
}

/// Response body of `ListParts`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ListPartsResult {
    #[serde(default, rename = "Part")]
    pub(crate) parts: Vec<ListedPart>,
    #[serde(default)]
    pub(crate) is_truncated: bool,
    pub(crate) next_part_number_marker: Option<String>,
}

/// A single `<Part>` entry in a list-parts response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ListedPart {
    pub(crate) part_number: u32,
    pub(crate) e_tag: String,
    #[serde(rename = "ChecksumCRC32")]
    pub(crate) checksum_crc32: Option<String>,
    #[serde(rename = "ChecksumCRC32C")]
    pub(crate) checksum_crc32c: Option<String>,
    #[serde(rename = "ChecksumSHA1")]
    pub(crate) checksum_sha1: Option<String>,
    #[serde(rename = "ChecksumSHA256")]
    pub(crate) checksum_sha256: Option<String>,
}

impl ListedPart {
    /// The recorded digest for the given algorithm, if the server reported one
    pub(crate) fn checksum(&self, algorithm: ChecksumAlgorithm) -> Option<&str> {
        match algorithm {
            ChecksumAlgorithm::Crc32 => self.checksum_crc32.as_deref(),
            ChecksumAlgorithm::Crc32c => self.checksum_crc32c.as_deref(),
            ChecksumAlgorithm::Sha1 => self.checksum_sha1.as_deref(),
            ChecksumAlgorithm::Sha256 => self.checksum_sha256.as_deref(),
        }
    }
}

/// Request body of `CompleteMultipartUpload`
#[derive(Debug, Serialize)]
#[serde(rename = "CompleteMultipartUpload")]
pub(crate) struct CompleteMultipartUpload {
    #[serde(rename = "Part")]
    pub(crate) parts: Vec<CompletedPart>,
}

/// A single `<Part>` entry in a complete-multipart-upload request
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CompletedPart {
    pub(crate) part_number: u32,
    pub(crate) e_tag: String,
    #[serde(rename = "ChecksumCRC32", skip_serializing_if = "Option::is_none")]
    pub(crate) checksum_crc32: Option<String>,
    #[serde(rename = "ChecksumCRC32C", skip_serializing_if = "Option::is_none")]
    pub(crate) checksum_crc32c: Option<String>,
    #[serde(rename = "ChecksumSHA1", skip_serializing_if = "Option::is_none")]
    pub(crate) checksum_sha1: Option<String>,
    #[serde(rename = "ChecksumSHA256", skip_serializing_if = "Option::is_none")]
    pub(crate) checksum_sha256: Option<String>,
}

impl CompletedPart {
    pub(crate) fn new(
        part_number: u32,
        e_tag: String,
        algorithm: Option<ChecksumAlgorithm>,
        checksum: Option<String>,
    ) -> Self {
        let mut part = Self {
            part_number,
            e_tag,
            checksum_crc32: None,
            checksum_crc32c: None,
            checksum_sha1: None,
            checksum_sha256: None,
        };
        match algorithm {
            Some(ChecksumAlgorithm::Crc32) => part.checksum_crc32 = checksum,
            Some(ChecksumAlgorithm::Crc32c) => part.checksum_crc32c = checksum,
            Some(ChecksumAlgorithm::Sha1) => part.checksum_sha1 = checksum,
            Some(ChecksumAlgorithm::Sha256) => part.checksum_sha256 = checksum,
            None => {}
        }
        part
    }
}

/// Response body of `CompleteMultipartUpload`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CompleteMultipartUploadResult {
    pub(crate) e_tag: Option<String>,
}

/// An S3 `<Error>` document. The complete-multipart-upload operation can
/// return one of these inside an HTTP 200 response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ErrorDocument {
    pub(crate) code: String,
    #[serde(default)]
    pub(crate) message: String,
}

pub(crate) fn parse_initiate_result(body: &[u8]) -> Result<InitiateMultipartUploadResult, quick_xml::DeError> {
    quick_xml::de::from_reader(body)
}

pub(crate) fn parse_list_parts(body: &[u8]) -> Result<ListPartsResult, quick_xml::DeError> {
    quick_xml::de::from_reader(body)
}

pub(crate) fn parse_complete_result(body: &[u8]) -> Result<CompleteMultipartUploadResult, quick_xml::DeError> {
    quick_xml::de::from_reader(body)
}

/// Best-effort detection of an error document hiding behind a 2xx status
pub(crate) fn parse_error_document(body: &[u8]) -> Option<ErrorDocument> {
    if body.is_empty() {
        return None;
    }
    quick_xml::de::from_reader(body).ok()
}

pub(crate) fn serialize_complete_multipart_upload(
    body: &CompleteMultipartUpload,
) -> Result<String, quick_xml::SeError> {
    quick_xml::se::to_string(body)
}
