/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Builders for the wire-level messages of the multipart upload verbs.

use crate::checksum::ChecksumAlgorithm;
use crate::transport::S3RequestMessage;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};
use http::Method;

/// Header attached to create-multipart-upload when a checksum algorithm is
/// configured
const CHECKSUM_ALGORITHM_HEADER: &str = "x-amz-checksum-algorithm";

/// Request headers forwarded onto every data-carrying request of an upload.
/// SSE-C uploads must present the key material on each part and on the
/// completion.
const SSE_CUSTOMER_REQUEST_HEADERS: [&str; 3] = [
    "x-amz-server-side-encryption-customer-algorithm",
    "x-amz-server-side-encryption-customer-key",
    "x-amz-server-side-encryption-customer-key-md5",
];

/// Request headers forwarded onto every request of an upload
const COMMON_REQUEST_HEADERS: [&str; 2] = ["x-amz-request-payer", "x-amz-expected-bucket-owner"];

/// Response headers snapshotted from the create-multipart-upload response
/// (or, on resume, from the initial request) and merged into the final
/// response delivered to the caller.
pub(crate) const CREATE_MPU_RESPONSE_COPY_HEADERS: [&str; 3] = [
    "x-amz-server-side-encryption-customer-algorithm",
    "x-amz-server-side-encryption-customer-key-md5",
    "x-amz-server-side-encryption-context",
];

/// Percent-encode an object key, preserving `/` separators
fn object_path(key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{encoded}")
}

pub(crate) fn copy_headers(from: &HeaderMap, to: &mut HeaderMap, names: &[&str]) {
    for name in names {
        if let Some(value) = from.get(*name) {
            // names are static lowercase strings, parsing cannot fail
            let name: http::header::HeaderName = name.parse().expect("valid header name");
            to.insert(name, value.clone());
        }
    }
}

fn copy_forwarded_headers(from: &HeaderMap, to: &mut HeaderMap) {
    copy_headers(from, to, &COMMON_REQUEST_HEADERS);
    copy_headers(from, to, &SSE_CUSTOMER_REQUEST_HEADERS);
}

fn content_length(headers: &mut HeaderMap, len: usize) {
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len as u64));
}

/// `GET /{key}?uploadId=...&part-number-marker=...`
pub(crate) fn list_parts(
    key: &str,
    upload_id: &str,
    part_number_marker: Option<&str>,
    initial_headers: &HeaderMap,
) -> S3RequestMessage {
    let mut path = format!(
        "{}?uploadId={}",
        object_path(key),
        urlencoding::encode(upload_id)
    );
    if let Some(marker) = part_number_marker {
        path.push_str("&part-number-marker=");
        path.push_str(&urlencoding::encode(marker));
    }

    let mut message = S3RequestMessage::new(Method::GET, path);
    copy_headers(initial_headers, &mut message.headers, &COMMON_REQUEST_HEADERS);
    message
}

/// `POST /{key}?uploads`
pub(crate) fn create_multipart_upload(
    key: &str,
    checksum_algorithm: Option<ChecksumAlgorithm>,
    initial_headers: &HeaderMap,
) -> S3RequestMessage {
    let path = format!("{}?uploads", object_path(key));
    let mut message = S3RequestMessage::new(Method::POST, path);

    // Forward everything the caller supplied except part-level checksum
    // headers; for a multipart upload the engine computes those itself.
    for (name, value) in initial_headers.iter() {
        if name.as_str().starts_with("x-amz-checksum-") {
            continue;
        }
        message.headers.insert(name.clone(), value.clone());
    }

    if let Some(algorithm) = checksum_algorithm {
        message.headers.insert(
            CHECKSUM_ALGORITHM_HEADER,
            HeaderValue::from_static(algorithm.as_str()),
        );
    }
    content_length(&mut message.headers, 0);
    message
}

/// `PUT /{key}?partNumber=N&uploadId=...`
pub(crate) fn upload_part(
    key: &str,
    upload_id: &str,
    part_number: u32,
    body: Bytes,
    checksum: Option<(ChecksumAlgorithm, &str)>,
    initial_headers: &HeaderMap,
) -> S3RequestMessage {
    let path = format!(
        "{}?partNumber={}&uploadId={}",
        object_path(key),
        part_number,
        urlencoding::encode(upload_id)
    );

    let mut message = S3RequestMessage::new(Method::PUT, path);
    copy_forwarded_headers(initial_headers, &mut message.headers);
    if let Some((algorithm, digest)) = checksum {
        message.headers.insert(
            algorithm.header_name(),
            HeaderValue::from_str(digest).expect("base64 digest is a valid header value"),
        );
    }
    content_length(&mut message.headers, body.len());
    message.body = body;
    message
}

/// `POST /{key}?uploadId=...` with the completed-parts XML body
pub(crate) fn complete_multipart_upload(
    key: &str,
    upload_id: &str,
    body: String,
    initial_headers: &HeaderMap,
) -> S3RequestMessage {
    let path = format!(
        "{}?uploadId={}",
        object_path(key),
        urlencoding::encode(upload_id)
    );

    let mut message = S3RequestMessage::new(Method::POST, path);
    copy_forwarded_headers(initial_headers, &mut message.headers);
    content_length(&mut message.headers, body.len());
    message.body = Bytes::from(body);
    message
}

/// `DELETE /{key}?uploadId=...`
pub(crate) fn abort_multipart_upload(
    key: &str,
    upload_id: &str,
    initial_headers: &HeaderMap,
) -> S3RequestMessage {
    let path = format!(
        "{}?uploadId={}",
        object_path(key),
        urlencoding::encode(upload_id)
    );

    let mut message = S3RequestMessage::new(Method::DELETE, path);
    copy_headers(initial_headers, &mut message.headers, &COMMON_REQUEST_HEADERS);
    message
}
