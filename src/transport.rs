/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

/// A single S3 request, fully prepared for the wire.
///
/// The path is origin-form (`/{key}?uploadId=...`); the target host is
/// supplied separately so the transport can route the exchange onto the
/// right connection pool.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct S3RequestMessage {
    /// HTTP method
    pub method: Method,
    /// Origin-form path and query (percent-encoded)
    pub path_and_query: String,
    /// Request headers (exclusive of anything the transport adds, such as
    /// `Host` or signature headers)
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

impl S3RequestMessage {
    pub(crate) fn new(method: Method, path_and_query: String) -> Self {
        Self {
            method,
            path_and_query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// A fully buffered S3 response.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct S3ResponseMessage {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl S3ResponseMessage {
    /// Create a response from its parts
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }
}

/// Errors surfaced by an [`HttpTransport`]
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// The exchange could not be carried out (DNS, connect, TLS, timeout, ...)
    #[error("connection error")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// The server answered with a non-success status
    #[error("http error response: status {status}")]
    HttpStatus {
        /// Status code of the failed exchange
        status: StatusCode,
        /// The full response, kept as a snapshot for the caller
        response: S3ResponseMessage,
    },
}

impl TransportError {
    /// Convenience constructor for connection-level failures
    pub fn connection(source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        TransportError::Connection(source.into())
    }
}

/// The seam between the upload engine and the HTTP stack.
///
/// Implementations own connection pooling, TLS, DNS resolution, request
/// signing, and retries. The engine issues at most one `execute` per
/// connection it has budgeted and expects fully buffered responses (all
/// multipart control responses are small).
#[async_trait::async_trait]
pub trait HttpTransport: std::fmt::Debug + Send + Sync {
    /// Execute a single request against `host`
    async fn execute(
        &self,
        host: &str,
        request: S3RequestMessage,
    ) -> Result<S3ResponseMessage, TransportError>;
}
