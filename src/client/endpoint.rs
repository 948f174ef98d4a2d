/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::client::ClientInner;
use crate::transport::HttpTransport;

/// Connection-pool handle for a single host.
///
/// Endpoints are shared by every upload targeting the same host and are
/// indexed in the client's endpoint table. The table entry's ref-count, not
/// an atomic, tracks sharing: the count and the table are guarded by the
/// same lock so a decrement to zero and the table removal happen together.
#[derive(Debug)]
pub(crate) struct Endpoint {
    pub(crate) host: String,
    pub(crate) transport: Arc<dyn HttpTransport>,
}

#[derive(Debug)]
pub(crate) struct EndpointEntry {
    pub(super) endpoint: Arc<Endpoint>,
    pub(super) ref_count: u32,
}

impl ClientInner {
    /// Get (or create) the endpoint for `host` and take a reference on it.
    ///
    /// An endpoint exists in the table iff its ref-count is greater than
    /// zero.
    pub(crate) fn acquire_endpoint(&self, host: &str) -> Arc<Endpoint> {
        let mut synced = self.synced.lock().expect("lock valid");
        let entry = synced
            .endpoints
            .entry(host.to_string())
            .or_insert_with(|| {
                tracing::debug!(host, "creating endpoint");
                EndpointEntry {
                    endpoint: Arc::new(Endpoint {
                        host: host.to_string(),
                        transport: self.transport.clone(),
                    }),
                    ref_count: 0,
                }
            });
        entry.ref_count += 1;
        entry.endpoint.clone()
    }

    /// Drop a reference on `endpoint`, removing it from the table when the
    /// last reference goes away.
    ///
    /// Must NOT be called while holding the client lock; this function
    /// acquires it.
    pub(crate) fn release_endpoint(&self, endpoint: &Arc<Endpoint>) {
        let mut synced = self.synced.lock().expect("lock valid");
        if let Some(entry) = synced.endpoints.get_mut(&endpoint.host) {
            entry.ref_count -= 1;
            if entry.ref_count == 0 {
                tracing::debug!(host = %endpoint.host, "releasing endpoint");
                synced.endpoints.remove(&endpoint.host);
            }
        }
    }
}
