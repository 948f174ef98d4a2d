/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::cmp;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::client::endpoint::EndpointEntry;
use crate::client::scheduler::{Scheduler, WorkEvent};
use crate::error::UploadError;
use crate::transport::HttpTransport;
use crate::types::TargetPartSize;
use crate::upload::meta_request::{ResumeState, UploadMetaRequest};
use crate::upload::{UploadHandle, UploadRequest};
use crate::{DEFAULT_PART_SIZE_TARGET, MAX_UPLOAD_PARTS, MIN_PART_SIZE};

pub(crate) mod endpoint;
pub(crate) mod scheduler;

/// Assumed throughput of a single S3 virtual IP, used to size the
/// connection budget from the throughput target
const THROUGHPUT_PER_VIP_GBPS: f64 = 4.0;

/// Connections opened against each assumed VIP
const CONNECTIONS_PER_VIP: usize = 10;

/// Requests allowed in flight per budgeted connection. Requests spend time
/// in preparation and completion bookkeeping as well as on the wire, so the
/// in-flight budget is larger than the connection budget.
const MAX_REQUESTS_MULTIPLIER: usize = 4;

const DEFAULT_THROUGHPUT_TARGET_GBPS: f64 = 10.0;

/// Fluent style builder for [Client]
#[derive(Debug)]
pub struct Builder {
    throughput_target_gbps: f64,
    max_active_connections: Option<usize>,
    endpoint_suffix: String,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl Builder {
    fn new() -> Self {
        Self {
            throughput_target_gbps: DEFAULT_THROUGHPUT_TARGET_GBPS,
            max_active_connections: None,
            endpoint_suffix: "s3.amazonaws.com".to_string(),
            transport: None,
        }
    }

    /// Set the transport used to carry out HTTP exchanges.
    ///
    /// The transport owns connection pooling, TLS, signing, and retries.
    pub fn transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Set the target throughput this client should attempt to reach.
    ///
    /// The connection budget is derived from this value. Default is 10 Gbps.
    pub fn throughput_target_gbps(mut self, throughput_target_gbps: f64) -> Self {
        self.throughput_target_gbps = throughput_target_gbps;
        self
    }

    /// Cap the number of concurrent connections regardless of the
    /// throughput target.
    pub fn max_active_connections(mut self, max_active_connections: usize) -> Self {
        self.max_active_connections = Some(max_active_connections);
        self
    }

    /// Set the endpoint suffix appended to the bucket name to form the
    /// request host. Default is `s3.amazonaws.com`.
    pub fn endpoint_suffix(mut self, endpoint_suffix: impl Into<String>) -> Self {
        self.endpoint_suffix = endpoint_suffix.into();
        self
    }

    /// Consumes the builder and constructs a [Client].
    ///
    /// Must be called from within a tokio runtime: the client spawns its
    /// work-loop task here.
    pub fn build(self) -> Result<Client, UploadError> {
        let transport = self.transport.ok_or_else(|| {
            UploadError::InvalidArgument("an HttpTransport implementation is required".to_string())
        })?;

        let throughput = if self.throughput_target_gbps > 0.0 {
            self.throughput_target_gbps
        } else {
            DEFAULT_THROUGHPUT_TARGET_GBPS
        };
        let ideal_vip_count = cmp::max((throughput / THROUGHPUT_PER_VIP_GBPS).ceil() as usize, 1);
        let mut max_active_connections = ideal_vip_count * CONNECTIONS_PER_VIP;
        if let Some(user_max) = self.max_active_connections {
            max_active_connections = cmp::min(max_active_connections, cmp::max(user_max, 1));
        }

        let config = ClientConfig {
            max_active_connections,
            max_requests_in_flight: max_active_connections * MAX_REQUESTS_MULTIPLIER,
            max_requests_prepare: max_active_connections,
            endpoint_suffix: self.endpoint_suffix,
        };

        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ClientInner {
            config,
            transport,
            work_tx,
            synced: Mutex::new(ClientSynced::default()),
        });

        let scheduler = Scheduler::new(Arc::downgrade(&inner), &inner.config);
        tokio::spawn(
            scheduler
                .run(work_rx)
                .instrument(tracing::debug_span!("s3-upload-work-loop")),
        );

        Ok(Client { inner })
    }
}

/// Upload objects to Amazon S3 at high throughput by decomposing each
/// request into concurrent multipart operations.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl Client {
    /// Create a new [Builder]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Upload a single object to Amazon S3.
    ///
    /// A single logical request is split into many concurrent `UploadPart`
    /// requests to improve throughput.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::error::Error;
    /// use std::path::Path;
    /// use aws_s3_upload_engine::client::Client;
    /// use aws_s3_upload_engine::io::InputStream;
    /// use aws_s3_upload_engine::upload::UploadRequest;
    ///
    /// async fn upload_file(client: Client, path: impl AsRef<Path>) -> Result<(), Box<dyn Error>> {
    ///     let stream = InputStream::from_path(path)?;
    ///     let request = UploadRequest::builder()
    ///         .bucket("my-bucket")
    ///         .key("my-key")
    ///         .body(stream)
    ///         .build();
    ///
    ///     // put_object() returns before the upload completes. The handle
    ///     // must be joined to drive the request to completion; it can also
    ///     // be used to pause or cancel the upload.
    ///     let handle = client.put_object(request).await?;
    ///     let response = handle.join().await?;
    ///     // ... do something with response
    ///     Ok(())
    /// }
    /// ```
    pub async fn put_object(&self, mut req: UploadRequest) -> Result<UploadHandle, UploadError> {
        if req.bucket.is_empty() || req.key.is_empty() {
            return Err(UploadError::InvalidArgument(
                "bucket and key are required".to_string(),
            ));
        }

        let stream = req.take_body();
        let content_length = stream.content_length();
        if content_length == 0 {
            return Err(UploadError::InvalidArgument(
                "upload body must not be empty".to_string(),
            ));
        }

        let (part_size, resume) = match req.resume_token.take() {
            Some(token) => {
                // The caller must hand back the same stream; the part count
                // derived from it has to agree with the persisted state.
                let expected_parts = content_length.div_ceil(token.partition_size());
                if expected_parts != u64::from(token.total_num_parts()) {
                    return Err(UploadError::InvalidArgument(
                        "persisted part count does not match the supplied content length"
                            .to_string(),
                    ));
                }
                let resume = ResumeState {
                    upload_id: token.upload_id().to_string(),
                };
                (token.partition_size(), Some(resume))
            }
            None => {
                let part_size = match req.part_size {
                    TargetPartSize::Auto => cmp::max(
                        DEFAULT_PART_SIZE_TARGET,
                        content_length.div_ceil(u64::from(MAX_UPLOAD_PARTS)),
                    ),
                    TargetPartSize::Explicit(explicit) => {
                        if explicit < MIN_PART_SIZE {
                            return Err(UploadError::InvalidArgument(format!(
                                "part size must be at least {MIN_PART_SIZE} bytes"
                            )));
                        }
                        explicit
                    }
                };
                (part_size, None)
            }
        };

        let total_num_parts = content_length.div_ceil(part_size);
        if total_num_parts > u64::from(MAX_UPLOAD_PARTS) {
            return Err(UploadError::InvalidArgument(format!(
                "part size {part_size} splits the object into more than {MAX_UPLOAD_PARTS} parts"
            )));
        }
        let total_num_parts = total_num_parts as u32;

        tracing::debug!(
            bucket = %req.bucket,
            key = %req.key,
            content_length,
            part_size,
            total_num_parts,
            resuming = resume.is_some(),
            "starting auto-ranged upload"
        );

        let host = format!("{}.{}", req.bucket, self.inner.config.endpoint_suffix);
        let endpoint = self.inner.acquire_endpoint(&host);

        let (done_tx, done_rx) = oneshot::channel();
        let meta = UploadMetaRequest::new(
            self.inner.clone(),
            endpoint,
            req,
            stream,
            part_size,
            content_length,
            total_num_parts,
            resume,
            done_tx,
        );

        self.inner
            .work_tx
            .send(WorkEvent::Submit(meta.clone()))
            .expect("work loop running");

        Ok(UploadHandle { meta, done_rx })
    }
}

#[derive(Debug)]
pub(crate) struct ClientConfig {
    pub(crate) max_active_connections: usize,
    pub(crate) max_requests_in_flight: usize,
    pub(crate) max_requests_prepare: usize,
    pub(crate) endpoint_suffix: String,
}

#[derive(Debug)]
pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) work_tx: mpsc::UnboundedSender<WorkEvent>,
    pub(crate) synced: Mutex<ClientSynced>,
}

#[derive(Debug, Default)]
pub(crate) struct ClientSynced {
    pub(crate) endpoints: HashMap<String, EndpointEntry>,
    pub(crate) process_work_task_scheduled: bool,
    pub(crate) process_work_task_in_progress: bool,
}

impl ClientInner {
    /// Wake the work loop; a no-op while a wake is already queued.
    ///
    /// Any state change that may produce new work funnels through here. A
    /// wake arriving while the loop is mid-pass must still be delivered, or
    /// a pause/cancel landing in that window would never be acted on; only
    /// the queued flag dedups.
    pub(crate) fn schedule_process_work(&self) {
        {
            let mut synced = self.synced.lock().expect("lock valid");
            if synced.process_work_task_scheduled {
                return;
            }
            tracing::trace!(
                in_progress = synced.process_work_task_in_progress,
                "scheduling work loop pass"
            );
            synced.process_work_task_scheduled = true;
        }
        let _ = self.work_tx.send(WorkEvent::Wake);
    }
}
