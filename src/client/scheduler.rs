/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::client::{ClientConfig, ClientInner};
use crate::error::UploadError;
use crate::request::{Request, RequestTag};
use crate::transport::{S3ResponseMessage, TransportError};
use crate::upload::meta_request::UploadMetaRequest;

/// Events consumed by the work loop
#[derive(Debug)]
pub(crate) enum WorkEvent {
    /// A new upload was submitted to the client
    Submit(Arc<UploadMetaRequest>),
    /// A request finished preparation (successfully or not)
    RequestPrepared(Result<Request, FailedRequest>),
    /// A request finished its network exchange
    RequestFinished {
        request: Request,
        result: Result<S3ResponseMessage, UploadError>,
    },
    /// Re-run the passes; sent by `schedule_process_work`
    Wake,
}

/// A request whose preparation failed
#[derive(Debug)]
pub(crate) struct FailedRequest {
    pub(crate) request: Request,
    pub(crate) error: UploadError,
}

/// Drives every active upload from a single task.
///
/// The loop wakes on any event, drains whatever else is pending, and then
/// runs three passes: ask each upload for new work (update), move prepared
/// requests onto connections (dispatch), and finalize uploads that report
/// no work remaining (retire). All meta-request state machines execute on
/// this task; only preparation bodies and network exchanges run elsewhere.
#[derive(Debug)]
pub(crate) struct Scheduler {
    client: Weak<ClientInner>,
    max_active_connections: usize,
    max_requests_in_flight: usize,
    max_requests_prepare: usize,

    active: Vec<Arc<UploadMetaRequest>>,
    prepared: VecDeque<Request>,
    retired: Vec<Arc<UploadMetaRequest>>,
    /// Per-upload preparation queues. Preparation reads the upload's
    /// sequential stream, so requests of one upload prepare one at a time,
    /// in emission order; uploads prepare concurrently with each other.
    prepare_queues: HashMap<usize, PrepareQueue>,

    num_requests_being_prepared: usize,
    num_requests_in_flight: usize,
    num_requests_network_io: [usize; RequestTag::COUNT],
}

#[derive(Debug, Default)]
struct PrepareQueue {
    pending: VecDeque<Request>,
    active: bool,
}

impl Scheduler {
    pub(crate) fn new(client: Weak<ClientInner>, config: &ClientConfig) -> Self {
        Self {
            client,
            max_active_connections: config.max_active_connections,
            max_requests_in_flight: config.max_requests_in_flight,
            max_requests_prepare: config.max_requests_prepare,
            active: Vec::new(),
            prepared: VecDeque::new(),
            retired: Vec::new(),
            prepare_queues: HashMap::new(),
            num_requests_being_prepared: 0,
            num_requests_in_flight: 0,
            num_requests_network_io: [0; RequestTag::COUNT],
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkEvent>) {
        while let Some(event) = rx.recv().await {
            self.begin_work_pass();
            self.handle_event(event);
            while let Ok(event) = rx.try_recv() {
                self.handle_event(event);
            }
            self.update_pass();
            self.dispatch_pass();
            self.retire_pass();
            self.end_work_pass();
        }
        tracing::trace!("work channel closed, work loop finished");
    }

    fn begin_work_pass(&self) {
        if let Some(client) = self.client.upgrade() {
            let mut synced = client.synced.lock().expect("lock valid");
            synced.process_work_task_in_progress = true;
            synced.process_work_task_scheduled = false;
        }
    }

    fn end_work_pass(&self) {
        if let Some(client) = self.client.upgrade() {
            let mut synced = client.synced.lock().expect("lock valid");
            synced.process_work_task_in_progress = false;
        }
    }

    fn handle_event(&mut self, event: WorkEvent) {
        match event {
            WorkEvent::Submit(meta) => {
                tracing::trace!("upload added to active set");
                self.active.push(meta);
            }
            WorkEvent::RequestPrepared(Ok(request)) => {
                self.num_requests_being_prepared -= 1;
                self.prepare_finished(&request.meta);
                self.prepared.push_back(request);
            }
            WorkEvent::RequestPrepared(Err(failed)) => {
                self.num_requests_being_prepared -= 1;
                self.num_requests_in_flight -= 1;
                let FailedRequest { request, error } = failed;
                let meta = request.meta.clone();
                self.prepare_finished(&meta);
                meta.request_finished(request, Err(error));
            }
            WorkEvent::RequestFinished { request, result } => {
                self.num_requests_network_io[request.tag.index()] -= 1;
                self.num_requests_in_flight -= 1;
                let meta = request.meta.clone();
                meta.request_finished(request, result);
            }
            WorkEvent::Wake => {}
        }
    }

    /// Ask each active upload, in insertion order, for its next request.
    ///
    /// The conservative flag tells uploads to hold back new parts while the
    /// prepare pipeline is saturated; preparation reads part bodies from
    /// the upload's sequential stream and unbounded preparation would
    /// buffer whole objects in memory.
    fn update_pass(&mut self) {
        let metas = self.active.clone();
        for meta in metas {
            loop {
                if self.num_requests_in_flight >= self.max_requests_in_flight {
                    return;
                }
                let conservative = self.num_requests_being_prepared + self.prepared.len()
                    >= self.max_requests_prepare;
                let update = meta.update(conservative);
                match update.request {
                    Some(request) => self.enqueue_prepare(request),
                    None => {
                        if !update.work_remaining {
                            self.retired.push(meta.clone());
                        }
                        break;
                    }
                }
            }
        }
    }

    fn prepare_queue_key(meta: &Arc<UploadMetaRequest>) -> usize {
        Arc::as_ptr(meta) as usize
    }

    fn enqueue_prepare(&mut self, request: Request) {
        self.num_requests_in_flight += 1;
        self.num_requests_being_prepared += 1;

        let key = Self::prepare_queue_key(&request.meta);
        let queue = self.prepare_queues.entry(key).or_default();
        queue.pending.push_back(request);
        if !queue.active {
            self.spawn_next_prepare(key);
        }
    }

    /// Mark the upload's active preparation finished and start its next one
    fn prepare_finished(&mut self, meta: &Arc<UploadMetaRequest>) {
        let key = Self::prepare_queue_key(meta);
        if let Some(queue) = self.prepare_queues.get_mut(&key) {
            queue.active = false;
        }
        self.spawn_next_prepare(key);
    }

    fn spawn_next_prepare(&mut self, key: usize) {
        let next = {
            let Some(queue) = self.prepare_queues.get_mut(&key) else {
                return;
            };
            let next = queue.pending.pop_front();
            if next.is_some() {
                queue.active = true;
            }
            next
        };
        let Some(request) = next else {
            self.prepare_queues.remove(&key);
            return;
        };

        let Some(client) = self.client.upgrade() else {
            return;
        };
        let tx = client.work_tx.clone();
        let span = tracing::debug_span!(
            "prepare-request",
            tag = ?request.tag,
            part_number = request.part_number
        );
        tokio::spawn(
            async move {
                let meta = request.meta.clone();
                // uploads that already finished stop preparing; only the
                // abort still goes through
                let result = if meta.has_finish_result() && !request.flags.always_send {
                    Err(FailedRequest {
                        request,
                        error: UploadError::Canceled,
                    })
                } else {
                    meta.prepare_request(request).await
                };
                let _ = tx.send(WorkEvent::RequestPrepared(result));
            }
            .instrument(span),
        );
    }

    /// Move prepared requests onto connections, up to the connection budget.
    fn dispatch_pass(&mut self) {
        while !self.prepared.is_empty() {
            if self.total_network_io() >= self.max_active_connections {
                break;
            }
            let request = self.prepared.pop_front().expect("queue non-empty");

            // A finished upload stops sending; only requests marked
            // always-send (abort) still go out.
            if request.meta.has_finish_result() && !request.flags.always_send {
                self.num_requests_in_flight -= 1;
                let meta = request.meta.clone();
                meta.request_finished(request, Err(UploadError::Canceled));
                continue;
            }

            self.send_request(request);
        }
    }

    fn send_request(&mut self, request: Request) {
        let Some(client) = self.client.upgrade() else {
            return;
        };
        self.num_requests_network_io[request.tag.index()] += 1;

        let tx = client.work_tx.clone();
        let span = tracing::debug_span!(
            "send-request",
            tag = ?request.tag,
            part_number = request.part_number
        );
        tokio::spawn(
            async move {
                let endpoint = request.meta.endpoint.clone();
                let message = request.message.clone().expect("request prepared");
                let result = endpoint.transport.execute(&endpoint.host, message).await;
                let result = match result {
                    Ok(mut response) if response.status.is_success() => {
                        if !request.flags.record_response_headers {
                            response.headers.clear();
                        }
                        Ok(response)
                    }
                    Ok(response) => Err(UploadError::Transport(TransportError::HttpStatus {
                        status: response.status,
                        response,
                    })),
                    Err(err) => Err(UploadError::Transport(err)),
                };
                let _ = tx.send(WorkEvent::RequestFinished { request, result });
            }
            .instrument(span),
        );
    }

    /// Finalize uploads whose state machine reported no work remaining.
    ///
    /// The user completion fires here, outside every lock.
    fn retire_pass(&mut self) {
        for meta in std::mem::take(&mut self.retired) {
            meta.finalize();
            self.active.retain(|m| !Arc::ptr_eq(m, &meta));
        }
    }

    fn total_network_io(&self) -> usize {
        self.num_requests_network_io.iter().sum()
    }
}
