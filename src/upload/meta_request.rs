/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Per-upload state machine.
//!
//! An upload meta-request decomposes one logical `PutObject` into the
//! multipart request sequence: an optional list-parts reconciliation (on
//! resume), create-multipart-upload, N upload-parts, and a final
//! complete-multipart-upload, or abort-multipart-upload once a terminal
//! failure is recorded. The scheduler drives it through two operations:
//! [`UploadMetaRequest::update`] hands out the next request (if any) and
//! [`UploadMetaRequest::request_finished`] consumes completions. Neither
//! blocks on I/O; both run on the work loop.

use std::fmt;
use std::sync::{Arc, Mutex};

use http::header::{HeaderMap, HeaderValue, ETAG};
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::checksum::ChecksumAlgorithm;
use crate::client::endpoint::Endpoint;
use crate::client::scheduler::FailedRequest;
use crate::client::ClientInner;
use crate::error::UploadError;
use crate::io::part_reader::PartReader;
use crate::io::InputStream;
use crate::request::{Request, RequestFlags, RequestTag};
use crate::s3::{messages, strip_quotes, xml};
use crate::transport::S3ResponseMessage;
use crate::types::TransferProgress;
use crate::upload::request::UploadRequest;
use crate::upload::response::UploadResponse;
use crate::upload::resume::PauseToken;

/// Prior upload state recovered from a pause token
#[derive(Debug)]
pub(crate) struct ResumeState {
    pub(crate) upload_id: String,
}

/// Terminal condition of an upload. Set once; the first setter wins.
#[derive(Debug)]
enum FinishResult {
    Success,
    Error(UploadError),
}

/// State shared between the work loop and user-facing operations
/// (pause/cancel), guarded by the meta-request mutex. Held only across
/// short critical sections, never across network I/O or stream reads.
#[derive(Debug)]
struct SyncedState {
    total_num_parts: u32,
    num_parts_sent: u32,
    num_parts_completed: u32,
    num_parts_successful: u32,
    num_parts_failed: u32,

    list_parts_sent: bool,
    list_parts_completed: bool,
    create_mpu_sent: bool,
    create_mpu_completed: bool,
    complete_mpu_sent: bool,
    complete_mpu_completed: bool,
    abort_mpu_sent: bool,
    abort_mpu_completed: bool,

    list_parts_error_code: Option<&'static str>,
    create_mpu_error_code: Option<&'static str>,
    complete_mpu_error_code: Option<&'static str>,
    abort_mpu_error_code: Option<&'static str>,

    upload_id: Option<String>,
    /// ETags of successfully uploaded parts, indexed by part number - 1
    etag_list: Vec<Option<String>>,
    /// Base64 part digests, indexed by part number - 1. Populated from
    /// upload-part preparation or, on resume, from list-parts; read back
    /// for the complete body and for resume verification.
    checksums_list: Vec<Option<String>>,
    list_parts_continuation_token: Option<String>,
    /// Response headers snapshotted from create-multipart-upload (or the
    /// initial request, on resume) and merged into the final response
    needed_response_headers: HeaderMap,

    finish_result: Option<FinishResult>,
    finalized: bool,
    final_response: Option<UploadResponse>,
    done_tx: Option<oneshot::Sender<Result<UploadResponse, UploadError>>>,
}

/// State touched only by `update()` on the work loop
#[derive(Debug)]
struct ThreadedState {
    /// Next part number to hand out; monotonic over 1..=total_num_parts
    next_part_number: u32,
}

/// State owned by request preparation. The async mutex serializes stream
/// access: the input is strictly sequential, so part bodies must come off
/// it in part-number order.
#[derive(Debug)]
struct PrepareState {
    reader: PartReader,
    num_parts_read_from_stream: u32,
}

/// Result of asking a meta-request for work
#[derive(Debug)]
pub(crate) struct UpdateResult {
    pub(crate) request: Option<Request>,
    /// False once the upload has fully wound down; the scheduler then
    /// retires the meta-request and fires the user completion.
    pub(crate) work_remaining: bool,
}

pub(crate) struct UploadMetaRequest {
    pub(crate) client: Arc<ClientInner>,
    pub(crate) endpoint: Arc<Endpoint>,
    request: UploadRequest,
    part_size: u64,
    content_length: u64,
    total_num_parts: u32,
    checksum_algorithm: Option<ChecksumAlgorithm>,
    synced: Mutex<SyncedState>,
    threaded: Mutex<ThreadedState>,
    prepare: AsyncMutex<PrepareState>,
}

impl UploadMetaRequest {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        client: Arc<ClientInner>,
        endpoint: Arc<Endpoint>,
        request: UploadRequest,
        stream: InputStream,
        part_size: u64,
        content_length: u64,
        total_num_parts: u32,
        resume: Option<ResumeState>,
        done_tx: oneshot::Sender<Result<UploadResponse, UploadError>>,
    ) -> Arc<Self> {
        let mut synced = SyncedState {
            total_num_parts,
            num_parts_sent: 0,
            num_parts_completed: 0,
            num_parts_successful: 0,
            num_parts_failed: 0,
            list_parts_sent: false,
            list_parts_completed: false,
            create_mpu_sent: false,
            create_mpu_completed: false,
            complete_mpu_sent: false,
            complete_mpu_completed: false,
            abort_mpu_sent: false,
            abort_mpu_completed: false,
            list_parts_error_code: None,
            create_mpu_error_code: None,
            complete_mpu_error_code: None,
            abort_mpu_error_code: None,
            upload_id: None,
            etag_list: vec![None; total_num_parts as usize],
            checksums_list: vec![None; total_num_parts as usize],
            list_parts_continuation_token: None,
            needed_response_headers: HeaderMap::new(),
            finish_result: None,
            finalized: false,
            final_response: None,
            done_tx: Some(done_tx),
        };

        match resume {
            Some(state) => {
                // Create-multipart-upload never runs on resume: the upload id
                // comes from the token and the parts already on the server
                // are reconciled through list-parts.
                synced.create_mpu_sent = true;
                synced.create_mpu_completed = true;
                synced.upload_id = Some(state.upload_id);

                // The headers create-multipart-upload would have snapshotted
                // come from the initial request instead.
                let mut needed = HeaderMap::new();
                messages::copy_headers(
                    &request.headers,
                    &mut needed,
                    &messages::CREATE_MPU_RESPONSE_COPY_HEADERS,
                );
                synced.needed_response_headers = needed;
            }
            None => {
                synced.list_parts_sent = true;
                synced.list_parts_completed = true;
            }
        }

        let checksum_algorithm = request.checksum_algorithm;
        Arc::new(Self {
            client,
            endpoint,
            request,
            part_size,
            content_length,
            total_num_parts,
            checksum_algorithm,
            synced: Mutex::new(synced),
            threaded: Mutex::new(ThreadedState {
                next_part_number: 1,
            }),
            prepare: AsyncMutex::new(PrepareState {
                reader: PartReader::new(stream),
                num_parts_read_from_stream: 0,
            }),
        })
    }

    /// Hand the scheduler this upload's next request, if it has one.
    ///
    /// With the conservative flag set, no new part is started while another
    /// part of this upload is still in flight; parts must read the
    /// sequential input in order, so piling up in-flight parts forces the
    /// stream through preparation buffering when the pipeline is already
    /// saturated.
    pub(crate) fn update(self: &Arc<Self>, conservative: bool) -> UpdateResult {
        let mut request = None;
        let mut work_remaining = true;

        let mut synced = self.synced.lock().expect("lock valid");
        if synced.finish_result.is_none() {
            // progress sub-machine
            if !synced.list_parts_sent {
                request = Some(Request::new(
                    self.clone(),
                    RequestTag::ListParts,
                    0,
                    RequestFlags::record_response_headers(),
                ));
                synced.list_parts_sent = true;
            } else if !synced.list_parts_completed {
                // waiting on list-parts
            } else if !synced.create_mpu_sent {
                request = Some(Request::new(
                    self.clone(),
                    RequestTag::CreateMultipartUpload,
                    0,
                    RequestFlags::record_response_headers(),
                ));
                synced.create_mpu_sent = true;
            } else if !synced.create_mpu_completed {
                // waiting on create-multipart-upload
            } else if synced.num_parts_sent < synced.total_num_parts {
                let mut threaded = self.threaded.lock().expect("lock valid");

                // skip over parts a previous session already uploaded;
                // preparation will advance the stream past them
                while (threaded.next_part_number as usize) <= synced.etag_list.len()
                    && synced.etag_list[(threaded.next_part_number - 1) as usize].is_some()
                {
                    threaded.next_part_number += 1;
                }
                debug_assert!(threaded.next_part_number <= synced.total_num_parts);

                let num_parts_in_flight = synced.num_parts_sent - synced.num_parts_completed;
                if conservative && num_parts_in_flight > 0 {
                    // hold this part back until the pipeline drains
                } else {
                    let part_number = threaded.next_part_number;
                    threaded.next_part_number += 1;
                    synced.num_parts_sent += 1;
                    tracing::debug!(part_number, "starting part upload");
                    request = Some(Request::new(
                        self.clone(),
                        RequestTag::UploadPart,
                        part_number,
                        RequestFlags::record_response_headers(),
                    ));
                }
            } else if synced.num_parts_completed != synced.total_num_parts {
                // parts still in flight
            } else if !synced.complete_mpu_sent {
                request = Some(Request::new(
                    self.clone(),
                    RequestTag::CompleteMultipartUpload,
                    0,
                    RequestFlags::record_response_headers(),
                ));
                synced.complete_mpu_sent = true;
            } else if !synced.complete_mpu_completed {
                // waiting on complete-multipart-upload
            } else {
                synced.finish_result = Some(FinishResult::Success);
                work_remaining = false;
            }
        } else {
            // termination sub-machine: wind down without starting new parts
            // and decide whether the server-side upload must be aborted
            if !synced.create_mpu_sent {
                work_remaining = false;
            } else if !synced.create_mpu_completed {
                // wait for create-multipart-upload to land
            } else if synced.num_parts_completed < synced.num_parts_sent {
                // wait for in-flight parts
            } else if synced.complete_mpu_sent && !synced.complete_mpu_completed {
                // wait for complete-multipart-upload; aborting while it is in
                // flight would race the server
            } else if matches!(
                synced.finish_result,
                Some(FinishResult::Error(ref error)) if error.preserves_upload()
            ) {
                // paused or resume-failed: leave server-side parts in place
                work_remaining = false;
            } else if synced.complete_mpu_completed && synced.complete_mpu_error_code.is_none() {
                // the upload actually made it; nothing to abort
                work_remaining = false;
            } else if !synced.abort_mpu_sent {
                if synced.upload_id.is_none() {
                    work_remaining = false;
                } else {
                    request = Some(Request::new(
                        self.clone(),
                        RequestTag::AbortMultipartUpload,
                        0,
                        RequestFlags::always_send(),
                    ));
                    synced.abort_mpu_sent = true;
                }
            } else if !synced.abort_mpu_completed {
                // wait for abort-multipart-upload
            } else {
                work_remaining = false;
            }
        }

        UpdateResult {
            request,
            work_remaining,
        }
    }

    /// Build the wire message for a request.
    ///
    /// Upload-part preparation reads the part body off the sequential
    /// stream, on the first preparation only; a re-prepared request keeps
    /// the body it already has.
    pub(crate) async fn prepare_request(
        self: &Arc<Self>,
        mut request: Request,
    ) -> Result<Request, FailedRequest> {
        let result = self.prepare_request_inner(&mut request).await;
        request.num_times_prepared += 1;
        match result {
            Ok(message) => {
                request.message = Some(message);
                Ok(request)
            }
            Err(error) => Err(FailedRequest { request, error }),
        }
    }

    async fn prepare_request_inner(
        &self,
        request: &mut Request,
    ) -> Result<crate::transport::S3RequestMessage, UploadError> {
        match request.tag {
            RequestTag::ListParts => {
                let (upload_id, marker) = {
                    let synced = self.synced.lock().expect("lock valid");
                    (
                        synced.upload_id.clone().ok_or(UploadError::MissingUploadId)?,
                        synced.list_parts_continuation_token.clone(),
                    )
                };
                Ok(messages::list_parts(
                    &self.request.key,
                    &upload_id,
                    marker.as_deref(),
                    &self.request.headers,
                ))
            }
            RequestTag::CreateMultipartUpload => Ok(messages::create_multipart_upload(
                &self.request.key,
                self.checksum_algorithm,
                &self.request.headers,
            )),
            RequestTag::UploadPart => {
                if request.num_times_prepared == 0 {
                    request.body = self.read_part_body(request.part_number).await?;
                }
                let checksum = self
                    .checksum_algorithm
                    .map(|algorithm| (algorithm, algorithm.checksum(&request.body)));
                let upload_id = {
                    let mut synced = self.synced.lock().expect("lock valid");
                    if let Some((_, digest)) = &checksum {
                        synced.checksums_list[(request.part_number - 1) as usize] =
                            Some(digest.clone());
                    }
                    synced.upload_id.clone().ok_or(UploadError::MissingUploadId)?
                };
                Ok(messages::upload_part(
                    &self.request.key,
                    &upload_id,
                    request.part_number,
                    request.body.clone(),
                    checksum
                        .as_ref()
                        .map(|(algorithm, digest)| (*algorithm, digest.as_str())),
                    &self.request.headers,
                ))
            }
            RequestTag::CompleteMultipartUpload => {
                if request.num_times_prepared == 0 {
                    // the final parts may have been uploaded by a previous
                    // session; the stream still has to be read (and verified)
                    // through the end of the object
                    let mut prepare = self.prepare.lock().await;
                    self.skip_parts_from_stream(&mut prepare, self.total_num_parts)
                        .await?;
                }
                let (upload_id, body) = {
                    let synced = self.synced.lock().expect("lock valid");
                    let upload_id =
                        synced.upload_id.clone().ok_or(UploadError::MissingUploadId)?;
                    let mut parts = Vec::with_capacity(synced.etag_list.len());
                    for (index, etag) in synced.etag_list.iter().enumerate() {
                        let part_number = index as u32 + 1;
                        let e_tag = etag.clone().ok_or_else(|| {
                            UploadError::InvalidArgument(format!(
                                "no etag recorded for part {part_number}"
                            ))
                        })?;
                        parts.push(xml::CompletedPart::new(
                            part_number,
                            e_tag,
                            self.checksum_algorithm,
                            synced.checksums_list[index].clone(),
                        ));
                    }
                    let body = xml::serialize_complete_multipart_upload(
                        &xml::CompleteMultipartUpload { parts },
                    )
                    .map_err(|err| {
                        UploadError::InvalidArgument(format!(
                            "failed to serialize complete-multipart-upload body: {err}"
                        ))
                    })?;
                    (upload_id, body)
                };
                Ok(messages::complete_multipart_upload(
                    &self.request.key,
                    &upload_id,
                    body,
                    &self.request.headers,
                ))
            }
            RequestTag::AbortMultipartUpload => {
                let upload_id = {
                    let synced = self.synced.lock().expect("lock valid");
                    synced.upload_id.clone().ok_or(UploadError::MissingUploadId)?
                };
                tracing::debug!(upload_id = %upload_id, "aborting multipart upload");
                Ok(messages::abort_multipart_upload(
                    &self.request.key,
                    &upload_id,
                    &self.request.headers,
                ))
            }
        }
    }

    /// Read this part's body off the front of the sequential stream.
    ///
    /// The scheduler prepares an upload's requests one at a time, in
    /// emission order, so by the time part N prepares every earlier part
    /// has either taken its bytes already or was uploaded by a previous
    /// session (in which case skip-forward consumes and verifies it here).
    async fn read_part_body(&self, part_number: u32) -> Result<bytes::Bytes, UploadError> {
        let body_size = self.part_body_size(part_number) as usize;
        let mut prepare = self.prepare.lock().await;
        self.skip_parts_from_stream(&mut prepare, part_number - 1)
            .await?;
        let body = prepare
            .reader
            .read_exact(body_size)
            .await
            .map_err(UploadError::Io)?;
        prepare.num_parts_read_from_stream = part_number;
        Ok(body)
    }

    /// Advance the stream up to (excluding) `skip_until_part_number`,
    /// verifying each skipped part against the checksum recorded for it.
    ///
    /// Skipped bytes belong to parts uploaded before a pause; if the input
    /// changed in the meantime the upload must not complete.
    async fn skip_parts_from_stream(
        &self,
        prepare: &mut PrepareState,
        skip_until_part_number: u32,
    ) -> Result<(), UploadError> {
        if prepare.num_parts_read_from_stream >= skip_until_part_number {
            return Ok(());
        }

        tracing::debug!(
            from_part = prepare.num_parts_read_from_stream + 1,
            to_part = skip_until_part_number,
            "skipping parts uploaded by a previous session"
        );

        for part_index in prepare.num_parts_read_from_stream..skip_until_part_number {
            let part_number = part_index + 1;
            let body_size = self.part_body_size(part_number) as usize;
            let body = prepare
                .reader
                .read_exact(body_size)
                .await
                .map_err(|err| {
                    tracing::error!("failed to resume upload; input stream cannot be read");
                    UploadError::ResumeFailed(err)
                })?;
            prepare.num_parts_read_from_stream = part_number;

            if let Some(algorithm) = self.checksum_algorithm {
                let previous = {
                    let synced = self.synced.lock().expect("lock valid");
                    synced.checksums_list[part_index as usize].clone()
                };
                if let Some(previous) = previous {
                    if algorithm.checksum(&body) != previous {
                        tracing::error!(
                            part_number,
                            "checksum for previously uploaded part does not match new part"
                        );
                        return Err(UploadError::ResumedPartChecksumMismatch { part_number });
                    }
                }
            }
        }

        Ok(())
    }

    /// Consume a completed request, updating the state machine.
    pub(crate) fn request_finished(
        &self,
        request: Request,
        result: Result<S3ResponseMessage, UploadError>,
    ) {
        match request.tag {
            RequestTag::ListParts => self.list_parts_finished(result),
            RequestTag::CreateMultipartUpload => self.create_mpu_finished(result),
            RequestTag::UploadPart => self.upload_part_finished(request.part_number, result),
            RequestTag::CompleteMultipartUpload => self.complete_mpu_finished(result),
            RequestTag::AbortMultipartUpload => self.abort_mpu_finished(result),
        }
    }

    fn list_parts_finished(&self, result: Result<S3ResponseMessage, UploadError>) {
        let mut synced = self.synced.lock().expect("lock valid");
        match result {
            Ok(response) => match self.record_listed_parts(&mut synced, &response.body) {
                Ok(has_more_results) => {
                    if has_more_results {
                        // ask for the next page
                        synced.list_parts_sent = false;
                    } else {
                        synced.list_parts_completed = true;
                        let prior_parts =
                            synced.etag_list.iter().filter(|etag| etag.is_some()).count() as u32;
                        synced.num_parts_sent += prior_parts;
                        synced.num_parts_completed += prior_parts;
                        synced.num_parts_successful += prior_parts;
                        tracing::debug!(
                            completed = prior_parts,
                            total = synced.total_num_parts,
                            "resuming upload; parts completed during a previous session"
                        );
                    }
                }
                Err(error) => {
                    synced.list_parts_completed = true;
                    synced.list_parts_error_code = Some(error.code());
                    self.set_fail_synced(&mut synced, error);
                }
            },
            Err(error) => {
                synced.list_parts_completed = true;
                synced.list_parts_error_code = Some(error.code());
                self.set_fail_synced(&mut synced, error);
            }
        }
    }

    /// Fold one page of list-parts results into the etag and checksum
    /// lists. Returns whether more pages remain.
    fn record_listed_parts(
        &self,
        synced: &mut SyncedState,
        body: &[u8],
    ) -> Result<bool, UploadError> {
        let parsed = xml::parse_list_parts(body)
            .map_err(|err| UploadError::ListPartsParseFailed(err.to_string()))?;

        for part in &parsed.parts {
            if part.part_number == 0 || part.part_number > synced.total_num_parts {
                return Err(UploadError::ListPartsParseFailed(format!(
                    "listed part number {} out of range",
                    part.part_number
                )));
            }
            let index = (part.part_number - 1) as usize;
            synced.etag_list[index] = Some(strip_quotes(&part.e_tag));
            if let Some(algorithm) = self.checksum_algorithm {
                if let Some(checksum) = part.checksum(algorithm) {
                    synced.checksums_list[index] = Some(checksum.to_string());
                }
            }
        }

        if parsed.is_truncated {
            match parsed.next_part_number_marker {
                Some(marker) => {
                    synced.list_parts_continuation_token = Some(marker);
                    Ok(true)
                }
                None => Err(UploadError::ListPartsParseFailed(
                    "truncated response without a continuation marker".to_string(),
                )),
            }
        } else {
            Ok(false)
        }
    }

    fn create_mpu_finished(&self, result: Result<S3ResponseMessage, UploadError>) {
        let outcome = result.and_then(|response| {
            let upload_id = xml::parse_initiate_result(&response.body)
                .map_err(|_| UploadError::MissingUploadId)?
                .upload_id;

            // snapshot the headers needed for the final, transformed response
            let mut needed = HeaderMap::new();
            messages::copy_headers(
                &response.headers,
                &mut needed,
                &messages::CREATE_MPU_RESPONSE_COPY_HEADERS,
            );
            Ok((upload_id, needed))
        });

        let mut synced = self.synced.lock().expect("lock valid");
        synced.create_mpu_completed = true;
        match outcome {
            Ok((upload_id, needed)) => {
                tracing::debug!(upload_id = %upload_id, "multipart upload started");
                synced.upload_id = Some(upload_id);
                synced.needed_response_headers = needed;
            }
            Err(error) => {
                synced.create_mpu_error_code = Some(error.code());
                self.set_fail_synced(&mut synced, error);
            }
        }
    }

    fn upload_part_finished(&self, part_number: u32, result: Result<S3ResponseMessage, UploadError>) {
        let part_index = (part_number - 1) as usize;
        let outcome = result.and_then(|response| {
            response
                .headers
                .get(ETAG)
                .and_then(|value| value.to_str().ok())
                .map(strip_quotes)
                .ok_or(UploadError::MissingUploadId)
        });

        if outcome.is_ok() {
            if let Some(listener) = &self.request.progress_listener {
                listener(TransferProgress {
                    bytes_transferred: self.part_size,
                    content_length: self.content_length,
                });
            }
        }

        let mut synced = self.synced.lock().expect("lock valid");
        synced.num_parts_completed += 1;
        tracing::debug!(
            part_number,
            completed = synced.num_parts_completed,
            successful = synced.num_parts_successful,
            failed = synced.num_parts_failed,
            total = synced.total_num_parts,
            "part finished"
        );
        match outcome {
            Ok(etag) => {
                synced.num_parts_successful += 1;
                synced.etag_list[part_index] = Some(etag);
            }
            Err(error) => {
                synced.num_parts_failed += 1;
                self.set_fail_synced(&mut synced, error);
            }
        }
    }

    fn complete_mpu_finished(&self, result: Result<S3ResponseMessage, UploadError>) {
        match result {
            Ok(response) => {
                // The service can fail a complete-multipart-upload inside an
                // HTTP 200; the body is the only signal.
                if let Some(error_doc) = xml::parse_error_document(&response.body) {
                    tracing::error!(
                        code = %error_doc.code,
                        "complete-multipart-upload returned an error body"
                    );
                    let error = UploadError::Service {
                        code: error_doc.code,
                        message: error_doc.message,
                    };
                    let mut synced = self.synced.lock().expect("lock valid");
                    synced.complete_mpu_completed = true;
                    synced.complete_mpu_error_code = Some(error.code());
                    self.set_fail_synced(&mut synced, error);
                    return;
                }

                let object_etag = xml::parse_complete_result(&response.body)
                    .ok()
                    .and_then(|parsed| parsed.e_tag);

                let mut final_headers = response.headers.clone();
                let mut synced = self.synced.lock().expect("lock valid");
                for (name, value) in synced.needed_response_headers.iter() {
                    final_headers.insert(name.clone(), value.clone());
                }
                if let Some(etag) = &object_etag {
                    if let Ok(value) = HeaderValue::from_str(etag) {
                        final_headers.insert(ETAG, value);
                    }
                }

                let e_tag = final_headers
                    .get(ETAG)
                    .and_then(|value| value.to_str().ok())
                    .map(|value| value.to_string());
                synced.final_response = Some(UploadResponse {
                    e_tag,
                    upload_id: synced.upload_id.clone(),
                    status: Some(response.status),
                    headers: final_headers,
                });
                synced.complete_mpu_completed = true;
                tracing::debug!("multipart upload completed");
            }
            Err(error) => {
                let mut synced = self.synced.lock().expect("lock valid");
                synced.complete_mpu_completed = true;
                synced.complete_mpu_error_code = Some(error.code());
                self.set_fail_synced(&mut synced, error);
            }
        }
    }

    fn abort_mpu_finished(&self, result: Result<S3ResponseMessage, UploadError>) {
        let mut synced = self.synced.lock().expect("lock valid");
        if let Err(error) = &result {
            tracing::debug!(error = %error, "abort-multipart-upload failed");
            synced.abort_mpu_error_code = Some(error.code());
        }
        synced.abort_mpu_completed = true;
    }

    /// Record a terminal failure. The first setter wins; in-flight requests
    /// run to completion but their results no longer change the outcome.
    fn set_fail_synced(&self, synced: &mut SyncedState, error: UploadError) {
        if synced.finish_result.is_none() {
            tracing::debug!(error = %error, code = error.code(), "upload failed");
            synced.finish_result = Some(FinishResult::Error(error));
        }
    }

    /// Pause the upload, preserving server-side parts for a later resume.
    ///
    /// Returns a token only once create-multipart-upload has completed;
    /// before that there is nothing to resume.
    pub(crate) fn pause(&self) -> Option<PauseToken> {
        let token = {
            let mut synced = self.synced.lock().expect("lock valid");
            let token = if synced.create_mpu_completed {
                synced.upload_id.as_ref().map(|upload_id| {
                    PauseToken::new(
                        upload_id.clone(),
                        self.part_size,
                        synced.total_num_parts,
                    )
                })
            } else {
                None
            };
            self.set_fail_synced(&mut synced, UploadError::Paused);
            token
        };
        self.client.schedule_process_work();
        token
    }

    /// Cancel the upload. The termination sequence aborts the server-side
    /// multipart upload once in-flight requests drain.
    pub(crate) fn cancel(&self) {
        {
            let mut synced = self.synced.lock().expect("lock valid");
            self.set_fail_synced(&mut synced, UploadError::Canceled);
        }
        self.client.schedule_process_work();
    }

    pub(crate) fn has_finish_result(&self) -> bool {
        let synced = self.synced.lock().expect("lock valid");
        synced.finish_result.is_some() || synced.finalized
    }

    /// Deliver the user completion (exactly once) and release the endpoint.
    ///
    /// Called by the scheduler's retire pass, outside every lock.
    pub(crate) fn finalize(&self) {
        let (done_tx, outcome) = {
            let mut synced = self.synced.lock().expect("lock valid");
            synced.finalized = true;
            let Some(done_tx) = synced.done_tx.take() else {
                return;
            };
            tracing::trace!(
                list_parts_error = ?synced.list_parts_error_code,
                create_error = ?synced.create_mpu_error_code,
                complete_error = ?synced.complete_mpu_error_code,
                abort_error = ?synced.abort_mpu_error_code,
                "per-phase outcomes"
            );
            let outcome = match synced.finish_result.take() {
                Some(FinishResult::Error(error)) => Err(error),
                Some(FinishResult::Success) | None => {
                    Ok(synced.final_response.take().unwrap_or_default())
                }
            };
            (done_tx, outcome)
        };

        // release_endpoint takes the client lock itself
        self.client.release_endpoint(&self.endpoint);

        match &outcome {
            Ok(_) => tracing::debug!("upload finished successfully"),
            Err(error) => tracing::debug!(code = error.code(), "upload finished with error"),
        }
        let _ = done_tx.send(outcome);
    }

    /// Size of the request body for a given part: `part_size` for every
    /// part but the last, which carries whatever remains.
    fn part_body_size(&self, part_number: u32) -> u64 {
        let mut body_size = self.part_size;
        if part_number == self.total_num_parts {
            let remainder = self.content_length % self.part_size;
            if remainder > 0 {
                body_size = remainder;
            }
        }
        body_size
    }
}

impl fmt::Debug for UploadMetaRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadMetaRequest")
            .field("bucket", &self.request.bucket)
            .field("key", &self.request.key)
            .field("part_size", &self.part_size)
            .field("content_length", &self.content_length)
            .field("total_num_parts", &self.total_num_parts)
            .finish_non_exhaustive()
    }
}
