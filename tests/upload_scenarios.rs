/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! End-to-end upload scenarios against a scripted in-memory transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use aws_s3_upload_engine::checksum::ChecksumAlgorithm;
use aws_s3_upload_engine::client::Client;
use aws_s3_upload_engine::error::UploadError;
use aws_s3_upload_engine::transport::{
    HttpTransport, S3RequestMessage, S3ResponseMessage, TransportError,
};
use aws_s3_upload_engine::types::TargetPartSize;
use aws_s3_upload_engine::upload::{PauseToken, UploadRequest};

const MIB: u64 = 1024 * 1024;
const UPLOAD_ID: &str = "test-upload-id";
const FINAL_ETAG: &str = "3858f62230ac3c915f300c664312c11f-3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    ListParts,
    Create,
    UploadPart,
    Complete,
    Abort,
}

#[derive(Debug, Clone)]
struct Recorded {
    op: Op,
    part_number: Option<u32>,
    path_and_query: String,
    body: Bytes,
}

#[derive(Debug, Clone)]
struct ExistingPart {
    part_number: u32,
    checksum: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    records: Vec<Recorded>,
    existing_parts: Vec<ExistingPart>,
    list_page_size: Option<usize>,
    fail_parts: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Gate {
    Create,
    Part(u32),
}

/// Scripted stand-in for the HTTP stack. Records every issued message and
/// answers with canned multipart responses.
#[derive(Debug, Clone, Default)]
struct MockS3 {
    state: Arc<Mutex<MockState>>,
    gates: Arc<Mutex<HashMap<Gate, Arc<Semaphore>>>>,
}

impl MockS3 {
    fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().records.clone()
    }

    fn ops(&self) -> Vec<Op> {
        self.records().iter().map(|r| r.op).collect()
    }

    fn count_of(&self, op: Op) -> usize {
        self.ops().iter().filter(|o| **o == op).count()
    }

    fn fail_part(&self, part_number: u32) {
        self.state.lock().unwrap().fail_parts.push(part_number);
    }

    fn existing_parts(&self, parts: Vec<ExistingPart>) {
        self.state.lock().unwrap().existing_parts = parts;
    }

    fn list_page_size(&self, page_size: usize) {
        self.state.lock().unwrap().list_page_size = Some(page_size);
    }

    /// Block responses for the given request until released
    fn hold(&self, gate: Gate) -> Arc<Semaphore> {
        let semaphore = Arc::new(Semaphore::new(0));
        self.gates.lock().unwrap().insert(gate, semaphore.clone());
        semaphore
    }

    fn classify(&self, request: &S3RequestMessage) -> (Op, Option<u32>) {
        let query = &request.path_and_query;
        if request.method == Method::GET {
            (Op::ListParts, None)
        } else if request.method == Method::DELETE {
            (Op::Abort, None)
        } else if request.method == Method::PUT {
            let part_number = query
                .split("partNumber=")
                .nth(1)
                .and_then(|rest| rest.split('&').next())
                .and_then(|n| n.parse().ok());
            (Op::UploadPart, part_number)
        } else if query.contains("?uploads") {
            (Op::Create, None)
        } else {
            (Op::Complete, None)
        }
    }

    fn list_parts_response(&self, query: &str) -> String {
        let state = self.state.lock().unwrap();
        let marker: u32 = query
            .split("part-number-marker=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .and_then(|m| m.parse().ok())
            .unwrap_or(0);

        let remaining: Vec<&ExistingPart> = state
            .existing_parts
            .iter()
            .filter(|p| p.part_number > marker)
            .collect();
        let page_size = state.list_page_size.unwrap_or(remaining.len().max(1));
        let page = &remaining[..remaining.len().min(page_size)];
        let truncated = page.len() < remaining.len();

        let mut body = String::from("<ListPartsResult>");
        for part in page {
            body.push_str(&format!(
                "<Part><PartNumber>{}</PartNumber><ETag>&quot;etag-{}&quot;</ETag>",
                part.part_number, part.part_number
            ));
            if let Some(checksum) = &part.checksum {
                body.push_str(&format!("<ChecksumCRC32>{checksum}</ChecksumCRC32>"));
            }
            body.push_str("</Part>");
        }
        body.push_str(&format!("<IsTruncated>{truncated}</IsTruncated>"));
        if truncated {
            body.push_str(&format!(
                "<NextPartNumberMarker>{}</NextPartNumberMarker>",
                page.last().unwrap().part_number
            ));
        }
        body.push_str("</ListPartsResult>");
        body
    }
}

fn response(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> S3ResponseMessage {
    S3ResponseMessage::new(status, headers, body.into())
}

#[async_trait::async_trait]
impl HttpTransport for MockS3 {
    async fn execute(
        &self,
        _host: &str,
        request: S3RequestMessage,
    ) -> Result<S3ResponseMessage, TransportError> {
        let (op, part_number) = self.classify(&request);

        self.state.lock().unwrap().records.push(Recorded {
            op,
            part_number,
            path_and_query: request.path_and_query.clone(),
            body: request.body.clone(),
        });

        let gate_key = match op {
            Op::Create => Some(Gate::Create),
            Op::UploadPart => part_number.map(Gate::Part),
            _ => None,
        };
        if let Some(key) = gate_key {
            let gate = self.gates.lock().unwrap().get(&key).cloned();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await.expect("gate open");
            }
        }

        match op {
            Op::Create => {
                let body = format!(
                    "<InitiateMultipartUploadResult>\
                     <Bucket>test-bucket</Bucket><Key>test-key</Key>\
                     <UploadId>{UPLOAD_ID}</UploadId>\
                     </InitiateMultipartUploadResult>"
                );
                Ok(response(StatusCode::OK, HeaderMap::new(), body))
            }
            Op::UploadPart => {
                let part_number = part_number.expect("part number in query");
                if self.state.lock().unwrap().fail_parts.contains(&part_number) {
                    return Ok(response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        HeaderMap::new(),
                        "<Error><Code>InternalError</Code></Error>",
                    ));
                }
                let mut headers = HeaderMap::new();
                headers.insert(
                    http::header::ETAG,
                    HeaderValue::from_str(&format!("\"etag-{part_number}\"")).unwrap(),
                );
                Ok(response(StatusCode::OK, headers, ""))
            }
            Op::ListParts => {
                let body = self.list_parts_response(&request.path_and_query);
                Ok(response(StatusCode::OK, HeaderMap::new(), body))
            }
            Op::Complete => {
                let body = format!(
                    "<CompleteMultipartUploadResult>\
                     <Location>https://test-bucket.s3.amazonaws.com/test-key</Location>\
                     <ETag>&quot;{FINAL_ETAG}&quot;</ETag>\
                     </CompleteMultipartUploadResult>"
                );
                Ok(response(StatusCode::OK, HeaderMap::new(), body))
            }
            Op::Abort => Ok(response(StatusCode::NO_CONTENT, HeaderMap::new(), "")),
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_client(mock: &MockS3) -> Client {
    Client::builder()
        .transport(mock.clone())
        .throughput_target_gbps(10.0)
        .build()
        .unwrap()
}

fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(10), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition within deadline");
}

fn upload_request(data: Vec<u8>, part_size: u64) -> UploadRequest {
    UploadRequest::builder()
        .bucket("test-bucket")
        .key("test-key")
        .body(data.into())
        .part_size(TargetPartSize::Explicit(part_size))
        .build()
}

#[tokio::test]
async fn test_three_part_upload() {
    init_tracing();
    let mock = MockS3::new();
    let client = test_client(&mock);

    let data = patterned_bytes(12 * MIB as usize);
    let handle = client
        .put_object(upload_request(data.clone(), 5 * MIB))
        .await
        .unwrap();
    let resp = timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(Some(format!("\"{FINAL_ETAG}\"").as_str()), resp.e_tag());
    assert_eq!(Some(UPLOAD_ID), resp.upload_id());

    let records = mock.records();
    assert_eq!(Op::Create, records[0].op);
    assert_eq!(Op::Complete, records.last().unwrap().op);
    assert_eq!(0, mock.count_of(Op::ListParts));
    assert_eq!(0, mock.count_of(Op::Abort));

    // parts are issued in strictly increasing order with the right bodies
    let parts: Vec<&Recorded> = records.iter().filter(|r| r.op == Op::UploadPart).collect();
    let part_numbers: Vec<u32> = parts.iter().map(|r| r.part_number.unwrap()).collect();
    assert_eq!(vec![1, 2, 3], part_numbers);
    assert_eq!(&data[..5 * MIB as usize], &parts[0].body[..]);
    assert_eq!(&data[5 * MIB as usize..10 * MIB as usize], &parts[1].body[..]);
    assert_eq!(&data[10 * MIB as usize..], &parts[2].body[..]);
    assert_eq!(2 * MIB as usize, parts[2].body.len());

    // completion body references every part in order
    let complete = std::str::from_utf8(&records.last().unwrap().body).unwrap();
    assert!(complete.contains("<PartNumber>1</PartNumber><ETag>etag-1</ETag>"));
    assert!(complete.contains("<PartNumber>2</PartNumber><ETag>etag-2</ETag>"));
    assert!(complete.contains("<PartNumber>3</PartNumber><ETag>etag-3</ETag>"));
}

#[tokio::test]
async fn test_exactly_aligned_upload() {
    init_tracing();
    let mock = MockS3::new();
    let client = test_client(&mock);

    let data = patterned_bytes(10 * MIB as usize);
    let handle = client
        .put_object(upload_request(data, 5 * MIB))
        .await
        .unwrap();
    timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .unwrap();

    let parts: Vec<Recorded> = mock
        .records()
        .into_iter()
        .filter(|r| r.op == Op::UploadPart)
        .collect();
    assert_eq!(2, parts.len());
    // no remainder path: both parts are full sized
    assert!(parts.iter().all(|p| p.body.len() == 5 * MIB as usize));
}

#[tokio::test]
async fn test_single_part_still_goes_multipart() {
    init_tracing();
    let mock = MockS3::new();
    let client = test_client(&mock);

    let data = patterned_bytes(MIB as usize);
    let handle = client
        .put_object(upload_request(data, 5 * MIB))
        .await
        .unwrap();
    timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        vec![Op::Create, Op::UploadPart, Op::Complete],
        mock.ops()
    );
    let records = mock.records();
    let part = records.iter().find(|r| r.op == Op::UploadPart).unwrap();
    assert_eq!(Some(1), part.part_number);
    assert_eq!(MIB as usize, part.body.len());
}

#[tokio::test]
async fn test_mid_upload_failure_aborts() {
    init_tracing();
    let mock = MockS3::new();
    mock.fail_part(2);
    // hold part 2's failure until part 3 is on the wire
    let gate = mock.hold(Gate::Part(2));
    let client = test_client(&mock);

    let data = patterned_bytes(15 * MIB as usize);
    let handle = client
        .put_object(upload_request(data, 5 * MIB))
        .await
        .unwrap();

    {
        let mock = mock.clone();
        wait_until(move || {
            mock.records()
                .iter()
                .any(|r| r.op == Op::UploadPart && r.part_number == Some(3))
        })
        .await;
    }
    gate.add_permits(10);

    let err = timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .expect_err("part 2 failed");

    match err {
        UploadError::Transport(TransportError::HttpStatus { status, .. }) => {
            assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let ops = mock.ops();
    assert_eq!(0, mock.count_of(Op::Complete));
    assert_eq!(1, mock.count_of(Op::Abort));
    // the abort goes out only after every in-flight part has finished
    assert_eq!(Op::Abort, *ops.last().unwrap());
    assert_eq!(3, mock.count_of(Op::UploadPart));
}

#[tokio::test]
async fn test_pause_preserves_upload_and_resume_finishes_it() {
    init_tracing();
    let data = patterned_bytes(15 * MIB as usize);

    // phase 1: pause while part 3 is in flight
    let mock = MockS3::new();
    let gate = mock.hold(Gate::Part(3));
    let client = test_client(&mock);

    let progressed = Arc::new(AtomicU32::new(0));
    let progress_count = progressed.clone();
    let req = UploadRequest::builder()
        .bucket("test-bucket")
        .key("test-key")
        .body(data.clone().into())
        .part_size(TargetPartSize::Explicit(5 * MIB))
        .checksum_algorithm(ChecksumAlgorithm::Crc32)
        .on_progress(move |_| {
            progress_count.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let handle = client.put_object(req).await.unwrap();

    // parts 1 and 2 done, part 3 on the wire (held by the mock)
    {
        let progressed = progressed.clone();
        wait_until(move || progressed.load(Ordering::SeqCst) >= 2).await;
    }
    {
        let mock = mock.clone();
        wait_until(move || {
            mock.records()
                .iter()
                .any(|r| r.op == Op::UploadPart && r.part_number == Some(3))
        })
        .await;
    }

    let token = handle.pause().expect("upload is resumable");
    gate.add_permits(10);

    let err = timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .expect_err("paused");
    assert!(matches!(err, UploadError::Paused));

    assert_eq!(0, mock.count_of(Op::Complete));
    assert_eq!(0, mock.count_of(Op::Abort));
    assert_eq!(UPLOAD_ID, token.upload_id());
    assert_eq!(5 * MIB, token.partition_size());
    assert_eq!(3, token.total_num_parts());

    // phase 2: resume with the same stream; the server knows parts 1 and 2
    let token = PauseToken::from_json(&token.to_json()).unwrap();
    let mock = MockS3::new();
    mock.existing_parts(vec![
        ExistingPart {
            part_number: 1,
            checksum: Some(ChecksumAlgorithm::Crc32.checksum(&data[..5 * MIB as usize])),
        },
        ExistingPart {
            part_number: 2,
            checksum: Some(
                ChecksumAlgorithm::Crc32.checksum(&data[5 * MIB as usize..10 * MIB as usize]),
            ),
        },
    ]);
    let client = test_client(&mock);

    let req = UploadRequest::builder()
        .bucket("test-bucket")
        .key("test-key")
        .body(data.clone().into())
        .checksum_algorithm(ChecksumAlgorithm::Crc32)
        .resume(token)
        .build();
    let handle = client.put_object(req).await.unwrap();
    let resp = timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(Some(format!("\"{FINAL_ETAG}\"").as_str()), resp.e_tag());

    // no new multipart upload; only the missing part is re-sent
    assert_eq!(0, mock.count_of(Op::Create));
    assert!(mock.count_of(Op::ListParts) >= 1);
    let records = mock.records();
    let parts: Vec<&Recorded> = records.iter().filter(|r| r.op == Op::UploadPart).collect();
    assert_eq!(1, parts.len());
    assert_eq!(Some(3), parts[0].part_number);
    assert_eq!(&data[10 * MIB as usize..], &parts[0].body[..]);
    assert_eq!(1, mock.count_of(Op::Complete));
}

#[tokio::test]
async fn test_resume_with_all_parts_already_uploaded() {
    init_tracing();
    let data = patterned_bytes(15 * MIB as usize);

    // the pause raced the last part to completion: the server has all three
    let mock = MockS3::new();
    mock.existing_parts(
        (1..=3)
            .map(|part_number| {
                let start = (part_number as usize - 1) * 5 * MIB as usize;
                let end = part_number as usize * 5 * MIB as usize;
                ExistingPart {
                    part_number,
                    checksum: Some(ChecksumAlgorithm::Crc32.checksum(&data[start..end])),
                }
            })
            .collect(),
    );
    let client = test_client(&mock);

    let token = PauseToken::from_json(
        "{\"type\":\"AWS_S3_META_REQUEST_TYPE_PUT_OBJECT\",\
         \"multipart_upload_id\":\"test-upload-id\",\
         \"partition_size\":5242880,\"total_num_parts\":3}",
    )
    .unwrap();
    let req = UploadRequest::builder()
        .bucket("test-bucket")
        .key("test-key")
        .body(data.into())
        .checksum_algorithm(ChecksumAlgorithm::Crc32)
        .resume(token)
        .build();
    let handle = client.put_object(req).await.unwrap();
    let resp = timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(Some(format!("\"{FINAL_ETAG}\"").as_str()), resp.e_tag());
    assert_eq!(0, mock.count_of(Op::Create));
    assert_eq!(0, mock.count_of(Op::UploadPart));
    assert_eq!(1, mock.count_of(Op::Complete));

    // the completion still references every part from the previous session
    let records = mock.records();
    let complete = std::str::from_utf8(&records.last().unwrap().body).unwrap();
    for part_number in 1..=3 {
        assert!(complete.contains(&format!(
            "<PartNumber>{part_number}</PartNumber><ETag>etag-{part_number}</ETag>"
        )));
    }
}

#[tokio::test]
async fn test_resume_with_tampered_stream() {
    init_tracing();
    let mut data = patterned_bytes(15 * MIB as usize);

    let mock = MockS3::new();
    mock.existing_parts(vec![
        ExistingPart {
            part_number: 1,
            checksum: Some(ChecksumAlgorithm::Crc32.checksum(&data[..5 * MIB as usize])),
        },
        ExistingPart {
            part_number: 2,
            checksum: Some(
                ChecksumAlgorithm::Crc32.checksum(&data[5 * MIB as usize..10 * MIB as usize]),
            ),
        },
    ]);

    // flip one byte inside part 1 after the checksums were recorded
    data[3 * MIB as usize] ^= 0xff;

    let client = test_client(&mock);
    let token = PauseToken::from_json(
        "{\"type\":\"AWS_S3_META_REQUEST_TYPE_PUT_OBJECT\",\
         \"multipart_upload_id\":\"test-upload-id\",\
         \"partition_size\":5242880,\"total_num_parts\":3}",
    )
    .unwrap();
    let req = UploadRequest::builder()
        .bucket("test-bucket")
        .key("test-key")
        .body(data.into())
        .checksum_algorithm(ChecksumAlgorithm::Crc32)
        .resume(token)
        .build();
    let handle = client.put_object(req).await.unwrap();
    let err = timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .expect_err("stream changed since pause");

    assert!(matches!(
        err,
        UploadError::ResumedPartChecksumMismatch { part_number: 1 }
    ));
    assert_eq!(0, mock.count_of(Op::Complete));
    // the server-side state is unusable; the upload is aborted
    assert_eq!(1, mock.count_of(Op::Abort));
}

#[tokio::test]
async fn test_list_parts_pagination() {
    init_tracing();
    let data = patterned_bytes(15 * MIB as usize);

    let mock = MockS3::new();
    mock.list_page_size(1);
    mock.existing_parts(vec![
        ExistingPart {
            part_number: 1,
            checksum: None,
        },
        ExistingPart {
            part_number: 2,
            checksum: None,
        },
    ]);
    let client = test_client(&mock);

    let token = PauseToken::from_json(
        "{\"type\":\"AWS_S3_META_REQUEST_TYPE_PUT_OBJECT\",\
         \"multipart_upload_id\":\"test-upload-id\",\
         \"partition_size\":5242880,\"total_num_parts\":3}",
    )
    .unwrap();
    let req = UploadRequest::builder()
        .bucket("test-bucket")
        .key("test-key")
        .body(data.into())
        .resume(token)
        .build();
    let handle = client.put_object(req).await.unwrap();
    timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .unwrap();

    let list_requests: Vec<Recorded> = mock
        .records()
        .into_iter()
        .filter(|r| r.op == Op::ListParts)
        .collect();
    assert_eq!(2, list_requests.len());
    assert!(!list_requests[0].path_and_query.contains("part-number-marker"));
    assert!(list_requests[1]
        .path_and_query
        .contains("part-number-marker=1"));
}

#[tokio::test]
async fn test_cancel_aborts_after_inflight_parts_drain() {
    init_tracing();
    let mock = MockS3::new();
    let gate = mock.hold(Gate::Part(1));
    let client = test_client(&mock);

    let data = patterned_bytes(15 * MIB as usize);
    let handle = client
        .put_object(upload_request(data, 5 * MIB))
        .await
        .unwrap();

    {
        let mock = mock.clone();
        wait_until(move || {
            mock.records()
                .iter()
                .any(|r| r.op == Op::UploadPart && r.part_number == Some(1))
        })
        .await;
    }
    handle.cancel();
    gate.add_permits(10);

    let err = timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .expect_err("canceled");
    assert!(matches!(err, UploadError::Canceled));

    assert_eq!(0, mock.count_of(Op::Complete));
    assert_eq!(1, mock.count_of(Op::Abort));
    assert_eq!(Op::Abort, *mock.ops().last().unwrap());
}

#[tokio::test]
async fn test_pause_before_create_completes_yields_no_token() {
    init_tracing();
    let mock = MockS3::new();
    let gate = mock.hold(Gate::Create);
    let client = test_client(&mock);

    let data = patterned_bytes(15 * MIB as usize);
    let handle = client
        .put_object(upload_request(data, 5 * MIB))
        .await
        .unwrap();

    {
        let mock = mock.clone();
        wait_until(move || mock.count_of(Op::Create) == 1).await;
    }
    // create-multipart-upload has not answered yet: nothing to resume
    let token = handle.pause();
    assert!(token.is_none());
    gate.add_permits(10);

    let err = timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .expect_err("paused");
    assert!(matches!(err, UploadError::Paused));

    // paused uploads never abort, even without a token
    assert_eq!(0, mock.count_of(Op::Abort));
    assert_eq!(0, mock.count_of(Op::Complete));
    assert_eq!(0, mock.count_of(Op::UploadPart));
}

#[tokio::test]
async fn test_upload_completes_with_tight_budgets() {
    init_tracing();
    let mock = MockS3::new();
    // a single budgeted connection saturates the prepare pipeline
    // immediately, so the conservative flag throttles the upload to one
    // part in flight at a time
    let client = Client::builder()
        .transport(mock.clone())
        .max_active_connections(1)
        .build()
        .unwrap();

    let data = patterned_bytes(15 * MIB as usize);
    let handle = client
        .put_object(upload_request(data.clone(), 5 * MIB))
        .await
        .unwrap();
    let resp = timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Some(format!("\"{FINAL_ETAG}\"").as_str()), resp.e_tag());

    let parts: Vec<Option<u32>> = mock
        .records()
        .into_iter()
        .filter(|r| r.op == Op::UploadPart)
        .map(|r| r.part_number)
        .collect();
    assert_eq!(vec![Some(1), Some(2), Some(3)], parts);
}

#[tokio::test]
async fn test_resume_rejects_mismatched_content_length() {
    init_tracing();
    let mock = MockS3::new();
    let client = test_client(&mock);

    // 4 parts of data against a 3 part token
    let data = patterned_bytes(16 * MIB as usize);
    let token = PauseToken::from_json(
        "{\"type\":\"AWS_S3_META_REQUEST_TYPE_PUT_OBJECT\",\
         \"multipart_upload_id\":\"test-upload-id\",\
         \"partition_size\":5242880,\"total_num_parts\":3}",
    )
    .unwrap();
    let req = UploadRequest::builder()
        .bucket("test-bucket")
        .key("test-key")
        .body(data.into())
        .resume(token)
        .build();
    let err = client
        .put_object(req)
        .await
        .expect_err("part count mismatch");
    assert!(matches!(err, UploadError::InvalidArgument(_)));
    assert!(mock.records().is_empty());
}
