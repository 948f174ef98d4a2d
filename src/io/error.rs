/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::error::Error as StdError;
use std::fmt;
use std::fmt::Formatter;
use std::io::{Error as StdIoError, ErrorKind as StdIoErrorKind};
use tokio::task::JoinError;

#[derive(Debug)]
pub(crate) enum ErrorKind {
    RangeBeyondEndOfFile {
        offset: u64,
        length: u64,
        file_size: u64,
    },
    StreamExhausted,
    TaskFailed(JoinError),
    IoError(StdIoError),
}

/// An I/O related error occurred
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn range_beyond_end_of_file(offset: u64, length: u64, file_size: u64) -> Error {
        ErrorKind::RangeBeyondEndOfFile {
            offset,
            length,
            file_size,
        }
        .into()
    }

    pub(crate) fn stream_exhausted() -> Error {
        ErrorKind::StreamExhausted.into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl From<StdIoError> for Error {
    fn from(err: StdIoError) -> Self {
        ErrorKind::IoError(err).into()
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        ErrorKind::TaskFailed(err).into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::RangeBeyondEndOfFile {
                offset,
                length,
                file_size,
            } => write!(
                f,
                "requested byte range (offset {offset}, length {length}) is beyond the end of the file ({file_size} bytes)"
            ),
            ErrorKind::StreamExhausted => write!(
                f,
                "input stream ended before the advertised content length was read"
            ),
            ErrorKind::IoError(_) => write!(f, "I/O error"),
            ErrorKind::TaskFailed(_) => write!(f, "task failed"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::RangeBeyondEndOfFile { .. } => None,
            ErrorKind::StreamExhausted => None,
            ErrorKind::IoError(err) => Some(err as _),
            ErrorKind::TaskFailed(err) => Some(err as _),
        }
    }
}

impl From<Error> for StdIoError {
    fn from(err: Error) -> Self {
        StdIoError::new(StdIoErrorKind::Other, err)
    }
}
