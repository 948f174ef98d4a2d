/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::io::error::Error;

/// Source of the bytes for one upload.
///
/// A multipart upload fixes its part count before the first request goes
/// out, so every `InputStream` knows its exact content length at build
/// time. The stream is consumed strictly front to back; that ordering is
/// what lets a resumed upload re-read and verify the parts a previous
/// session already sent.
#[derive(Debug)]
pub struct InputStream {
    pub(super) source: StreamSource,
    pub(super) content_length: u64,
}

impl InputStream {
    /// Create a new `InputStream` from a static byte slice
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self::from(Bytes::from_static(bytes))
    }

    /// Exact number of bytes this stream will produce
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Returns a [`FileSliceBuilder`] for uploading a byte range of a
    /// file (eg. one slice of a larger archive).
    ///
    /// ```no_run
    /// use aws_s3_upload_engine::io::InputStream;
    ///
    /// fn input_stream_from_file() -> InputStream {
    ///     InputStream::read_from("docs/some-large-file.csv")
    ///         .offset(1024)
    ///         .length(123_456)
    ///         .build()
    ///         .expect("valid range")
    /// }
    /// ```
    pub fn read_from(path: impl AsRef<Path>) -> FileSliceBuilder {
        FileSliceBuilder::new(path)
    }

    /// Create a new `InputStream` that reads a whole file.
    ///
    /// ## Warning
    /// The contents of the file MUST not change while an upload is in
    /// progress, or between a paused upload and its resume. Resumed uploads
    /// re-read and checksum the already-uploaded prefix; changed bytes fail
    /// the upload.
    pub fn from_path(path: impl AsRef<Path>) -> Result<InputStream, Error> {
        Self::read_from(path).build()
    }
}

#[derive(Debug)]
pub(super) enum StreamSource {
    /// Bytes already in memory
    Memory(Bytes),
    /// A slice of a file, read with positional I/O starting at `offset`
    File { path: PathBuf, offset: u64 },
}

impl Default for InputStream {
    fn default() -> Self {
        Self::from(Bytes::default())
    }
}

impl From<Bytes> for InputStream {
    fn from(value: Bytes) -> Self {
        let content_length = value.len() as u64;
        Self {
            source: StreamSource::Memory(value),
            content_length,
        }
    }
}

impl From<Vec<u8>> for InputStream {
    fn from(value: Vec<u8>) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<&'static [u8]> for InputStream {
    fn from(slice: &'static [u8]) -> InputStream {
        Self::from(Bytes::from_static(slice))
    }
}

impl From<&'static str> for InputStream {
    fn from(slice: &'static str) -> InputStream {
        Self::from(Bytes::from_static(slice.as_bytes()))
    }
}

/// Builder for an [`InputStream`] backed by a byte range of a file.
///
/// The range is checked against the file's actual size when the stream is
/// built. An upload commits to its content length before the first request
/// goes out; a range running past the end of the file would otherwise only
/// surface as a short read partway through the transfer.
#[derive(Debug)]
pub struct FileSliceBuilder {
    path: PathBuf,
    offset: u64,
    length: Option<u64>,
}

impl FileSliceBuilder {
    fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            offset: 0,
            length: None,
        }
    }

    /// Byte offset to start reading from. Default is the start of the file.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Number of bytes to read. Default is everything from the offset to
    /// the end of the file.
    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    /// Stat the file, validate the requested range, and build the stream.
    pub fn build(self) -> Result<InputStream, Error> {
        let file_size = fs::metadata(&self.path)?.len();

        let content_length = match self.length {
            Some(length) => {
                if self.offset.saturating_add(length) > file_size {
                    return Err(Error::range_beyond_end_of_file(
                        self.offset,
                        length,
                        file_size,
                    ));
                }
                length
            }
            None => {
                if self.offset > file_size {
                    return Err(Error::range_beyond_end_of_file(self.offset, 0, file_size));
                }
                file_size - self.offset
            }
        };

        Ok(InputStream {
            source: StreamSource::File {
                path: self.path,
                offset: self.offset,
            },
            content_length,
        })
    }
}
