/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::path::PathBuf;

use bytes::Bytes;

use crate::io::error::Error;
use crate::io::stream::{InputStream, StreamSource};

/// Sequential reader handing out part bodies from an [`InputStream`].
///
/// Every read consumes exactly the requested number of bytes from the front
/// of the stream. The engine decides the size of each read (the part-size
/// law lives with the upload state machine) and relies on the strict
/// ordering to line part bodies up with part numbers.
#[derive(Debug)]
pub(crate) struct PartReader {
    source: Source,
}

#[derive(Debug)]
enum Source {
    Memory {
        buf: Bytes,
    },
    File {
        path: PathBuf,
        offset: u64,
        remaining: u64,
    },
}

impl PartReader {
    pub(crate) fn new(stream: InputStream) -> Self {
        let remaining = stream.content_length;
        let source = match stream.source {
            StreamSource::Memory(buf) => Source::Memory { buf },
            StreamSource::File { path, offset } => Source::File {
                path,
                offset,
                remaining,
            },
        };
        Self { source }
    }

    /// Read exactly `len` bytes off the front of the stream.
    ///
    /// Fails with a stream-exhausted error if fewer than `len` bytes remain;
    /// the advertised content length and the actual stream contents must
    /// agree.
    pub(crate) async fn read_exact(&mut self, len: usize) -> Result<Bytes, Error> {
        match &mut self.source {
            Source::Memory { buf } => {
                if buf.len() < len {
                    return Err(Error::stream_exhausted());
                }
                Ok(buf.split_to(len))
            }
            Source::File {
                path,
                offset,
                remaining,
            } => {
                if *remaining < len as u64 {
                    return Err(Error::stream_exhausted());
                }
                let path = path.clone();
                let read_offset = *offset;
                let data = tokio::task::spawn_blocking(move || {
                    let mut dst = vec![0u8; len];
                    file_util::read_file_chunk_sync(&mut dst, path, read_offset)?;
                    Ok::<Bytes, Error>(Bytes::from(dst))
                })
                .await??;
                *offset += len as u64;
                *remaining -= len as u64;
                Ok(data)
            }
        }
    }
}

mod file_util {
    #[cfg(unix)]
    pub(super) use unix::read_file_chunk_sync;
    #[cfg(windows)]
    pub(super) use windows::read_file_chunk_sync;

    #[cfg(unix)]
    mod unix {
        use std::fs::File;
        use std::io;
        use std::os::unix::fs::FileExt;
        use std::path::Path;

        pub(crate) fn read_file_chunk_sync(
            dst: &mut [u8],
            path: impl AsRef<Path>,
            offset: u64,
        ) -> Result<(), io::Error> {
            let file = File::open(path)?;
            file.read_exact_at(dst, offset)
        }
    }

    #[cfg(windows)]
    mod windows {
        use std::fs::File;
        use std::io;
        use std::io::{Read, Seek, SeekFrom};
        use std::path::Path;

        pub(crate) fn read_file_chunk_sync(
            dst: &mut [u8],
            path: impl AsRef<Path>,
            offset: u64,
        ) -> Result<(), io::Error> {
            let mut file = File::open(path)?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(dst)
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use bytes::Bytes;
    use tempfile::NamedTempFile;

    use crate::io::part_reader::PartReader;
    use crate::io::InputStream;

    async fn collect_parts(mut reader: PartReader, sizes: &[usize]) -> Vec<Bytes> {
        let mut parts = Vec::new();
        for size in sizes {
            parts.push(reader.read_exact(*size).await.unwrap());
        }
        parts
    }

    #[tokio::test]
    async fn test_memory_reader() {
        let data = Bytes::from("a lep is a ball, a tay is a hammer, a flix is a comb");
        let stream = InputStream::from(data.clone());
        let reader = PartReader::new(stream);
        let parts = collect_parts(reader, &[16, 19, 17]).await;

        assert_eq!(b"a lep is a ball,".as_slice(), &parts[0][..]);
        assert_eq!(b" a tay is a hammer,".as_slice(), &parts[1][..]);
        assert_eq!(b" a flix is a comb".as_slice(), &parts[2][..]);
    }

    #[tokio::test]
    async fn test_memory_reader_exhausted() {
        let stream = InputStream::from(Bytes::from_static(b"abc"));
        let mut reader = PartReader::new(stream);
        reader.read_exact(2).await.unwrap();
        reader.read_exact(2).await.expect_err("only one byte left");
    }

    #[tokio::test]
    async fn test_file_reader() {
        let mut tmp = NamedTempFile::new().unwrap();
        let data = Bytes::from("a lep is a ball, a tay is a hammer, a flix is a comb");
        tmp.write_all(&data).unwrap();

        let stream = InputStream::from_path(tmp.path()).unwrap();
        let reader = PartReader::new(stream);
        let parts = collect_parts(reader, &[20, 20, 12]).await;

        let actual: Vec<u8> = parts.iter().flat_map(|p| p.to_vec()).collect();
        assert_eq!(&data[..], &actual[..]);
    }

    #[tokio::test]
    async fn test_file_reader_with_offset_and_length() {
        let mut tmp = NamedTempFile::new().unwrap();
        let data = Bytes::from("a lep is a ball, a tay is a hammer, a flix is a comb");
        tmp.write_all(&data).unwrap();

        let stream = InputStream::read_from(tmp.path())
            .offset(17)
            .length(18)
            .build()
            .unwrap();
        let mut reader = PartReader::new(stream);
        let part = reader.read_exact(18).await.unwrap();
        assert_eq!(b"a tay is a hammer,".as_slice(), &part[..]);
        reader.read_exact(1).await.expect_err("length exhausted");
    }
}
