//! The object snapshot envelope.
//!
//! An object vector serializes to a gzip stream whose `Extra` header field
//! carries an 8 byte magic followed by `"{os}|{arch}|{version}"`. The body
//! is a tagged binary stream of the objects in vector order. Reading back
//! validates the magic, platform, architecture and version before decoding
//! the body, and both directions report the number of compressed bytes
//! transferred.

use crate::error::{
    CorruptedFileError, InvalidArchitectureError, InvalidPlatformError, InvalidVersionError,
    SnapshotError, UnrecognizedFormatError,
};
use crate::Object;
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Compatibility version of the snapshot body.
const BINARY_VERSION: u64 = 1;

const MAGIC: [u8; 8] = [0x64, 0xe0, 0xc8, 0x8e, 0xca, 0xeb, 0x80, 0x65];

/// An object vector that can be written to and read from a snapshot
/// stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objects(pub Vec<Object>);

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

impl Objects {
    /// Write the objects to `w`, returning the number of compressed bytes
    /// written.
    pub fn write_to<W: Write>(&self, w: W) -> Result<u64, SnapshotError> {
        let mut counter = CountingWriter { inner: w, count: 0 };
        let mut extra = Vec::with_capacity(MAGIC.len() + 24);
        extra.extend_from_slice(&MAGIC);
        extra.extend_from_slice(
            format!(
                "{}|{}|{}",
                std::env::consts::OS,
                std::env::consts::ARCH,
                BINARY_VERSION
            )
            .as_bytes(),
        );
        let mut encoder = GzBuilder::new()
            .comment("IR objects")
            .extra(extra)
            .write(&mut counter, Compression::default());
        bincode::serialize_into(&mut encoder, &self.0)?;
        encoder.finish()?;
        tracing::debug!(objects = self.0.len(), bytes = counter.count, "wrote snapshot");
        Ok(counter.count)
    }

    /// Read an object vector from `r`, returning it together with the
    /// number of compressed bytes consumed.
    pub fn read_from<R: Read>(r: R) -> Result<(Self, u64), SnapshotError> {
        let mut counter = CountingReader { inner: r, count: 0 };
        let mut body = Vec::new();
        {
            let mut decoder = GzDecoder::new(&mut counter);
            decoder.read_to_end(&mut body)?;
            let Some(extra) = decoder.header().and_then(|header| header.extra()) else {
                return Err(UnrecognizedFormatError {}.into());
            };
            if extra.len() < MAGIC.len() || extra[..MAGIC.len()] != MAGIC {
                return Err(UnrecognizedFormatError {}.into());
            }
            let parts: Vec<&[u8]> = extra[MAGIC.len()..].split(|&b| b == b'|').collect();
            let [os, arch, version] = parts.as_slice() else {
                return Err(CorruptedFileError {}.into());
            };
            if *os != std::env::consts::OS.as_bytes() {
                return Err(InvalidPlatformError {
                    platform: String::from_utf8_lossy(os).into_owned(),
                }
                .into());
            }
            if *arch != std::env::consts::ARCH.as_bytes() {
                return Err(InvalidArchitectureError {
                    arch: String::from_utf8_lossy(arch).into_owned(),
                }
                .into());
            }
            let version = std::str::from_utf8(version)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or(CorruptedFileError {})?;
            if version != BINARY_VERSION {
                return Err(InvalidVersionError { version }.into());
            }
        }
        let objects: Vec<Object> = bincode::deserialize(&body)?;
        tracing::debug!(objects = objects.len(), bytes = counter.count, "read snapshot");
        Ok((Objects(objects), counter.count))
    }
}
