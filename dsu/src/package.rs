//! Zip package extraction.
//!
//! Walks a zip stream entry by entry, in archive order, and hands every
//! `<partition>.img` entry whose partition passes the policy to the
//! [`PartitionWriter`]. Everything else is skipped.
//!
//! Entries whose sizes only follow their data in a data descriptor (general
//! purpose flag bit 3, as written by streaming zip writers) are read here
//! directly: deflated data is decoded until the deflate stream ends and then
//! checked against the descriptor. Stored entries of that kind carry no length
//! at all and are rejected.

use crate::cancel::{CancellableReader, CancellationToken};
use crate::policy;
use crate::writer::{PartitionWriter, WriteOutcome};
use dsu_shared::errors::{DsuError, DsuResult};
use flate2::Crc;
use flate2::bufread::DeflateDecoder;
use std::io::{self, BufRead, ErrorKind, Read};

/// Suffix of installable entries inside a package.
pub const IMAGE_SUFFIX: &str = ".img";

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
const LOCAL_HEADER_LEN: usize = 30;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const METHOD_DEFLATED: u16 = 8;
const ZIP64_EXTRA_ID: u16 = 0x0001;
const PEEK_CAPACITY: usize = 64 * 1024;

/// Partition name for an installable entry, `None` if the entry is ignored.
pub fn partition_for_entry(entry_name: &str) -> Option<&str> {
    let file_name = entry_name.rsplit('/').next().unwrap_or(entry_name);
    let partition = file_name.strip_suffix(IMAGE_SUFFIX)?;
    if !policy::is_valid_name(partition) || !policy::is_supported(partition) {
        return None;
    }
    Some(partition)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Installed,
    Skipped,
    Cancelled,
}

pub struct PackageStreamExtractor<'a> {
    writer: &'a mut PartitionWriter,
    cancel: CancellationToken,
}

impl<'a> PackageStreamExtractor<'a> {
    pub fn new(writer: &'a mut PartitionWriter, cancel: CancellationToken) -> Self {
        Self { writer, cancel }
    }

    /// Install every eligible entry of the zip stream `source`.
    ///
    /// Returns `Ok(())` early when cancellation is observed between or inside
    /// entries; cancellation is not an error here.
    pub fn extract(&mut self, source: &mut dyn Read) -> DsuResult<()> {
        let mut reader = PeekReader::new(CancellableReader::new(source, self.cancel.clone()));
        let mut installed = 0usize;

        loop {
            let streamed = match reader.peek(LOCAL_HEADER_LEN) {
                Ok(header) => has_data_descriptor(header),
                // Surfaced by the zip reader below
                Err(_) => false,
            };

            let outcome = if streamed {
                self.extract_descriptor_entry(&mut reader)?
            } else {
                let entry = match zip::read::read_zipfile_from_stream(&mut reader) {
                    Ok(entry) => entry,
                    Err(_) if self.cancel.is_cancelled() => return Ok(()),
                    Err(e) => {
                        return Err(DsuError::Archive(format!("failed to read entry: {}", e)));
                    }
                };
                // Central directory reached
                let Some(mut entry) = entry else { break };

                let entry_name = entry.name().to_string();
                let size = entry.size();
                let is_dir = entry.is_dir();
                // Dropping the entry drains whatever the writer did not consume
                self.install_entry(&entry_name, is_dir, size, &mut entry)?
            };

            match outcome {
                EntryOutcome::Installed => installed += 1,
                EntryOutcome::Skipped => {}
                EntryOutcome::Cancelled => return Ok(()),
            }

            if self.cancel.is_cancelled() {
                tracing::info!(installed, "Package extraction cancelled");
                return Ok(());
            }
        }

        tracing::info!(installed, "Package extracted");
        Ok(())
    }

    fn install_entry(
        &mut self,
        entry_name: &str,
        is_dir: bool,
        size: u64,
        entry: &mut dyn Read,
    ) -> DsuResult<EntryOutcome> {
        match partition_for_entry(entry_name).filter(|_| !is_dir) {
            Some(partition) => {
                tracing::debug!(entry = %entry_name, partition = %partition, size, "Installing entry");
                match self.writer.write(partition, entry, size)? {
                    WriteOutcome::Installed => Ok(EntryOutcome::Installed),
                    WriteOutcome::Cancelled => Ok(EntryOutcome::Cancelled),
                }
            }
            None => {
                tracing::info!(entry = %entry_name, "Skipping package entry");
                Ok(EntryOutcome::Skipped)
            }
        }
    }

    /// Handle an entry whose sizes follow its data.
    fn extract_descriptor_entry<R: Read>(
        &mut self,
        reader: &mut PeekReader<R>,
    ) -> DsuResult<EntryOutcome> {
        let header = LocalHeader::read(reader)?;
        if header.method != METHOD_DEFLATED {
            return Err(DsuError::Archive(format!(
                "entry {} keeps its length in a trailing data descriptor, \
                 which is only supported for deflated entries (method {})",
                header.name, header.method
            )));
        }

        // Uncompressed size is only known once the descriptor is read
        let mut entry = DescriptorEntry::new(reader, header.zip64);
        let is_dir = header.name.ends_with('/');
        let outcome = self.install_entry(&header.name, is_dir, 0, &mut entry)?;
        if outcome == EntryOutcome::Cancelled {
            return Ok(outcome);
        }

        // Skipped entries still have to be consumed up to their descriptor
        if let Err(e) = io::copy(&mut entry, &mut io::sink()) {
            if self.cancel.is_cancelled() {
                return Ok(EntryOutcome::Cancelled);
            }
            return Err(DsuError::Archive(format!(
                "failed to read entry {}: {}",
                header.name, e
            )));
        }
        Ok(outcome)
    }
}

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// Whether the peeked bytes start a local header with flag bit 3 set.
fn has_data_descriptor(header: &[u8]) -> bool {
    header.len() >= LOCAL_HEADER_LEN
        && le_u32(header) == LOCAL_FILE_HEADER_SIGNATURE
        && le_u16(&header[6..]) & FLAG_DATA_DESCRIPTOR != 0
}

/// Fields of a local file header needed to stream its entry.
#[derive(Debug)]
struct LocalHeader {
    name: String,
    method: u16,
    zip64: bool,
}

impl LocalHeader {
    /// Consume one local header, name and extra field included.
    fn read<R: Read>(reader: &mut PeekReader<R>) -> DsuResult<Self> {
        let fixed = reader.peek(LOCAL_HEADER_LEN).map_err(truncated_header)?;
        if fixed.len() < LOCAL_HEADER_LEN {
            return Err(truncated_header(ErrorKind::UnexpectedEof.into()));
        }
        let method = le_u16(&fixed[8..]);
        let name_len = le_u16(&fixed[26..]) as usize;
        let extra_len = le_u16(&fixed[28..]) as usize;

        let total = LOCAL_HEADER_LEN + name_len + extra_len;
        let full = reader.peek(total).map_err(truncated_header)?;
        if full.len() < total {
            return Err(truncated_header(ErrorKind::UnexpectedEof.into()));
        }
        let name_end = LOCAL_HEADER_LEN + name_len;
        let name = String::from_utf8_lossy(&full[LOCAL_HEADER_LEN..name_end]).into_owned();
        let zip64 = has_zip64_extra(&full[name_end..total]);
        reader.consume(total);

        Ok(Self {
            name,
            method,
            zip64,
        })
    }
}

fn truncated_header(e: io::Error) -> DsuError {
    DsuError::Archive(format!("truncated local header: {}", e))
}

fn has_zip64_extra(mut extra: &[u8]) -> bool {
    while extra.len() >= 4 {
        let id = le_u16(extra);
        let len = le_u16(&extra[2..]) as usize;
        if id == ZIP64_EXTRA_ID {
            return true;
        }
        extra = &extra[(4 + len).min(extra.len())..];
    }
    false
}

/// Deflated entry data followed by its data descriptor.
///
/// Reports end of data only after the descriptor matched the CRC and length of
/// what was decoded; a mismatch is an `InvalidData` read error.
struct DescriptorEntry<'a, R: Read> {
    decoder: DeflateDecoder<&'a mut PeekReader<R>>,
    crc: Crc,
    len: u64,
    zip64: bool,
    done: bool,
}

impl<'a, R: Read> DescriptorEntry<'a, R> {
    fn new(reader: &'a mut PeekReader<R>, zip64: bool) -> Self {
        Self {
            decoder: DeflateDecoder::new(reader),
            crc: Crc::new(),
            len: 0,
            zip64,
            done: false,
        }
    }

    fn check_descriptor(&mut self) -> io::Result<()> {
        let reader = self.decoder.get_mut();
        let mut word = [0u8; 4];
        reader.read_exact(&mut word)?;
        let mut crc = le_u32(&word);
        // The descriptor signature is optional
        if crc == DATA_DESCRIPTOR_SIGNATURE {
            reader.read_exact(&mut word)?;
            crc = le_u32(&word);
        }

        let mut sizes = [0u8; 16];
        let uncompressed = if self.zip64 {
            reader.read_exact(&mut sizes)?;
            le_u64(&sizes[8..])
        } else {
            reader.read_exact(&mut sizes[..8])?;
            u64::from(le_u32(&sizes[4..]))
        };

        if crc != self.crc.sum() || uncompressed != self.len {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "data descriptor mismatch: crc {:08x}/{:08x}, length {}/{}",
                    crc,
                    self.crc.sum(),
                    uncompressed,
                    self.len
                ),
            ));
        }
        Ok(())
    }
}

impl<R: Read> Read for DescriptorEntry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        let n = self.decoder.read(buf)?;
        if n == 0 {
            self.check_descriptor()?;
            self.done = true;
            return Ok(0);
        }
        self.crc.update(&buf[..n]);
        self.len += n as u64;
        Ok(n)
    }
}

/// Buffered reader that can look ahead without consuming.
struct PeekReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R: Read> PeekReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(PEEK_CAPACITY),
            pos: 0,
        }
    }

    /// Up to `n` upcoming bytes; fewer only at end of stream.
    fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        while self.buf.len() < n {
            let start = self.buf.len();
            self.buf.resize(n, 0);
            match self.inner.read(&mut self.buf[start..]) {
                Ok(read) => {
                    self.buf.truncate(start + read);
                    if read == 0 {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => self.buf.truncate(start),
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(e);
                }
            }
        }
        Ok(&self.buf[..n.min(self.buf.len())])
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buf.len() {
            let available = &self.buf[self.pos..];
            let n = available.len().min(out.len());
            out[..n].copy_from_slice(&available[..n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.read(out)
    }
}

impl<R: Read> BufRead for PeekReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
            self.buf.resize(PEEK_CAPACITY, 0);
            loop {
                match self.inner.read(&mut self.buf) {
                    Ok(read) => {
                        self.buf.truncate(read);
                        break;
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.buf.clear();
                        return Err(e);
                    }
                }
            }
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
    }
}
