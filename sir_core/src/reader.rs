use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::codec::{Codec, PlainCodec};
use crate::error::{Result, SirError};
use crate::format::{read_header, Header, FOOTER_BYTE_SIZE, MAGIC, MARKER};
use crate::index::{decode_index_table, IndexTable};
use crate::stream::{self, Reader as ReaderTrait};

/// A seekable, closable byte source. `std::fs::File` and `std::io::Cursor`
/// both satisfy this out of the box.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

type OpenFn = Arc<dyn Fn() -> Result<Box<dyn ReadSeek + Send>> + Send + Sync>;

/// A decoded SIR file. Built once at open time; thereafter read-only.
///
/// `Reader(key)` opens a fresh byte source per call — readers share no
/// mutable state and may iterate concurrently.
pub struct FileStream {
    header: Header,
    table: IndexTable,
    open: OpenFn,
    codec: Arc<dyn Codec>,
}

impl FileStream {
    /// Open a file backed only by the built-in `Plain` codec.
    pub fn open_file(
        open: impl Fn() -> Result<Box<dyn ReadSeek + Send>> + Send + Sync + 'static,
    ) -> Result<Self> {
        Self::open_file_with_codec(open, Arc::new(PlainCodec))
    }

    /// Open a file, validating that `codec` matches the header's compression
    /// code.
    pub fn open_file_with_codec(
        open: impl Fn() -> Result<Box<dyn ReadSeek + Send>> + Send + Sync + 'static,
        codec: Arc<dyn Codec>,
    ) -> Result<Self> {
        let open: OpenFn = Arc::new(open);
        let mut f = (open)()?;

        let mut header = read_header(&mut f)?;
        if header.compression != codec.compression() {
            return Err(SirError::Framing(format!(
                "codec mismatch: file uses {:?} but {} was provided",
                header.compression,
                codec.name()
            )));
        }

        let mut table = IndexTable::new(header.first_block_offset);
        if header.index_table_offset != 0 {
            f.seek(SeekFrom::Start(header.index_table_offset))?;
            if header.content_length > 0 {
                let limit = header
                    .content_length
                    .saturating_sub(header.index_table_offset)
                    .saturating_sub(FOOTER_BYTE_SIZE);
                let mut limited = (&mut f).take(limit);
                decode_index_table(&mut limited, &mut table)?;
            } else {
                decode_index_table(&mut f, &mut table)?;
            }
        } else {
            header.index_table_offset = scan_index_table(&mut f, &mut table)?;
        }

        Ok(Self {
            header,
            table,
            open,
            codec,
        })
    }

    /// The parsed file header: compression code, content length, index-table
    /// offset, first-block offset, and any metadata bytes.
    pub fn header(&self) -> &Header {
        &self.header
    }
}

impl stream::Stream<u64, Vec<u8>> for FileStream {
    fn reader(&self, index: u64) -> Box<dyn ReaderTrait<Vec<u8>> + Send> {
        let mut f = match (self.open)() {
            Ok(f) => f,
            Err(e) => return Box::new(ErrReader(Some(e))),
        };

        let p = self.table.find(index).unwrap_or(self.header.first_block_offset);
        if let Err(e) = f.seek(SeekFrom::Start(p)).map_err(SirError::from) {
            return Box::new(ErrReader(Some(e)));
        }

        let remaining = self.header.index_table_offset.saturating_sub(p);
        Box::new(FileReader {
            inner: f,
            remaining,
            codec: self.codec.clone(),
        })
    }
}

/// Seek to `end - (Marker + Footer)`, validate the footer's magic and the
/// sealing marker immediately preceding the index table, then decode the
/// table forward exactly as the known-offset path does.
///
/// `original_source`'s scan routine was never retrieved in full (only its
/// call site survives); this is the simplest recovery that still satisfies
/// every invariant the format states: the footer is fixed-size and always
/// present, and the sealing marker always immediately precedes
/// `IndexTableOffset` because the sealing block's own trailing marker ends
/// exactly there.
fn scan_index_table<F: Read + Seek>(f: &mut F, table: &mut IndexTable) -> Result<u64> {
    let end = f.seek(SeekFrom::End(0))?;
    if end < FOOTER_BYTE_SIZE {
        return Err(SirError::Corruption("file shorter than footer".into()));
    }

    f.seek(SeekFrom::Start(end - FOOTER_BYTE_SIZE))?;
    let mut footer = [0u8; FOOTER_BYTE_SIZE as usize];
    f.read_exact(&mut footer)?;
    let index_table_offset = u64::from_le_bytes(footer[0..8].try_into().unwrap());
    let magic = u32::from_be_bytes(footer[8..12].try_into().unwrap());
    if magic != MAGIC {
        return Err(SirError::Corruption("invalid footer magic".into()));
    }
    if index_table_offset < MARKER.len() as u64 {
        return Err(SirError::Corruption("invalid index table offset".into()));
    }

    f.seek(SeekFrom::Start(index_table_offset - MARKER.len() as u64))?;
    let mut marker = [0u8; 16];
    f.read_exact(&mut marker)?;
    if marker != MARKER {
        return Err(SirError::Corruption("missing sealing marker".into()));
    }

    f.seek(SeekFrom::Start(index_table_offset))?;
    let limit = (end - FOOTER_BYTE_SIZE).saturating_sub(index_table_offset);
    let mut limited = (&mut *f).take(limit);
    decode_index_table(&mut limited, table)?;

    Ok(index_table_offset)
}

/// Per-reader cursor over a single block source.
struct FileReader {
    inner: Box<dyn ReadSeek + Send>,
    /// Bytes remaining before the index table begins.
    remaining: u64,
    codec: Arc<dyn Codec>,
}

impl ReaderTrait<Vec<u8>> for FileReader {
    fn next(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        if self.remaining < 8 {
            return Ok(None);
        }

        let mut head = [0u8; 8];
        self.inner.read_exact(&mut head)?;
        let size_c = u32::from_le_bytes(head[0..4].try_into().unwrap()) as usize;
        let size_u = u32::from_le_bytes(head[4..8].try_into().unwrap());

        let mut payload = vec![0u8; size_c];
        self.inner.read_exact(&mut payload)?;
        let mut marker = [0u8; 16];
        self.inner.read_exact(&mut marker)?;
        self.remaining = self.remaining.saturating_sub(8 + size_c as u64 + 16);

        if marker != MARKER {
            return Err(SirError::Corruption("sync marker not found".into()));
        }
        if size_u == 0 {
            return Ok(None);
        }

        let raw = self.codec.decompress(&payload, size_u)?;
        if raw.len() != size_u as usize {
            return Err(SirError::Corruption(format!(
                "decompressed {} bytes but framing header said {}",
                raw.len(),
                size_u
            )));
        }

        let mut vs = Vec::new();
        let mut pos = 0usize;
        while pos < raw.len() {
            if pos + 4 > raw.len() {
                return Err(SirError::Corruption("truncated record length prefix".into()));
            }
            let len = u32::from_le_bytes(raw[pos..pos + 4].try_into().unwrap()) as usize;
            let start = pos + 4;
            let next = start + len;
            if next > raw.len() {
                return Err(SirError::Corruption("truncated record payload".into()));
            }
            vs.push(raw[start..next].to_vec());
            pos = next;
        }

        Ok(Some(vs))
    }
}

/// A reader that immediately yields a previously captured open/seek error.
struct ErrReader(Option<SirError>);

impl ReaderTrait<Vec<u8>> for ErrReader {
    fn next(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        match self.0.take() {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}
