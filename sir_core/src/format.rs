use std::io::Read;

use crate::error::{Result, SirError};

/// First 4 bytes of the header and last 4 bytes of the footer, big-endian.
pub const MAGIC: u32 = 0x5349_5200;

/// 16-byte sync fence written after every block, compressed or sealing.
pub const MARKER: [u8; 16] = [
    0x48, 0x44, 0x41, 0x59, 0x52, 0x4F, 0x42, 0x4F, 0x40, 0x11, 0xDA, 0x70, 0x80, 0xB0, 0x71, 0xC2,
];

/// Fixed-size header prefix, before any metadata bytes.
pub const HEADER_BYTE_SIZE: u64 = 0x20;

/// Max slots per index group.
pub const INDEX_GROUP_SIZE: usize = 63;

/// On-disk size of a full index group: `16 + (63-1)*8`.
pub const INDEX_GROUP_BYTE_SIZE: u64 = 16 + (INDEX_GROUP_SIZE as u64 - 1) * 8;

/// `u64 index_table_offset ∥ u32 Magic`.
pub const FOOTER_BYTE_SIZE: u64 = 12;

/// Compression code stored in the header's 6th byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Plain = 0,
    Deflate = 1,
    Brotli = 2,
    Lz4 = 3,
    Snappy = 4,
    Zstandard = 5,
}

impl Compression {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => Compression::Plain,
            1 => Compression::Deflate,
            2 => Compression::Brotli,
            3 => Compression::Lz4,
            4 => Compression::Snappy,
            5 => Compression::Zstandard,
            other => return Err(SirError::Framing(format!("unknown compression code {other}"))),
        })
    }
}

/// Fixed 32-byte prefix plus optional metadata bytes.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub compression: Compression,
    /// Total file length, or 0 if unknown/streaming.
    pub content_length: u64,
    /// 0 means the reader must reconstruct the index table via footer scan.
    pub index_table_offset: u64,
    pub first_block_offset: u64,
    pub metadata: Vec<u8>,
}

impl Header {
    /// Serialize the header, validating offsets per §4.2.
    ///
    /// `FirstBlockOffset`, if zero, defaults to `HEADER_BYTE_SIZE + metadata.len()`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let metadata_len = self.metadata.len() as u64;

        let first_block_offset = if self.first_block_offset == 0 {
            HEADER_BYTE_SIZE + metadata_len
        } else {
            if self.first_block_offset < HEADER_BYTE_SIZE
                || self.first_block_offset - HEADER_BYTE_SIZE != metadata_len
            {
                return Err(SirError::Framing("invalid first block offset".into()));
            }
            self.first_block_offset
        };

        if self.content_length != 0 && self.content_length < HEADER_BYTE_SIZE + metadata_len {
            return Err(SirError::Framing("invalid content length".into()));
        }
        if self.index_table_offset != 0 && self.index_table_offset < first_block_offset {
            return Err(SirError::Framing("invalid index table offset".into()));
        }

        let mut b = Vec::with_capacity(HEADER_BYTE_SIZE as usize + self.metadata.len());
        b.extend_from_slice(&MAGIC.to_be_bytes());
        b.push(0x01); // version
        b.push(self.compression.code());
        b.extend_from_slice(&[0u8; 2]); // reserved
        b.extend_from_slice(&self.content_length.to_le_bytes());
        b.extend_from_slice(&self.index_table_offset.to_le_bytes());
        b.extend_from_slice(&first_block_offset.to_le_bytes());
        b.extend_from_slice(&self.metadata);
        Ok(b)
    }

    /// Parse the fixed 32-byte prefix, returning the header and the number of
    /// trailing metadata bytes the caller must additionally read.
    fn parse_prefix(buf: &[u8; HEADER_BYTE_SIZE as usize]) -> Result<(Self, usize)> {
        if u32::from_be_bytes(buf[0..4].try_into().unwrap()) != MAGIC {
            return Err(SirError::Framing("magic not found".into()));
        }
        let version = buf[4];
        if version != 0x01 {
            return Err(SirError::Framing(format!("unsupported version: {version}")));
        }
        let compression = Compression::from_code(buf[5])?;
        let content_length = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let index_table_offset = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        let first_block_offset = u64::from_le_bytes(buf[24..32].try_into().unwrap());

        if first_block_offset < HEADER_BYTE_SIZE {
            return Err(SirError::Corruption("first block offset precedes header".into()));
        }
        let metadata_len = (first_block_offset - HEADER_BYTE_SIZE) as usize;

        Ok((
            Header {
                compression,
                content_length,
                index_table_offset,
                first_block_offset,
                metadata: Vec::new(),
            },
            metadata_len,
        ))
    }
}

/// Read and validate a header, including any trailing metadata bytes.
pub fn read_header<R: Read>(r: &mut R) -> Result<Header> {
    let mut buf = [0u8; HEADER_BYTE_SIZE as usize];
    r.read_exact(&mut buf)?;
    let (mut header, metadata_len) = Header::parse_prefix(&buf)?;
    if metadata_len > 0 {
        let mut metadata = vec![0u8; metadata_len];
        r.read_exact(&mut metadata)?;
        header.metadata = metadata;
    }
    Ok(header)
}
