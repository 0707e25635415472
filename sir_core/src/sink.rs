use std::io::Write;

use crate::codec::{Codec, Compressor, PlainCodec};
use crate::error::{Result, SirError};
use crate::format::{Header, INDEX_GROUP_BYTE_SIZE, MARKER};
use crate::index::{encode_index_table, IndexTable};
use crate::indexer::Indexer;
use crate::stream;

/// Streaming encoder. Owns a user-provided byte writer, an index table, and
/// a compression session.
///
/// Unlike a file-backed writer that seeks back to patch its header, `Sink`
/// only requires `Write`: the header is written once, up front, with
/// `IndexTableOffset = 0`. A reader always recovers the index table by
/// scanning backward from the footer — this sink never needs `Seek`.
pub struct Sink<W: Write> {
    w: W,
    indexer: Indexer<[u8], u64>,
    codec: Box<dyn Codec>,
    compressor: Box<dyn Compressor>,

    /// Uncompressed bytes accumulated in the in-flight block so far,
    /// counting each record's `4 + len` length-prefix framing.
    n: u64,
    table: IndexTable,
    /// Running file length, mirroring the underlying writer's position.
    pos: u64,
    last_key: Option<u64>,
    closed: bool,
}

impl<W: Write> Sink<W> {
    /// Create a sink with the default `Plain` codec.
    pub fn create(w: W, indexer: impl Fn(&[u8]) -> u64 + Send + Sync + 'static) -> Result<Self> {
        Self::create_with_codec(w, indexer, Box::new(PlainCodec))
    }

    /// Create a sink using the given compression codec.
    pub fn create_with_codec(
        mut w: W,
        indexer: impl Fn(&[u8]) -> u64 + Send + Sync + 'static,
        codec: Box<dyn Codec>,
    ) -> Result<Self> {
        let header = Header {
            compression: codec.compression(),
            content_length: 0,
            index_table_offset: 0,
            first_block_offset: 0,
            metadata: Vec::new(),
        };
        let bytes = header.to_bytes()?;
        w.write_all(&bytes)?;
        let pos = bytes.len() as u64;

        Ok(Self {
            compressor: codec.new_compressor(),
            w,
            indexer: Box::new(indexer),
            codec,
            n: 0,
            table: IndexTable::new(pos),
            pos,
            last_key: None,
            closed: false,
        })
    }

    /// Append a record to the in-flight block. Rejected if `p`'s key would
    /// regress the stream's monotonically non-decreasing key order.
    pub fn write(&mut self, p: &[u8]) -> Result<()> {
        if self.closed {
            return Err(SirError::Closed);
        }

        let key = (self.indexer)(p);
        if let Some(last) = self.last_key {
            if key < last {
                return Err(SirError::KeyRegression(format!("{key} < {last}")));
            }
        }

        let added = 4u64 + p.len() as u64;
        let new_n = self.n.checked_add(added).ok_or(SirError::Overflow)?;
        if new_n > u32::MAX as u64 {
            return Err(SirError::Overflow);
        }

        self.compressor.write(&(p.len() as u32).to_le_bytes())?;
        self.compressor.write(p)?;

        self.table.tick(key, p.len() as u64);
        self.n = new_n;
        self.last_key = Some(key);
        Ok(())
    }

    /// Flush the in-flight block, framed and fenced by the sync marker.
    /// No-op when no records are pending.
    pub fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(SirError::Closed);
        }
        if self.n == 0 {
            return Ok(());
        }
        self.flush_block()
    }

    fn flush_block(&mut self) -> Result<()> {
        let compressed = self.compressor.flush()?;
        if compressed.len() > u32::MAX as usize {
            return Err(SirError::Overflow);
        }

        let mut head = [0u8; 8];
        head[0..4].copy_from_slice(&(compressed.len() as u32).to_le_bytes());
        head[4..8].copy_from_slice(&(self.n as u32).to_le_bytes());
        self.w.write_all(&head)?;
        self.w.write_all(&compressed)?;
        self.w.write_all(&MARKER)?;

        self.pos += 8 + compressed.len() as u64 + MARKER.len() as u64;
        self.compressor.reset();
        self.table.tock();
        self.table.seek(self.pos);
        self.n = 0;
        Ok(())
    }

    /// Flush any pending block, emit the sealing block, the index table, and
    /// the footer. Idempotent only in the sense that a second call returns
    /// `Closed`; the underlying writer is never closed by the sink.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(SirError::Closed);
        }
        if self.n > 0 {
            self.flush_block()?;
        }

        // Sealing block: size_c = 0, size_u = 0, no payload.
        self.w.write_all(&0u32.to_le_bytes())?;
        self.w.write_all(&0u32.to_le_bytes())?;
        self.w.write_all(&MARKER)?;
        self.pos += 8 + MARKER.len() as u64;

        if self.table.groups().is_empty() {
            // No block was ever flushed: write one zeroed index group so a
            // reader can still locate a valid (empty) index group on disk.
            self.w.write_all(&[0u8; INDEX_GROUP_BYTE_SIZE as usize])?;
        } else {
            encode_index_table(&mut self.w, &self.table)?;
        }
        self.w.write_all(&self.pos.to_le_bytes())?;
        self.w.write_all(&crate::format::MAGIC.to_be_bytes())?;
        self.w.flush()?;

        self.closed = true;
        Ok(())
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }
}

impl<W: Write> stream::Writer<Vec<u8>> for Sink<W> {
    fn write(&mut self, v: Vec<u8>) -> Result<()> {
        Sink::write(self, &v)
    }

    fn flush(&mut self) -> Result<()> {
        Sink::flush(self)
    }

    fn close(&mut self) -> Result<()> {
        Sink::close(self)
    }
}
