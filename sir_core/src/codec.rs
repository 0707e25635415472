use crate::error::Result;
use crate::format::Compression;

/// A compression session scoped to a single block.
///
/// Unlike the original mutable-sink design (`Write`/`Flush`/`Reset(sink)`),
/// this trait owns its output buffer internally: `flush` drains and returns
/// the compressed bytes produced so far, and `reset` clears all state so the
/// same `Compressor` instance can be reused for the next block without
/// reallocating. The sink calls `reset` immediately after every `flush`.
pub trait Compressor: Send {
    /// Feed raw bytes into the compression stream.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Finish the current block and return the compressed bytes produced.
    fn flush(&mut self) -> Result<Vec<u8>>;

    /// Clear all state so the compressor can start a brand new, independent
    /// block.
    fn reset(&mut self);
}

/// Pluggable compression backend, identified by the `Compression` code
/// stored in the file header.
pub trait Codec: Send + Sync {
    fn compression(&self) -> Compression;

    fn name(&self) -> &'static str;

    /// Create a fresh per-block compression session.
    fn new_compressor(&self) -> Box<dyn Compressor>;

    /// Decompress a block's compressed payload. `size_u` is the uncompressed
    /// size recorded in the block's framing header, usable as a size hint.
    fn decompress(&self, compressed: &[u8], size_u: u32) -> Result<Vec<u8>>;
}

/// No-op codec: blocks are stored verbatim.
pub struct PlainCompressor {
    buf: Vec<u8>,
}

impl Compressor for PlainCompressor {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.buf))
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}

pub struct PlainCodec;

impl Codec for PlainCodec {
    fn compression(&self) -> Compression {
        Compression::Plain
    }

    fn name(&self) -> &'static str {
        "plain"
    }

    fn new_compressor(&self) -> Box<dyn Compressor> {
        Box::new(PlainCompressor { buf: Vec::new() })
    }

    fn decompress(&self, compressed: &[u8], _size_u: u32) -> Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
