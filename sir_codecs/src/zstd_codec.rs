use sir_core::codec::{Codec, Compressor};
use sir_core::{Compression, Result, SirError};

/// Zstandard block codec. Each block is compressed independently at the
/// configured level (default 3), so any block can be decompressed without
/// touching adjacent blocks. Best for general text, JSON, logs, mixed
/// structured data.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn compression(&self) -> Compression {
        Compression::Zstandard
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn new_compressor(&self) -> Box<dyn Compressor> {
        Box::new(ZstdCompressor {
            buf: Vec::new(),
            level: self.level,
        })
    }

    fn decompress(&self, compressed: &[u8], size_u: u32) -> Result<Vec<u8>> {
        // zstd frames carry their own content size, so this only matters as
        // a capacity hint.
        let mut out = Vec::with_capacity(size_u as usize);
        zstd::stream::copy_decode(compressed, &mut out).map_err(|e| SirError::Corruption(format!("zstd decode error: {e}")))?;
        Ok(out)
    }
}

struct ZstdCompressor {
    buf: Vec<u8>,
    level: i32,
}

impl Compressor for ZstdCompressor {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        zstd::bulk::compress(&self.buf, self.level).map_err(SirError::Io)
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}
