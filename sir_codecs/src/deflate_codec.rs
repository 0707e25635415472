use std::io::Write as _;

use flate2::write::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as Flate2Level;

use sir_core::codec::{Codec, Compressor};
use sir_core::{Compression, Result, SirError};

/// Deflate block codec backed by `flate2`. No external frame size hints are
/// available, so decoding streams into a growable buffer.
pub struct DeflateCodec {
    pub level: Flate2Level,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self {
            level: Flate2Level::default(),
        }
    }
}

impl Codec for DeflateCodec {
    fn compression(&self) -> Compression {
        Compression::Deflate
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn new_compressor(&self) -> Box<dyn Compressor> {
        Box::new(DeflateCompressor {
            buf: Vec::new(),
            level: self.level,
        })
    }

    fn decompress(&self, compressed: &[u8], size_u: u32) -> Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(Vec::with_capacity(size_u as usize));
        decoder.write_all(compressed)?;
        decoder
            .finish()
            .map_err(|e| SirError::Corruption(format!("deflate decode error: {e}")))
    }
}

struct DeflateCompressor {
    buf: Vec<u8>,
    level: Flate2Level,
}

impl Compressor for DeflateCompressor {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
        encoder.write_all(&self.buf)?;
        Ok(encoder.finish()?)
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}
