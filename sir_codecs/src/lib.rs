mod deflate_codec;
mod lz4_codec;
mod zstd_codec;

pub use deflate_codec::DeflateCodec;
pub use lz4_codec::Lz4Codec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use sir_core::{Codec, Compression, PlainCodec, Result, SirError};

/// Resolve a bundled codec from the `Compression` code stored in a file's
/// header. Called by `sir_cli` when opening an existing container, so the
/// reader is initialized with a codec matching what the writer used.
pub fn codec_for(compression: Compression) -> Result<Arc<dyn Codec>> {
    match compression {
        Compression::Plain => Ok(Arc::new(PlainCodec)),
        Compression::Deflate => Ok(Arc::new(DeflateCodec::default())),
        Compression::Lz4 => Ok(Arc::new(Lz4Codec)),
        Compression::Zstandard => Ok(Arc::new(ZstdCodec::default())),
        other => Err(SirError::Framing(format!(
            "no bundled codec for compression code {other:?}; this crate ships plain, deflate, lz4, and zstd"
        ))),
    }
}
