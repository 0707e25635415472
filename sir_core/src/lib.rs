pub mod adapters;
pub mod codec;
pub mod error;
pub mod format;
pub mod index;
pub mod indexer;
pub mod mem;
pub mod reader;
pub mod sink;
pub mod stream;

pub use codec::{Codec, Compressor, PlainCodec, PlainCompressor};
pub use error::{Result, SirError};
pub use format::{
    Compression, Header, FOOTER_BYTE_SIZE, HEADER_BYTE_SIZE, INDEX_GROUP_BYTE_SIZE, INDEX_GROUP_SIZE, MAGIC, MARKER,
};
pub use index::IndexTable;
pub use indexer::Indexer;
pub use mem::{mem, MemStream, MemWriter};
pub use reader::{FileStream, ReadSeek};
pub use sink::Sink;
pub use stream::{Reader, Stream, Writer};
