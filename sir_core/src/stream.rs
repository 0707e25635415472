use crate::error::Result;

/// A stream exposes positional readers keyed by `K`.
pub trait Stream<K, T> {
    /// Open a fresh reader positioned at the block covering `index`. The
    /// returned reader is `Send` — both the file and memory stream
    /// implementations support readers iterating concurrently, each on its
    /// own thread, while sharing no mutable state with one another.
    fn reader(&self, index: K) -> Box<dyn Reader<T> + Send>;
}

/// Write-side capability shared by the sink, the memory stream, and every
/// adapter that decorates a writer.
pub trait Writer<T> {
    fn write(&mut self, v: T) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// A per-reader cursor. `next` returns the next flushed block's records, or
/// `None` at end-of-stream — a distinguished outcome, not an error.
pub trait Reader<T> {
    fn next(&mut self) -> Result<Option<Vec<T>>>;
}
