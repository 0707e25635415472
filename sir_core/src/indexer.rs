/// Caller-supplied function producing an ordered key from a payload.
pub type Indexer<T, K> = Box<dyn Fn(&T) -> K + Send + Sync>;
