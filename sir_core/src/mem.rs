use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Result, SirError};
use crate::indexer::Indexer;
use crate::stream::{Reader as ReaderTrait, Stream, Writer as WriterTrait};

struct Block<K, T> {
    index: Option<K>,
    data: Vec<T>,
}

impl<K, T> Default for Block<K, T> {
    fn default() -> Self {
        Self {
            index: None,
            data: Vec::new(),
        }
    }
}

struct State<K, T> {
    blocks: Vec<Block<K, T>>,
    last_key: Option<K>,
    closed: bool,
}

/// Shared state behind a `(MemStream, MemWriter)` pair: a mutex guarding a
/// growing, append-only list of blocks, plus a condition variable that wakes
/// readers blocked on an unflushed tail.
struct Shared<K, T> {
    state: Mutex<State<K, T>>,
    cond: Condvar,
}

/// In-process single-producer / multi-consumer stream. `Reader(key)` may be
/// called any number of times; each reader holds an independent cursor and
/// readers never block writers. Cloning a `MemStream` is cheap (an `Arc`
/// bump) and lets separate threads each call `reader()` independently.
pub struct MemStream<K, T> {
    shared: Arc<Shared<K, T>>,
}

impl<K, T> Clone for MemStream<K, T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

pub struct MemWriter<K, T> {
    shared: Arc<Shared<K, T>>,
    indexer: Indexer<T, K>,
}

/// Construct a memory stream and its single writer, sharing one mutex/condvar.
pub fn mem<K, T>(indexer: impl Fn(&T) -> K + Send + Sync + 'static) -> (MemStream<K, T>, MemWriter<K, T>)
where
    K: Ord + Copy + Send + 'static,
    T: Send + 'static,
{
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            blocks: vec![Block::default()],
            last_key: None,
            closed: false,
        }),
        cond: Condvar::new(),
    });
    (
        MemStream {
            shared: shared.clone(),
        },
        MemWriter {
            shared,
            indexer: Box::new(indexer),
        },
    )
}

impl<K, T> MemWriter<K, T>
where
    K: Ord + Copy,
{
    /// Append a new empty tail iff the current tail is non-empty. Returns
    /// whether a new tail was created (i.e. whether readers should wake).
    fn flush_locked(state: &mut State<K, T>) -> bool {
        if state.blocks.last().unwrap().data.is_empty() {
            return false;
        }
        state.blocks.push(Block::default());
        true
    }
}

impl<K, T> WriterTrait<T> for MemWriter<K, T>
where
    K: Ord + Copy + std::fmt::Debug,
{
    fn write(&mut self, v: T) -> Result<()> {
        let mut state = self.shared.state.lock().unwrap();
        if state.closed {
            return Err(SirError::Closed);
        }

        let k = (self.indexer)(&v);
        if let Some(last) = state.last_key {
            if k < last {
                return Err(SirError::KeyRegression(format!("{k:?} < {last:?}")));
            }
        }
        state.last_key = Some(k);

        let tail = state.blocks.last_mut().unwrap();
        if tail.index.is_none() {
            tail.index = Some(k);
        }
        tail.data.push(v);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock().unwrap();
        if state.closed {
            return Err(SirError::Closed);
        }
        if Self::flush_locked(&mut state) {
            self.shared.cond.notify_all();
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock().unwrap();
        state.closed = true;
        Self::flush_locked(&mut state);
        self.shared.cond.notify_all();
        Ok(())
    }
}

impl<K, T> Stream<K, T> for MemStream<K, T>
where
    K: Ord + Copy + Send + 'static,
    T: Clone + Send + 'static,
{
    fn reader(&self, index: K) -> Box<dyn ReaderTrait<T> + Send> {
        let state = self.shared.state.lock().unwrap();
        let mut cursor = 0usize;
        loop {
            let next_i = cursor + 1;
            if next_i >= state.blocks.len() {
                break;
            }
            let nb = &state.blocks[next_i];
            if nb.data.is_empty() {
                break;
            }
            match nb.index {
                Some(idx) if index >= idx => cursor = next_i,
                _ => break,
            }
        }

        Box::new(MemReader {
            shared: self.shared.clone(),
            cursor,
        })
    }
}

struct MemReader<K, T> {
    shared: Arc<Shared<K, T>>,
    cursor: usize,
}

impl<K, T> ReaderTrait<T> for MemReader<K, T>
where
    T: Clone,
{
    /// Wait until the current block has a successor or the stream closes,
    /// re-checking after every wake to tolerate broadcasts and spurious
    /// wake-ups. A closed stream with an empty current block is EOF.
    fn next(&mut self) -> Result<Option<Vec<T>>> {
        let mut state = self.shared.state.lock().unwrap();
        while self.cursor + 1 >= state.blocks.len() && !state.closed {
            state = self.shared.cond.wait(state).unwrap();
        }

        if state.blocks[self.cursor].data.is_empty() {
            debug_assert!(state.closed, "empty block with no successor but stream not closed");
            return Ok(None);
        }

        let data = state.blocks[self.cursor].data.clone();
        self.cursor += 1;
        Ok(Some(data))
    }
}
