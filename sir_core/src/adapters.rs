use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{Result, SirError};
use crate::stream::Writer;

/// Flushes the inner writer after every write.
pub struct Immediate<T> {
    inner: Box<dyn Writer<T> + Send>,
}

impl<T> Immediate<T> {
    pub fn new(inner: Box<dyn Writer<T> + Send>) -> Self {
        Self { inner }
    }
}

impl<T> Writer<T> for Immediate<T> {
    fn write(&mut self, v: T) -> Result<()> {
        self.inner.write(v)?;
        self.inner.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Flushes the inner writer once the accumulated weight of unflushed writes
/// reaches `threshold`. `meter` assigns a weight to each written value;
/// defaults to 1 per write (i.e. a record count) when omitted. A write that
/// meters to zero makes no progress and is rejected with `NoProgress`.
pub struct ByCount<T> {
    inner: Box<dyn Writer<T> + Send>,
    meter: Option<Box<dyn Fn(&T) -> u64 + Send + Sync>>,
    threshold: u64,
    acc: u64,
}

impl<T> ByCount<T> {
    pub fn new(inner: Box<dyn Writer<T> + Send>, threshold: u64) -> Self {
        Self {
            inner,
            meter: None,
            threshold,
            acc: 0,
        }
    }

    pub fn with_meter(
        inner: Box<dyn Writer<T> + Send>,
        threshold: u64,
        meter: impl Fn(&T) -> u64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            meter: Some(Box::new(meter)),
            threshold,
            acc: 0,
        }
    }
}

impl<T> Writer<T> for ByCount<T> {
    fn write(&mut self, v: T) -> Result<()> {
        let weight = match &self.meter {
            Some(m) => m(&v),
            None => 1,
        };
        if weight == 0 {
            return Err(SirError::NoProgress);
        }

        self.inner.write(v)?;
        self.acc += weight;
        if self.acc >= self.threshold {
            self.inner.flush()?;
            self.acc = 0;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.acc = 0;
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

enum Signal {
    Reset,
    Close,
}

/// Flushes the inner writer after `period` elapses since the last flush, on
/// a dedicated background thread. A manual `flush` resets the deadline
/// instead of stacking a second pending flush; `close` cancels the thread
/// before closing the inner writer.
pub struct ByTimeout<T> {
    inner: Arc<Mutex<Box<dyn Writer<T> + Send>>>,
    tx: mpsc::Sender<Signal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> ByTimeout<T> {
    pub fn new(inner: Box<dyn Writer<T> + Send>, period: Duration) -> Self {
        assert!(period >= Duration::from_millis(1), "period must be at least 1ms");

        let inner = Arc::new(Mutex::new(inner));
        let (tx, rx) = mpsc::channel::<Signal>();

        let worker_inner = inner.clone();
        let handle = thread::spawn(move || loop {
            match rx.recv_timeout(period) {
                Ok(Signal::Reset) => continue,
                Ok(Signal::Close) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let _ = worker_inner.lock().unwrap().flush();
                }
            }
        });

        Self {
            inner,
            tx,
            handle: Some(handle),
        }
    }
}

impl<T: Send + 'static> Writer<T> for ByTimeout<T> {
    fn write(&mut self, v: T) -> Result<()> {
        self.inner.lock().unwrap().write(v)
    }

    fn flush(&mut self) -> Result<()> {
        let r = self.inner.lock().unwrap().flush();
        let _ = self.tx.send(Signal::Reset);
        r
    }

    fn close(&mut self) -> Result<()> {
        let _ = self.tx.send(Signal::Close);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        self.inner.lock().unwrap().close()
    }
}

impl<T> Drop for ByTimeout<T> {
    fn drop(&mut self) {
        let _ = self.tx.send(Signal::Close);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Observes every value with `f` before delegating, unchanged, to the inner
/// writer.
pub struct Tap<T> {
    inner: Box<dyn Writer<T> + Send>,
    f: Box<dyn Fn(&T) + Send + Sync>,
}

impl<T> Tap<T> {
    pub fn new(inner: Box<dyn Writer<T> + Send>, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self {
            inner,
            f: Box::new(f),
        }
    }
}

impl<T> Writer<T> for Tap<T> {
    fn write(&mut self, v: T) -> Result<()> {
        (self.f)(&v);
        self.inner.write(v)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Maps every value through `f` before delegating to a writer of the mapped
/// type.
pub struct Transform<T, U> {
    inner: Box<dyn Writer<U> + Send>,
    f: Box<dyn Fn(T) -> U + Send + Sync>,
}

impl<T, U> Transform<T, U> {
    pub fn new(inner: Box<dyn Writer<U> + Send>, f: impl Fn(T) -> U + Send + Sync + 'static) -> Self {
        Self {
            inner,
            f: Box::new(f),
        }
    }
}

impl<T, U> Writer<T> for Transform<T, U> {
    fn write(&mut self, v: T) -> Result<()> {
        self.inner.write((self.f)(v))
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
