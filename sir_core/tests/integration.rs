//! End-to-end tests covering the concrete scenarios a SIR container must
//! satisfy: binary round-trip, index monotonicity, seek correctness, empty
//! flushes, sealing blocks, and the memory stream's blocking semantics.

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use sir_core::adapters::ByCount;
use sir_core::{mem, FileStream, ReadSeek, Reader as ReaderTrait, SirError, Sink, Stream as StreamTrait, Writer as WriterTrait};

/// Records in these tests are exactly 8 bytes: a little-endian `u64` key.
fn key_record(key: u64) -> Vec<u8> {
    key.to_le_bytes().to_vec()
}

fn key_of(record: &[u8]) -> u64 {
    u64::from_le_bytes(record.try_into().unwrap())
}

/// A record packing several `u64` keys back to back, used where one written
/// value stands for a whole group (spec §8 scenario 5's `[1,2,3]`-style
/// writes). The group's own key is its first element.
fn group_record(keys: &[u64]) -> Vec<u8> {
    keys.iter().flat_map(|k| k.to_le_bytes()).collect()
}

fn keys_of_group(record: &[u8]) -> Vec<u64> {
    record
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

fn open_cursor(data: Vec<u8>) -> FileStream {
    let data = Arc::new(data);
    FileStream::open_file(move || {
        let data = data.clone();
        Ok(Box::new(Cursor::new((*data).clone())) as Box<dyn ReadSeek + Send>)
    })
    .unwrap()
}

/// An owned, `Clone`-able `Write` sink over a shared buffer. Adapters like
/// `ByCount` require a `Box<dyn Writer<T> + Send>`, whose implicit object
/// lifetime is `'static` — a `Sink` built over `&mut Vec<u8>` can't satisfy
/// that, so tests that wrap a `Sink` in an adapter write through this instead
/// and read the bytes back out of the shared buffer afterwards.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn two_records_one_flush_round_trip() {
    let mut buf = Vec::new();
    {
        let mut sink = Sink::create(&mut buf, |p: &[u8]| key_of(p)).unwrap();
        sink.write(&key_record(1)).unwrap();
        sink.write(&key_record(2)).unwrap();
        sink.flush().unwrap();
        sink.close().unwrap();
    }

    let stream = open_cursor(buf);
    let mut reader = stream.reader(0);
    let first = reader.next().unwrap().unwrap();
    assert_eq!(first.iter().map(|r| key_of(r)).collect::<Vec<_>>(), vec![1, 2]);
    assert!(reader.next().unwrap().is_none(), "second Next() must be EOF");
}

#[test]
fn two_flushes_seek_from_middle_key() {
    let mut buf = Vec::new();
    {
        let mut sink = Sink::create(&mut buf, |p: &[u8]| key_of(p)).unwrap();
        sink.write(&key_record(1)).unwrap();
        sink.write(&key_record(2)).unwrap();
        sink.flush().unwrap();
        sink.write(&key_record(3)).unwrap();
        sink.write(&key_record(4)).unwrap();
        sink.flush().unwrap();
        sink.close().unwrap();
    }

    let stream = open_cursor(buf);

    let mut from_zero = stream.reader(0);
    let b0 = from_zero.next().unwrap().unwrap();
    assert_eq!(b0.iter().map(|r| key_of(r)).collect::<Vec<_>>(), vec![1, 2]);
    let b1 = from_zero.next().unwrap().unwrap();
    assert_eq!(b1.iter().map(|r| key_of(r)).collect::<Vec<_>>(), vec![3, 4]);
    assert!(from_zero.next().unwrap().is_none());

    let mut from_three = stream.reader(3);
    let only = from_three.next().unwrap().unwrap();
    assert_eq!(only.iter().map(|r| key_of(r)).collect::<Vec<_>>(), vec![3, 4]);
    assert!(from_three.next().unwrap().is_none());
}

/// 63 single-block flushes of two records each: keys `1000*2i, 1000*2i+1000`.
/// Exactly one index group fits (`IndexGroupSize = 63`); lookup for a key
/// mid-way through block 30 must resolve to block 30's own offset, not its
/// neighbors.
#[test]
fn sixty_three_flushes_single_group_lookup() {
    let mut buf = Vec::new();
    {
        let mut sink = Sink::create(&mut buf, |p: &[u8]| key_of(p)).unwrap();
        for i in 0..63u64 {
            sink.write(&key_record(1000 * (2 * i))).unwrap();
            sink.write(&key_record(1000 * (2 * i + 1))).unwrap();
            sink.flush().unwrap();
        }
        sink.close().unwrap();
    }

    let stream = open_cursor(buf);
    let mut reader = stream.reader(60_500);
    let block = reader.next().unwrap().unwrap();
    assert_eq!(block.iter().map(|r| key_of(r)).collect::<Vec<_>>(), vec![60_000, 61_000]);
}

/// 73 = `IndexGroupSize + 10` flushes forces a second index group; decoding
/// must still locate every block correctly across the group boundary.
#[test]
fn seventy_three_flushes_spans_two_groups() {
    let mut buf = Vec::new();
    {
        let mut sink = Sink::create(&mut buf, |p: &[u8]| key_of(p)).unwrap();
        for i in 0..73u64 {
            sink.write(&key_record(1000 * (2 * i))).unwrap();
            sink.write(&key_record(1000 * (2 * i + 1))).unwrap();
            sink.flush().unwrap();
        }
        sink.close().unwrap();
    }

    let stream = open_cursor(buf);

    // Block 0 (first group) and block 70 (second group) must both resolve.
    let mut r0 = stream.reader(0);
    let b0 = r0.next().unwrap().unwrap();
    assert_eq!(b0.iter().map(|r| key_of(r)).collect::<Vec<_>>(), vec![0, 1000]);

    let mut r70 = stream.reader(140_500);
    let b70 = r70.next().unwrap().unwrap();
    assert_eq!(b70.iter().map(|r| key_of(r)).collect::<Vec<_>>(), vec![140_000, 141_000]);
}

#[test]
fn empty_flush_is_a_no_op() {
    let mut buf = Vec::new();
    {
        let mut sink = Sink::create(&mut buf, |p: &[u8]| key_of(p)).unwrap();
        sink.flush().unwrap(); // no writes yet — must not emit a block
        sink.write(&key_record(5)).unwrap();
        sink.flush().unwrap();
        sink.flush().unwrap(); // already-empty tail — must not emit a block
        sink.close().unwrap();
    }

    let stream = open_cursor(buf);
    let mut reader = stream.reader(0);
    let only = reader.next().unwrap().unwrap();
    assert_eq!(only.iter().map(|r| key_of(r)).collect::<Vec<_>>(), vec![5]);
    assert!(reader.next().unwrap().is_none());
}

#[test]
fn empty_file_still_has_a_valid_sealing_block() {
    let mut buf = Vec::new();
    {
        let mut sink = Sink::create(&mut buf, |p: &[u8]| key_of(p)).unwrap();
        sink.close().unwrap();
    }

    // header (32) + sealing block (8 + 16) + one zeroed index group (512) + footer (12).
    assert_eq!(buf.len() as u64, 32 + 24 + sir_core::INDEX_GROUP_BYTE_SIZE + 12);

    let stream = open_cursor(buf);
    let mut reader = stream.reader(0);
    assert!(reader.next().unwrap().is_none(), "empty file must read back as immediate EOF");
}

#[test]
fn key_regression_is_rejected() {
    let mut buf = Vec::new();
    let mut sink = Sink::create(&mut buf, |p: &[u8]| key_of(p)).unwrap();
    sink.write(&key_record(10)).unwrap();
    let err = sink.write(&key_record(9)).unwrap_err();
    assert!(matches!(err, SirError::KeyRegression(_)));
}

#[test]
fn write_after_close_is_rejected() {
    let mut buf = Vec::new();
    let mut sink = Sink::create(&mut buf, |p: &[u8]| key_of(p)).unwrap();
    sink.write(&key_record(1)).unwrap();
    sink.close().unwrap();
    assert!(matches!(sink.write(&key_record(2)), Err(SirError::Closed)));
    assert!(matches!(sink.flush(), Err(SirError::Closed)));
    assert!(matches!(sink.close(), Err(SirError::Closed)));
}

/// Spec §8 scenario 5: `ByCount(w, 3, len)` writing the groups `[1,2,3]`,
/// `[4,5,6,7]`, `[8,9]`, `[10,11]` — each group is one written value, metered
/// by its own element count — flushes into exactly three blocks:
/// `[[1,2,3]]`, `[[4,5,6,7]]`, `[[8,9],[10,11]]`.
#[test]
fn by_count_adapter_groups_writes_into_blocks() {
    let shared = SharedBuf::default();
    {
        let sink = Sink::create(shared.clone(), |p: &[u8]| keys_of_group(p)[0]).unwrap();
        let mut w = ByCount::with_meter(Box::new(sink), 3, |v: &Vec<u8>| (v.len() / 8) as u64);

        w.write(group_record(&[1, 2, 3])).unwrap();
        w.write(group_record(&[4, 5, 6, 7])).unwrap();
        w.write(group_record(&[8, 9])).unwrap();
        w.write(group_record(&[10, 11])).unwrap();
        w.close().unwrap();
    }

    let buf = shared.0.lock().unwrap().clone();
    let stream = open_cursor(buf);
    let mut reader = stream.reader(0);
    let b0 = reader.next().unwrap().unwrap();
    assert_eq!(b0.iter().map(|r| keys_of_group(r)).collect::<Vec<_>>(), vec![vec![1, 2, 3]]);
    let b1 = reader.next().unwrap().unwrap();
    assert_eq!(b1.iter().map(|r| keys_of_group(r)).collect::<Vec<_>>(), vec![vec![4, 5, 6, 7]]);
    let b2 = reader.next().unwrap().unwrap();
    assert_eq!(
        b2.iter().map(|r| keys_of_group(r)).collect::<Vec<_>>(),
        vec![vec![8, 9], vec![10, 11]]
    );
    assert!(reader.next().unwrap().is_none());
}

#[test]
fn codec_mismatch_on_open_is_an_error() {
    let mut buf = Vec::new();
    {
        let mut sink = Sink::create(&mut buf, |p: &[u8]| key_of(p)).unwrap();
        sink.write(&key_record(1)).unwrap();
        sink.close().unwrap();
    }

    let data = Arc::new(buf);
    let result = FileStream::open_file_with_codec(
        move || {
            let data = data.clone();
            Ok(Box::new(Cursor::new((*data).clone())) as Box<dyn ReadSeek + Send>)
        },
        Arc::new(sir_codecs::ZstdCodec::default()),
    );
    let err = result.unwrap_err().to_string();
    assert!(err.contains("codec mismatch"), "got: {err}");
}

#[test]
fn file_round_trips_through_every_bundled_codec() {
    let codecs: Vec<Box<dyn sir_core::Codec>> = vec![
        Box::new(sir_codecs::DeflateCodec::default()),
        Box::new(sir_codecs::Lz4Codec),
        Box::new(sir_codecs::ZstdCodec::default()),
    ];

    for codec in codecs {
        let name = codec.name();
        let mut buf = Vec::new();
        {
            let mut sink = Sink::create_with_codec(&mut buf, |p: &[u8]| key_of(p), codec).unwrap();
            for k in 0..20u64 {
                sink.write(&key_record(k)).unwrap();
                if k % 4 == 3 {
                    sink.flush().unwrap();
                }
            }
            sink.close().unwrap();
        }

        let stream = open_cursor(buf);
        let mut reader = stream.reader(0);
        let mut got = Vec::new();
        while let Some(block) = reader.next().unwrap() {
            got.extend(block.iter().map(|r| key_of(r)));
        }
        assert_eq!(got, (0..20u64).collect::<Vec<_>>(), "round-trip mismatch for codec {name}");
    }
}

/// Three readers at keys 0, 4, 0 across three flushes of `[1,2,3]`,
/// `[4,5,6]`, `[7,8,9]`: a reader created after the key-4 block has already
/// flushed skips straight to it, per `Reader(key)`'s one-time walk over the
/// blocks known at call time.
#[test]
fn memory_stream_multiple_readers_observe_full_sequence() {
    let (stream, mut writer) = mem::<u64, u64>(|v: &u64| *v);

    writer.write(1).unwrap();
    writer.write(2).unwrap();
    writer.write(3).unwrap();
    writer.flush().unwrap();

    writer.write(4).unwrap();
    writer.write(5).unwrap();
    writer.write(6).unwrap();
    writer.flush().unwrap();

    let mut reader_zero = stream.reader(0);
    let mut reader_four = stream.reader(4);

    assert_eq!(reader_zero.next().unwrap().unwrap(), vec![1, 2, 3]);
    assert_eq!(reader_four.next().unwrap().unwrap(), vec![4, 5, 6]);

    writer.write(7).unwrap();
    writer.write(8).unwrap();
    writer.write(9).unwrap();
    writer.close().unwrap();

    assert_eq!(reader_zero.next().unwrap().unwrap(), vec![4, 5, 6]);
    assert_eq!(reader_four.next().unwrap().unwrap(), vec![7, 8, 9]);
    assert_eq!(reader_zero.next().unwrap().unwrap(), vec![7, 8, 9]);
    assert!(reader_zero.next().unwrap().is_none());
    assert!(reader_four.next().unwrap().is_none());
}

#[test]
fn memory_stream_next_blocks_until_flush_then_close_drains_to_eof() {
    use std::thread;
    use std::time::Duration;

    let (stream, mut writer) = mem::<u64, u64>(|v: &u64| *v);
    let mut reader = stream.reader(0);

    let handle = thread::spawn(move || reader.next());

    thread::sleep(Duration::from_millis(20));
    writer.write(42).unwrap();
    writer.flush().unwrap();

    let first = handle.join().unwrap().unwrap();
    assert_eq!(first, Some(vec![42]));

    writer.close().unwrap();
}

#[test]
fn memory_stream_close_with_no_pending_data_yields_immediate_eof() {
    let (stream, mut writer) = mem::<u64, u64>(|v: &u64| *v);
    writer.close().unwrap();

    let mut reader = stream.reader(0);
    assert!(reader.next().unwrap().is_none());
}

#[test]
fn memory_stream_rejects_key_regression() {
    let (_stream, mut writer) = mem::<u64, u64>(|v: &u64| *v);
    writer.write(5).unwrap();
    let err = writer.write(4).unwrap_err();
    assert!(matches!(err, SirError::KeyRegression(_)));
}
