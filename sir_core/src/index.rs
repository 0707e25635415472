use std::io::{Read, Write};

use crate::error::{Result, SirError};
use crate::format::{INDEX_GROUP_BYTE_SIZE, INDEX_GROUP_SIZE};

/// `(key, file_offset)` pair pointing to the first record of some flushed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexSlot {
    pub i: u64,
    pub p: u64,
}

/// Sparse key→position index, built incrementally by `tick`/`tock` while a
/// sink streams blocks, or reconstructed wholesale when a file is opened.
///
/// In memory a group always holds one trailing pending empty slot. The
/// cursor into that slot is a `(group_index, slot_index)` pair rather than a
/// pointer — appending to a group may reallocate its backing `Vec`.
#[derive(Debug, Clone)]
pub struct IndexTable {
    pos: u64,
    pending: Option<(usize, usize)>,
    groups: Vec<Vec<IndexSlot>>,
}

impl IndexTable {
    pub fn new(init: u64) -> Self {
        let groups = vec![vec![IndexSlot::default()]];
        Self {
            pos: init,
            pending: Some((0, 0)),
            groups,
        }
    }

    /// Reseed the running position cursor. Callers use this to re-anchor the
    /// cursor to a real file offset after each flushed block, since `tick`'s
    /// position increment tracks uncompressed-payload bytes, not file bytes.
    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Called once per record. Fills the pending slot (if any) with
    /// `(key, pos)`, then advances `pos` by `size`.
    pub fn tick(&mut self, key: u64, size: u64) {
        if let Some((g, s)) = self.pending.take() {
            self.groups[g][s] = IndexSlot { i: key, p: self.pos };
        }
        self.pos += size;
    }

    /// Called once per flushed block. Appends a fresh pending slot to the
    /// current group, starting a new group when the current one is full.
    /// A `tock` with no intervening `tick` is a no-op — empty flushes do not
    /// consume index capacity.
    pub fn tock(&mut self) {
        if let Some((g, s)) = self.pending {
            if self.groups[g][s] == IndexSlot::default() {
                return;
            }
        }

        let mut gi = self.groups.len() - 1;
        if self.groups[gi].len() == INDEX_GROUP_SIZE {
            self.groups.push(Vec::with_capacity(INDEX_GROUP_SIZE));
            gi = self.groups.len() - 1;
        }
        self.groups[gi].push(IndexSlot::default());
        let si = self.groups[gi].len() - 1;
        self.pending = Some((gi, si));
    }

    /// Groups in order, each up to (but excluding) its trailing pending
    /// empty slot. Stops before a group that holds only a pending slot.
    pub fn groups(&self) -> Vec<&[IndexSlot]> {
        let mut out = Vec::with_capacity(self.groups.len());
        for g in &self.groups {
            let j = g.len() - 1;
            if g[j] == IndexSlot::default() {
                if j == 0 {
                    break;
                }
                out.push(&g[..j]);
                break;
            }
            out.push(&g[..]);
        }
        out
    }

    /// Position of the greatest slot whose key is `<= key`, walking slots in
    /// order. `None` if every slot's key exceeds `key`; callers fall back to
    /// `FirstBlockOffset`.
    pub fn find(&self, key: u64) -> Option<u64> {
        let mut best = None;
        for g in self.groups() {
            for slot in g {
                if slot.i <= key {
                    best = Some(slot.p);
                } else {
                    return best;
                }
            }
        }
        best
    }
}

/// Encode every populated group. Within one in-memory group, a sub-group
/// boundary is forced whenever a delta wouldn't fit in 32 bits, so ΔI/ΔP
/// overflow can never occur on disk. Every encoded group except the very
/// last one is padded to `INDEX_GROUP_BYTE_SIZE` with a zero delta acting as
/// an in-group end-of-slots sentinel; only the last group on disk is short.
pub fn encode_index_table<W: Write>(w: &mut W, table: &IndexTable) -> Result<()> {
    let mut disk_groups: Vec<&[IndexSlot]> = Vec::new();
    for g in table.groups() {
        let mut start = 0;
        while start < g.len() {
            let mut end = start + 1;
            let mut prev = g[start];
            while end < g.len() {
                let slot = g[end];
                let di = slot.i - prev.i;
                let dp = slot.p - prev.p;
                if di > u32::MAX as u64 || dp > u32::MAX as u64 {
                    break;
                }
                prev = slot;
                end += 1;
            }
            disk_groups.push(&g[start..end]);
            start = end;
        }
    }

    let last = disk_groups.len().saturating_sub(1);
    for (gi, group) in disk_groups.iter().enumerate() {
        encode_group(w, group, gi != last)?;
    }
    Ok(())
}

fn encode_group<W: Write>(w: &mut W, group: &[IndexSlot], pad: bool) -> Result<()> {
    let mut buf = [0u8; INDEX_GROUP_BYTE_SIZE as usize];
    buf[0..8].copy_from_slice(&group[0].i.to_le_bytes());
    buf[8..16].copy_from_slice(&group[0].p.to_le_bytes());

    let mut c = 16usize;
    let mut prev = group[0];
    for slot in &group[1..] {
        let di = (slot.i - prev.i) as u32;
        let dp = (slot.p - prev.p) as u32;
        buf[c..c + 4].copy_from_slice(&di.to_le_bytes());
        buf[c + 4..c + 8].copy_from_slice(&dp.to_le_bytes());
        c += 8;
        prev = *slot;
    }

    let n = if pad { INDEX_GROUP_BYTE_SIZE as usize } else { c };
    w.write_all(&buf[..n])?;
    Ok(())
}

/// Decode groups of `INDEX_GROUP_BYTE_SIZE` bytes, feeding each slot back
/// through `tick`/`tock` (reseeding the cursor via `seek` before each tick,
/// since the encoded positions are absolute file offsets). A short read (at
/// the very last group) or a zero `(ΔI, ΔP)` pair ends decoding.
pub fn decode_index_table<R: Read>(r: &mut R, table: &mut IndexTable) -> Result<()> {
    loop {
        let mut buf = [0u8; INDEX_GROUP_BYTE_SIZE as usize];
        let n = read_up_to(r, &mut buf)?;
        if n == 0 {
            break;
        }
        if n < 16 {
            return Err(SirError::Corruption("truncated index group".into()));
        }

        let i0 = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let p0 = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        if i0 == 0 && p0 == 0 {
            // A leading (0, 0) pair can only be the zeroed placeholder group
            // `Sink::close` writes for a stream that never flushed a block —
            // real slots always carry a position past the header. Treat it
            // as an empty table and stop.
            break;
        }
        table.seek(p0);
        table.tick(i0, 1);
        table.tock();

        let mut prev = IndexSlot { i: i0, p: p0 };
        let mut c = 16;
        while c + 8 <= n {
            let di = u32::from_le_bytes(buf[c..c + 4].try_into().unwrap());
            let dp = u32::from_le_bytes(buf[c + 4..c + 8].try_into().unwrap());
            if di == 0 && dp == 0 {
                break;
            }
            let slot = IndexSlot {
                i: prev.i + di as u64,
                p: prev.p + dp as u64,
            };
            table.seek(slot.p);
            table.tick(slot.i, 1);
            table.tock();
            prev = slot;
            c += 8;
        }

        if n < INDEX_GROUP_BYTE_SIZE as usize {
            break;
        }
    }
    Ok(())
}

fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}
