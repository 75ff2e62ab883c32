//! Position ↔ identifier indexes for a single axis.
//!
//! An [`AxisIndex`] maintains the bijection between live 1-based positions
//! and stable identifiers. Identifiers are minted monotonically and never
//! reused; positions shift under structural edits, identifiers do not.
//!
//! Live identifiers are held in ordered, non-overlapping [`Segment`]s whose
//! concatenation enumerates the axis in position order. A reverse index
//! maps each identifier to its segment and offset, so `id_to_pos` is a
//! hash lookup rather than a scan. A fresh sheet is a single segment;
//! partial inserts and removals split segments.

use ahash::AHashMap;
use cellgrid_model::AxisId;

/// A run of consecutive live identifiers.
#[derive(Debug, Clone)]
struct Segment<I> {
    /// Stable tag for reverse-index entries; survives reordering of the
    /// segment vector.
    serial: u32,
    /// 1-based position of `ids[0]`.
    start_pos: u32,
    ids: Vec<I>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    serial: u32,
    offset: u32,
}

/// Maps 1-based positions to stable identifiers and back.
#[derive(Debug)]
pub struct AxisIndex<I> {
    segments: Vec<Segment<I>>,
    /// Reverse index: identifier → (segment serial, offset in segment).
    slots: AHashMap<I, Slot>,
    /// Segment serial → current index in `segments`.
    seg_lookup: AHashMap<u32, usize>,
    next_serial: u32,
    /// Next raw identifier to mint; monotone, never reused.
    next_raw: u64,
    live: u32,
}

impl<I: AxisId> AxisIndex<I> {
    /// Create an axis with `count` freshly minted identifiers.
    pub fn new(count: u32) -> Self {
        let mut index = Self {
            segments: Vec::new(),
            slots: AHashMap::new(),
            seg_lookup: AHashMap::new(),
            next_serial: 0,
            next_raw: 0,
            live: 0,
        };
        index.insert(1, count);
        index
    }

    /// The identifier currently at `pos`, or `None` if `pos` is outside
    /// `[1, max_pos()]`.
    pub fn pos_to_id(&self, pos: u32) -> Option<I> {
        if pos == 0 || pos > self.live {
            return None;
        }
        let idx = self.segments.partition_point(|s| s.start_pos <= pos) - 1;
        let seg = &self.segments[idx];
        seg.ids.get((pos - seg.start_pos) as usize).copied()
    }

    /// The current position of `id`, or `None` if the identifier was never
    /// minted here or has been retired.
    pub fn id_to_pos(&self, id: I) -> Option<u32> {
        let slot = self.slots.get(&id)?;
        let idx = *self.seg_lookup.get(&slot.serial)?;
        Some(self.segments[idx].start_pos + slot.offset)
    }

    /// True if `id` is live on this axis.
    pub fn is_live(&self, id: I) -> bool {
        self.slots.contains_key(&id)
    }

    /// Mint `count` fresh identifiers occupying positions
    /// `at_pos..at_pos + count - 1`; former positions `>= at_pos` shift by
    /// `+count`. `at_pos` must lie in `[1, max_pos() + 1]` (callers clamp);
    /// positions beyond that append at the end.
    pub fn insert(&mut self, at_pos: u32, count: u32) -> Vec<I> {
        if count == 0 {
            return Vec::new();
        }
        let at_pos = at_pos.clamp(1, self.live + 1);
        let minted = self.mint(count);

        if at_pos == self.live + 1 {
            // Appending extends the trailing segment in place, keeping a
            // contiguous sheet a single segment.
            if let Some(seg) = self.segments.last_mut() {
                let serial = seg.serial;
                let base = seg.ids.len() as u32;
                for (i, &id) in minted.iter().enumerate() {
                    self.slots.insert(
                        id,
                        Slot {
                            serial,
                            offset: base + i as u32,
                        },
                    );
                }
                seg.ids.extend_from_slice(&minted);
                self.live += count;
                return minted;
            }

            self.push_segment(minted.clone());
            self.renumber();
            self.live += count;
            return minted;
        }

        let idx = self.segments.partition_point(|s| s.start_pos <= at_pos) - 1;
        let split_off = (at_pos - self.segments[idx].start_pos) as usize;

        if split_off > 0 {
            let tail = self.segments[idx].ids.split_off(split_off);
            let tail_serial = self.next_serial;
            self.next_serial += 1;
            for (i, &id) in tail.iter().enumerate() {
                self.slots.insert(
                    id,
                    Slot {
                        serial: tail_serial,
                        offset: i as u32,
                    },
                );
            }
            self.segments.insert(
                idx + 1,
                Segment {
                    serial: tail_serial,
                    start_pos: 0,
                    ids: tail,
                },
            );
        }

        let insert_at = if split_off > 0 { idx + 1 } else { idx };
        let serial = self.next_serial;
        self.next_serial += 1;
        for (i, &id) in minted.iter().enumerate() {
            self.slots.insert(
                id,
                Slot {
                    serial,
                    offset: i as u32,
                },
            );
        }
        self.segments.insert(
            insert_at,
            Segment {
                serial,
                start_pos: 0,
                ids: minted.clone(),
            },
        );

        self.renumber();
        self.live += count;
        minted
    }

    /// Retire the identifiers at positions `from..=to`; former positions
    /// `> to` shift by `-(to - from + 1)`. Returns the retired identifiers
    /// in position order. Out-of-range portions are clamped; an empty
    /// range is a no-op.
    pub fn remove(&mut self, from: u32, to: u32) -> Vec<I> {
        let from = from.max(1);
        let to = to.min(self.live);
        if from > to {
            return Vec::new();
        }

        let mut retired = Vec::with_capacity((to - from + 1) as usize);
        let mut kept = Vec::with_capacity(self.segments.len() + 1);

        for mut seg in std::mem::take(&mut self.segments) {
            let seg_start = seg.start_pos;
            let seg_end = seg_start + seg.ids.len() as u32 - 1;

            if to < seg_start || from > seg_end {
                kept.push(seg);
                continue;
            }

            let a = from.max(seg_start) - seg_start;
            let b = to.min(seg_end) - seg_start;

            for &id in &seg.ids[a as usize..=b as usize] {
                self.slots.remove(&id);
                retired.push(id);
            }
            seg.ids.drain(a as usize..=b as usize);

            if seg.ids.is_empty() {
                continue;
            }

            // Offsets at and after the cut moved; rewrite their slots.
            for (i, &id) in seg.ids.iter().enumerate().skip(a as usize) {
                if let Some(slot) = self.slots.get_mut(&id) {
                    slot.offset = i as u32;
                }
            }
            kept.push(seg);
        }

        self.segments = kept;
        self.renumber();
        self.live -= retired.len() as u32;
        retired
    }

    /// Number of live segments. A freshly created axis has one.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Highest valid position (equals the number of live identifiers).
    pub fn max_pos(&self) -> u32 {
        self.live
    }

    /// Number of identifiers ever minted, live or retired.
    pub fn total_ids(&self) -> u64 {
        self.next_raw
    }

    fn mint(&mut self, count: u32) -> Vec<I> {
        let start = self.next_raw;
        self.next_raw += count as u64;
        (start..self.next_raw).map(I::from_raw).collect()
    }

    fn push_segment(&mut self, ids: Vec<I>) {
        let serial = self.next_serial;
        self.next_serial += 1;
        for (i, &id) in ids.iter().enumerate() {
            self.slots.insert(
                id,
                Slot {
                    serial,
                    offset: i as u32,
                },
            );
        }
        self.segments.push(Segment {
            serial,
            start_pos: 0,
            ids,
        });
    }

    /// Recompute segment start positions and the serial → index map after
    /// any structural change. O(segment count).
    fn renumber(&mut self) {
        self.seg_lookup.clear();
        let mut pos = 1u32;
        for (idx, seg) in self.segments.iter_mut().enumerate() {
            seg.start_pos = pos;
            pos += seg.ids.len() as u32;
            self.seg_lookup.insert(seg.serial, idx);
        }
    }
}
