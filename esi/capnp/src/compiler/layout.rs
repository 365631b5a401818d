//! Struct layout: assigns every field of a struct an offset in its data or
//! pointer section.
//!
//! Data fields are allocated one at a time in ordinal order. A field of size
//! `2^lg` bits is placed in the smallest free hole of at least that size left
//! behind by previous allocations, and only opens a new data word when there
//! is no such hole. The leftover part of a freshly opened word is recorded as
//! one hole per power of two, so later small fields pack in front of it.

/// Log2 of the number of bits in a word.
const LG_WORD: usize = 6;

/// Free, aligned regions of the data section. `holes[lg]` is the offset (in
/// units of `2^lg` bits) of a free region of that size, or zero if there is
/// none. Offset zero can never be a hole: it is always the first allocation of
/// a word.
#[derive(Debug, Default, Clone)]
struct HoleSet {
    holes: [u64; LG_WORD],
}

impl HoleSet {
    fn try_allocate(&mut self, lg_size: usize) -> Option<u64> {
        if lg_size >= LG_WORD {
            None
        } else if self.holes[lg_size] != 0 {
            let result = self.holes[lg_size];
            self.holes[lg_size] = 0;
            Some(result)
        } else {
            let next = self.try_allocate(lg_size + 1)?;
            let result = next * 2;
            self.holes[lg_size] = result + 1;
            Some(result)
        }
    }

    fn add_holes_at_end(&mut self, mut lg_size: usize, mut offset: u64) {
        while lg_size < LG_WORD {
            debug_assert!(self.holes[lg_size] == 0);
            debug_assert!(offset % 2 == 1);
            self.holes[lg_size] = offset;
            lg_size += 1;
            offset = offset.div_ceil(2);
        }
    }
}

/// Running layout of one struct.
#[derive(Debug, Default, Clone)]
pub struct StructLayout {
    data_word_count: u64,
    pointer_count: u64,
    holes: HoleSet,
}

impl StructLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `2^lg_size` bits in the data section. Returns the offset in
    /// units of the allocation size.
    pub fn add_data(&mut self, lg_size: usize) -> u64 {
        if let Some(hole) = self.holes.try_allocate(lg_size) {
            return hole;
        }
        let offset = self.data_word_count << (LG_WORD - lg_size);
        self.data_word_count += 1;
        self.holes.add_holes_at_end(lg_size, offset + 1);
        offset
    }

    /// Allocate one pointer. Returns its index in the pointer section.
    pub fn add_pointer(&mut self) -> u64 {
        let offset = self.pointer_count;
        self.pointer_count += 1;
        offset
    }

    pub fn data_word_count(&self) -> u64 {
        self.data_word_count
    }

    pub fn pointer_count(&self) -> u64 {
        self.pointer_count
    }
}
