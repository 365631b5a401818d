//! A model of one Cap'n Proto segment under construction.
//!
//! Fields are inserted at the offsets the layout assigns them, in whatever
//! order the encoder reaches them. Payloads are allocated past the end of
//! what has been allocated so far. Only [Segment::compile] turns the map into
//! a single value, filling every hole with zeros.
use crate::gasket::{Component, Gasket};
use std::collections::BTreeMap;

/// Bit offset interval map from `[start, stop)` to the value stored there.
pub struct Segment {
    /// start -> (stop, value)
    values: BTreeMap<u64, (u64, Component)>,
    allocated: u64,
    expected_size: u64,
}

impl Segment {
    /// A segment that will compile to exactly `expected_size` bits.
    pub fn new(expected_size: u64) -> Self {
        Self {
            values: BTreeMap::new(),
            allocated: 0,
            expected_size,
        }
    }

    /// Reserve `bits` bits past the allocated region. Returns their offset.
    pub fn alloc(&mut self, bits: u64) -> u64 {
        let ptr = self.allocated;
        self.allocated += bits;
        ptr
    }

    /// Place `value` at bit `offset`. Zero-width values are dropped.
    ///
    /// # Panics
    /// Panics if the value overlaps a previously inserted one or does not fit
    /// in the expected size.
    pub fn insert(&mut self, g: &Gasket, offset: u64, value: Component) {
        let width = g.width(value);
        if width == 0 {
            return;
        }
        let stop = offset + width;
        assert!(
            stop <= self.expected_size,
            "Inserting [{offset}, {stop}) past the end of a {} bit message",
            self.expected_size
        );
        if let Some((start, (prev_stop, _))) = self.values.range(..stop).next_back() {
            assert!(
                *prev_stop <= offset,
                "Inserting [{offset}, {stop}) overlaps [{start}, {prev_stop})"
            );
        }
        log::trace!("segment [{offset}, {stop}) <- {}", g.ty(value));
        self.values.insert(offset, (stop, value));
    }

    /// Concatenate everything in offset order, padding the gaps with zeros,
    /// into one bit array of the expected size.
    pub fn compile(&self, g: &mut Gasket) -> Component {
        let mut parts = Vec::with_capacity(self.values.len() * 2 + 1);
        let mut last_stop = 0;
        for (start, (stop, value)) in &self.values {
            if *start > last_stop {
                let pad = g.padding(start - last_stop);
                parts.push(g.component(pad));
            }
            parts.push(*value);
            last_stop = *stop;
        }
        if last_stop < self.expected_size {
            let pad = g.padding(self.expected_size - last_stop);
            parts.push(g.component(pad));
        }
        g.concat(&parts)
    }
}
