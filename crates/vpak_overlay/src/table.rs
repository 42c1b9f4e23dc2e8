//! Generation-checked handle tables.
//!
//! Callers across the API boundary hold raw `u64` handles, not references.
//! Each table hands out handles that encode a slot index, a per-slot
//! generation counter and a table tag:
//!
//! ```text
//! 63      56 55            32 31             0
//! +--------+----------------+----------------+
//! |  tag   |   generation   |     index      |
//! +--------+----------------+----------------+
//! ```
//!
//! The generation is bumped whenever a slot is vacated, so a handle kept
//! around after `remove` stops resolving even once the slot is reused. The
//! tag keeps file and search handles from being mixed up, and makes foreign
//! handle values cheap to recognize without a table lookup.

/// Tag byte carried by file handles.
pub const FILE_TAG: u8 = 0xBF;
/// Tag byte carried by directory-search handles.
pub const FIND_TAG: u8 = 0xBE;

const GENERATION_BITS: u32 = 24;
const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;

/// Extract the tag byte from a raw handle value.
pub fn tag_of(raw: u64) -> u8 {
    (raw >> 56) as u8
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena keyed by tagged, generation-checked `u64` handles.
pub struct HandleTable<T> {
    tag: u8,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> HandleTable<T> {
    pub fn new(tag: u8) -> Self {
        Self {
            tag,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Store a value and return its raw handle.
    pub fn insert(&mut self, value: T) -> u64 {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].value = Some(value);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                (self.slots.len() - 1) as u32
            }
        };

        self.encode(index, self.slots[index as usize].generation)
    }

    pub fn get(&self, raw: u64) -> Option<&T> {
        let (index, generation) = self.decode(raw)?;
        let slot = self.slots.get(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, raw: u64) -> Option<&mut T> {
        let (index, generation) = self.decode(raw)?;
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Remove the value behind `raw`. The slot's generation is bumped, so
    /// the handle (and any copy of it) stops resolving immediately.
    pub fn remove(&mut self, raw: u64) -> Option<T> {
        let (index, generation) = self.decode(raw)?;
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = (slot.generation + 1) & GENERATION_MASK;
        self.free.push(index);
        Some(value)
    }

    pub fn contains(&self, raw: u64) -> bool {
        self.get(raw).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every live value, invalidating all outstanding
    /// handles.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len());
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                slot.generation = (slot.generation + 1) & GENERATION_MASK;
                self.free.push(index as u32);
                values.push(value);
            }
        }
        values
    }

    fn encode(&self, index: u32, generation: u32) -> u64 {
        ((self.tag as u64) << 56) | ((generation as u64) << 32) | index as u64
    }

    fn decode(&self, raw: u64) -> Option<(u32, u32)> {
        if tag_of(raw) != self.tag {
            return None;
        }
        let generation = ((raw >> 32) as u32) & GENERATION_MASK;
        let index = raw as u32;
        Some((index, generation))
    }
}
