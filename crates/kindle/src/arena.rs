//! # Arena — Generational Slot Storage
//!
//! Scene nodes and components both live in an [`Arena`]: a `Vec` of slots
//! addressed by an [`Index`] that pairs the slot position with a
//! **generation** counter. When a slot is freed its generation is bumped, so
//! stale handles held by components (a reference to a node that has since
//! been destroyed, say) fail lookups instead of aliasing whatever reused the
//! slot.
//!
//! ```text
//! Index { slot: 5, generation: 0 }  ← original
//! Index { slot: 5, generation: 1 }  ← after the slot is recycled
//! ```
//!
//! ## Memory Layout
//!
//! ```text
//! slots:     [A@0, _@1, C@0, _@2, E@0]   ← value + generation per slot
//! free_list: [1, 3]                      ← slots available for reuse
//! ```
//!
//! Insertion pops from `free_list` if possible, otherwise grows. Removal
//! takes the value, bumps the generation and pushes the slot on the free
//! list.

use std::fmt;

/// Handle into an [`Arena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl Index {
    /// Raw slot position. Useful for diagnostics, not for general use.
    pub fn slot(self) -> u32 {
        self.slot
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational storage with stable handles.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Store a value, reusing a freed slot when one is available.
    pub fn insert(&mut self, value: T) -> Index {
        self.len += 1;
        if let Some(slot) = self.free_list.pop() {
            // Generation was already bumped on removal.
            let entry = &mut self.slots[slot as usize];
            entry.value = Some(value);
            Index {
                slot,
                generation: entry.generation,
            }
        } else {
            let slot = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Index {
                slot,
                generation: 0,
            }
        }
    }

    /// Remove the value behind `index`. Returns `None` for stale handles.
    pub fn remove(&mut self, index: Index) -> Option<T> {
        let entry = self.slots.get_mut(index.slot as usize)?;
        if entry.generation != index.generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free_list.push(index.slot);
        self.len -= 1;
        Some(value)
    }

    pub fn contains(&self, index: Index) -> bool {
        self.get(index).is_some()
    }

    pub fn get(&self, index: Index) -> Option<&T> {
        let entry = self.slots.get(index.slot as usize)?;
        if entry.generation != index.generation {
            return None;
        }
        entry.value.as_ref()
    }

    pub fn get_mut(&mut self, index: Index) -> Option<&mut T> {
        let entry = self.slots.get_mut(index.slot as usize)?;
        if entry.generation != index.generation {
            return None;
        }
        entry.value.as_mut()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Index, &T)> {
        self.slots.iter().enumerate().filter_map(|(slot, entry)| {
            entry.value.as_ref().map(|value| {
                (
                    Index {
                        slot: slot as u32,
                        generation: entry.generation,
                    },
                    value,
                )
            })
        })
    }
}
