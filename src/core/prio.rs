//! Priority bitmap management for O(1) highest-ready lookup
//!
//! Each bit represents a priority level. A set bit means there's at least
//! one ready task at that priority. Higher numeric priorities are more
//! urgent, so the highest set bit of the highest non-zero word wins.

use crate::config::CFG_PRIO_MAX;
use crate::types::Prio;

/// Number of words needed for the priority bitmap
const PRIO_TBL_SIZE: usize = (CFG_PRIO_MAX + 31) / 32;

/// Priority bitmap table
pub struct PrioTable {
    bitmap: [u32; PRIO_TBL_SIZE],
}

impl PrioTable {
    pub const fn new() -> Self {
        PrioTable {
            bitmap: [0; PRIO_TBL_SIZE],
        }
    }

    /// Word index and bit mask of `prio`; `None` past `CFG_PRIO_MAX`
    #[inline]
    fn locate(prio: Prio) -> Option<(usize, u32)> {
        if prio as usize >= CFG_PRIO_MAX {
            return None;
        }
        Some(((prio / 32) as usize, 1 << (prio % 32)))
    }

    /// Insert a priority into the bitmap; out-of-range priorities are ignored
    #[inline]
    pub fn insert(&mut self, prio: Prio) {
        if let Some((word, bit)) = Self::locate(prio) {
            self.bitmap[word] |= bit;
        }
    }

    /// Remove a priority from the bitmap
    #[inline]
    pub fn remove(&mut self, prio: Prio) {
        if let Some((word, bit)) = Self::locate(prio) {
            self.bitmap[word] &= !bit;
        }
    }

    /// Get the highest priority with a ready task
    #[inline]
    pub fn get_highest(&self) -> Option<Prio> {
        for (idx, &word) in self.bitmap.iter().enumerate().rev() {
            if word != 0 {
                let bit = 31 - word.leading_zeros() as usize;
                return Some((idx * 32 + bit) as Prio);
            }
        }
        None
    }

    /// Check if a specific priority has any ready tasks
    #[inline]
    pub fn is_set(&self, prio: Prio) -> bool {
        Self::locate(prio).is_some_and(|(word, bit)| (self.bitmap[word] & bit) != 0)
    }

    /// Check if the priority table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap.iter().all(|&w| w == 0)
    }
}

impl Default for PrioTable {
    fn default() -> Self {
        Self::new()
    }
}
