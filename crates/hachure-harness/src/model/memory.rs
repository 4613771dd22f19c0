//! Word-addressed memories of the reference SoC.

use std::collections::HashMap;

/// Words of the off-chip SRAM and of the on-chip RAM.
pub const MEMORY_WORDS: u32 = 2048;

/// Word offsets exercised by the pattern check.
pub const PATTERN_OFFSETS: [u32; 7] = [0, 211, 256, 511, 512, 1023, 1024];

/// Pattern seed of the off-chip SRAM.
pub const SRAM_SEED: u32 = 42;

/// Pattern seed of the on-chip RAM.
pub const RAM_SEED: u32 = 43;

/// Known words of the execute-in-place flash image, as `(word offset, word)`.
pub const XIP_IMAGE: [(u32, u32); 4] =
    [(0, 0x0000_0013), (10, 0x0000_0013), (28, 0x0000_0093), (36, 0x0000_0493)];

/// Scrambled test word for `addr` under `seed`, in 32-bit wrapping
/// arithmetic.
pub const fn pattern(addr: u32, seed: u32) -> u32 {
    let mut x = addr.wrapping_add(seed);
    x ^= x >> 13;
    x = x.wrapping_add(x << 7);
    x ^= x >> 17;
    x = x.wrapping_add(x << 5);
    x
}

/// Sparse word store with a fixed size. Out-of-range writes are lost and
/// out-of-range or never-written words read as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    words: u32,
    cells: HashMap<u32, u32>,
}

impl Memory {
    /// Empty memory of `words` words.
    pub fn new(words: u32) -> Self {
        Self { words, cells: HashMap::new() }
    }

    /// Memory preloaded with `image`.
    pub fn with_image(words: u32, image: &[(u32, u32)]) -> Self {
        let mut memory = Self::new(words);
        for &(offset, word) in image {
            memory.write(offset, word);
        }
        memory
    }

    /// Store `word` at `offset`.
    pub fn write(&mut self, offset: u32, word: u32) {
        if offset < self.words {
            self.cells.insert(offset, word);
        }
    }

    /// Load the word at `offset`.
    pub fn read(&self, offset: u32) -> u32 {
        self.cells.get(&offset).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matches_reference_values() {
        assert_eq!(pattern(0, 42), 0x0002_BA6A);
        assert_ne!(pattern(0, SRAM_SEED), pattern(0, RAM_SEED));
    }

    #[test]
    fn out_of_range_is_lost() {
        let mut memory = Memory::new(4);
        memory.write(3, 7);
        memory.write(4, 9);
        assert_eq!(memory.read(3), 7);
        assert_eq!(memory.read(4), 0);
    }

    #[test]
    fn image_is_preloaded() {
        let flash = Memory::with_image(64, &XIP_IMAGE);
        assert_eq!(flash.read(36), 0x493);
        assert_eq!(flash.read(1), 0);
    }
}
