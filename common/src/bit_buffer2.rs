//! Bit-packed 2D boolean mask.
//!
//! One bit per cell, stored in `u64` words in row-major order.

const BITS_PER_WORD: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer2 {
    words: Vec<u64>,
    width: usize,
    height: usize,
}

impl BitBuffer2 {
    pub fn new_filled(width: usize, height: usize, value: bool) -> Self {
        let num_words = (width * height).div_ceil(BITS_PER_WORD);
        let fill = if value { !0u64 } else { 0u64 };
        Self {
            words: vec![fill; num_words],
            width,
            height,
        }
    }

    pub fn new_default(width: usize, height: usize) -> Self {
        Self::new_filled(width, height, false)
    }

    /// Build a mask by evaluating `f(x, y)` for every cell.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> bool,
    {
        let mut mask = Self::new_default(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        debug_assert!(x < self.width && y < self.height);
        let idx = y * self.width + x;
        (self.words[idx / BITS_PER_WORD] >> (idx % BITS_PER_WORD)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        debug_assert!(x < self.width && y < self.height);
        let idx = y * self.width + x;
        let bit = 1u64 << (idx % BITS_PER_WORD);
        if value {
            self.words[idx / BITS_PER_WORD] |= bit;
        } else {
            self.words[idx / BITS_PER_WORD] &= !bit;
        }
    }

    /// Number of set cells. Padding bits of the last word are ignored.
    pub fn count_ones(&self) -> usize {
        let len = self.len();
        if len == 0 {
            return 0;
        }
        let full_words = len / BITS_PER_WORD;
        let mut count: usize = self.words[..full_words]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum();
        let tail = len % BITS_PER_WORD;
        if tail > 0 {
            let mask = (1u64 << tail) - 1;
            count += (self.words[full_words] & mask).count_ones() as usize;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_true_counts_only_real_cells() {
        let mask = BitBuffer2::new_filled(10, 7, true);
        assert_eq!(mask.len(), 70);
        assert_eq!(mask.count_ones(), 70);
    }

    #[test]
    fn test_set_and_get() {
        let mut mask = BitBuffer2::new_default(9, 9);
        mask.set(8, 8, true);
        mask.set(0, 1, true);
        assert!(mask.get(8, 8));
        assert!(mask.get(0, 1));
        assert!(!mask.get(1, 0));
        assert_eq!(mask.count_ones(), 2);

        mask.set(8, 8, false);
        assert!(!mask.get(8, 8));
        assert_eq!(mask.count_ones(), 1);
    }

    #[test]
    fn test_from_fn_crosses_word_boundary() {
        let mask = BitBuffer2::from_fn(100, 3, |x, _| x % 2 == 0);
        assert_eq!(mask.count_ones(), 150);
        assert!(mask.get(64, 0));
        assert!(!mask.get(65, 2));
    }

    #[test]
    fn test_empty_mask() {
        let mask = BitBuffer2::new_filled(0, 5, true);
        assert!(mask.is_empty());
        assert_eq!(mask.count_ones(), 0);
    }
}
