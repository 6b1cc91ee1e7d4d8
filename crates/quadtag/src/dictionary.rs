//! Embedded tag dictionaries and rotation-aware code matching.
//!
//! Codes are packed row-major into a `u64` (`idx = row * grid + col`, LSB
//! first) with **black = 1**. Each family table keeps a minimum pairwise
//! Hamming distance between all rotations of all codes, which is what makes
//! bounded error correction sound.

/// A fixed tag dictionary.
#[derive(Clone, Copy, Debug)]
pub struct Dictionary {
    /// Human-readable name (for debugging/logging).
    pub name: &'static str,
    /// Bit-grid side length (data bits per side, border excluded).
    pub grid: usize,
    /// Minimum Hamming distance between any two (rotated) codes.
    pub min_hamming: u8,
    /// One `u64` per tag id.
    pub codes: &'static [u64],
}

impl Dictionary {
    /// Total number of data bits per tag.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.grid * self.grid
    }
}

/// A dictionary match for an observed code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Tag id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that `observed == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Bit errors between observed and dictionary code (after rotation).
    pub hamming: u8,
}

/// Brute-force matcher over a fixed dictionary.
///
/// Rotated variants are precomputed once; for the embedded table sizes a
/// linear scan is fast and keeps memory small.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher accepting up to `max_hamming` corrected bits.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        debug_assert!(dict.bit_count() <= 64);

        let mut rotated = Vec::with_capacity(dict.codes.len());
        for &base in dict.codes {
            rotated.push([
                base,
                rotate_code_u64(base, dict.grid, 1),
                rotate_code_u64(base, dict.grid, 2),
                rotate_code_u64(base, dict.grid, 3),
            ]);
        }

        Self {
            dict,
            max_hamming,
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    /// Find the best match within `max_hamming` corrected bits.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;

        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                let m = Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                };
                if best.map(|prev| m.hamming < prev.hamming).unwrap_or(true) {
                    if m.hamming == 0 {
                        return Some(m);
                    }
                    best = Some(m);
                }
            }
        }

        best
    }
}

/// Rotate a row-major packed code by `rot * 90` degrees.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            let bit = (code >> (sy * n + sx)) & 1;
            out |= bit << (y * n + x);
        }
    }
    out
}

pub(crate) const TAG36H11: Dictionary = Dictionary {
    name: "36h11",
    grid: 6,
    min_hamming: 11,
    codes: TAG36H11_CODES,
};

pub(crate) const TAG25H9: Dictionary = Dictionary {
    name: "25h9",
    grid: 5,
    min_hamming: 9,
    codes: TAG25H9_CODES,
};

pub(crate) const TAG16H5: Dictionary = Dictionary {
    name: "16h5",
    grid: 4,
    min_hamming: 5,
    codes: TAG16H5_CODES,
};

const TAG36H11_CODES: &[u64] = &[
    0xd5d628584, 0xd97f18b49, 0xdd280910e, 0xe479e9c98,
    0xebcbca822, 0xf0b1f1d39, 0x318800a71, 0x6476cb3ef,
    0xe9c9597d0, 0xbcd09f35c, 0xa5f1ae3a0, 0x6ebd20741,
    0x03c56269d, 0x80e538018, 0xdefae1094, 0xf2aa13be8,
    0x2f6ae4c49, 0xc3247c752, 0xe65314317, 0x3b7657d72,
    0xba2441b1d, 0xa745309b0, 0x013e0a203, 0xfa3d97915,
    0x32fd2f1d4, 0xbc5dbeef6, 0xda62ec30e, 0xd6b7ab5bc,
    0x8cd8be011, 0x6a7faf138, 0x476923e71, 0x3a37e2076,
    0xd3cf3942c, 0xc7f5f0117, 0x83bd5e29a, 0xd5141a158,
    0xfde340eaf, 0xe62e7851d, 0x499f80fac, 0x20ecbbe82,
    0x38e0ff868, 0xdb909ef6f, 0xa52a0d877, 0x29403f391,
    0x866a8f3d7, 0xcca456fbd, 0x6a9d6acbe, 0x6769bddc6,
    0x91be993df, 0x8b3775300,
];

const TAG25H9_CODES: &[u64] = &[
    0x155cbf1, 0x1e4d1b6, 0x17b0b68, 0x1eac9cd,
    0x12e14ce, 0x03548bb, 0x07757e6, 0x1065dab,
    0x0039127, 0x07e513f, 0x0868e6b, 0x1d40c0d,
    0x0661a05, 0x1a2d672, 0x0c26b16, 0x187a90a,
    0x1967826, 0x1caf7b9, 0x15ad9e2, 0x1bf478c,
    0x0ec2104, 0x15c7959, 0x1a8ae24, 0x0ff6bd0,
    0x08ed8f7, 0x11404b6, 0x16c1363, 0x08065bf,
    0x139a888, 0x1533a52, 0x07ef653, 0x0210654,
    0x1b51287, 0x143541e, 0x1b46723,
];

const TAG16H5_CODES: &[u64] = &[
    0x231b, 0x2ea5, 0x346a, 0x45b9,
    0x79a6, 0x7f6b, 0xb358, 0xe745,
    0xfe59, 0x982c, 0x3784, 0xf1d6,
    0xfc8e, 0xd730, 0x2898, 0x9242,
    0x254f, 0x91f3, 0x00f5, 0x2fdd,
    0x2d33, 0xd566, 0xd098, 0xbc30,
    0x0df6, 0xe073, 0x75e0, 0xf1c9,
    0xbdda, 0x1086,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_four_times_is_identity() {
        let code = 0x0123_4567_89ab_cdef_u64;
        let mut r = code;
        for _ in 0..4 {
            r = rotate_code_u64(r, 8, 1);
        }
        assert_eq!(code, r);
    }

    #[test]
    fn matcher_finds_rotated_code() {
        let matcher = Matcher::new(TAG36H11, 0);

        let base = TAG36H11.codes[7];
        let observed = rotate_code_u64(base, TAG36H11.grid, 1);
        let m = matcher.match_code(observed).expect("match");
        assert_eq!(m.id, 7);
        assert_eq!(m.rotation, 1);
        assert_eq!(m.hamming, 0);
    }

    #[test]
    fn matcher_corrects_bit_errors() {
        let matcher = Matcher::new(TAG36H11, 2);

        let observed = TAG36H11.codes[0] ^ 0b101; // two flipped bits
        let m = matcher.match_code(observed).expect("match");
        assert_eq!(m.id, 0);
        assert_eq!(m.rotation, 0);
        assert_eq!(m.hamming, 2);
    }

    #[test]
    fn matcher_rejects_beyond_budget() {
        let matcher = Matcher::new(TAG36H11, 2);
        let observed = TAG36H11.codes[0] ^ 0b1_0101; // three flipped bits
        assert!(matcher.match_code(observed).is_none());
    }

    #[test]
    fn tables_fit_family_bit_depth() {
        for dict in [TAG36H11, TAG25H9, TAG16H5] {
            let mask = if dict.bit_count() == 64 {
                u64::MAX
            } else {
                (1u64 << dict.bit_count()) - 1
            };
            for &c in dict.codes {
                assert_eq!(c & !mask, 0, "{}: code 0x{c:x} exceeds bit depth", dict.name);
            }
        }
    }
}
