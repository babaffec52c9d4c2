use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::sequence::{reverse_complement_in_place, Sequence};

/// Outcome of looking for a barcode in a read region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionResult {
    NoMatch,
    ForwardMatch,
    ReverseComplementMatch,
}

impl ExtractionResult {
    pub fn is_match(self) -> bool {
        self != ExtractionResult::NoMatch
    }
}

/// Finds a barcode in a read region.
///
/// On a match an implementation may narrow `read` to the barcode itself, in
/// forward orientation; whatever is left in `read` is what gets reported.
/// An empty sequence must never match.
pub trait BarcodeMatcher {
    fn extract(&self, read: &mut Sequence) -> ExtractionResult;
}

/// Count how many bytes within `x` are non-zero.
#[inline(always)]
fn count_nonzero_bytes(mut x: u64) -> u32 {
    // Fold every set bit of a byte into its LSB, keep only the LSBs, then
    // sum them into the top byte.
    x |= x >> 4;
    x |= x >> 2;
    x |= x >> 1;
    x &= 0x0101010101010101;
    (x.wrapping_mul(0x0101010101010101) >> 56) as u32
}

/// 0x80 in each byte position that was zero in `x`, 0x00 otherwise.
#[inline(always)]
fn zero_byte_mask(x: u64) -> u64 {
    x.wrapping_sub(0x0101010101010101) & !x & 0x8080808080808080
}

/// Hamming distance between two equal-length slices, counting an `N` on
/// either side as a mismatch. Works 8 bytes at a time.
pub fn hamming_distance_with_n(seq1: &[u8], seq2: &[u8]) -> u32 {
    debug_assert_eq!(seq1.len(), seq2.len());

    let len = seq1.len();
    let mut distance = 0u32;
    let mut i = 0usize;

    const N_UPPER: u64 = 0x4E4E4E4E4E4E4E4E;
    const N_LOWER: u64 = 0x6E6E6E6E6E6E6E6E;

    while i + 8 <= len {
        let chunk1 = u64::from_ne_bytes(seq1[i..i + 8].try_into().unwrap_or([0; 8]));
        let chunk2 = u64::from_ne_bytes(seq2[i..i + 8].try_into().unwrap_or([0; 8]));

        let n_mask = zero_byte_mask(chunk1 ^ N_UPPER)
            | zero_byte_mask(chunk1 ^ N_LOWER)
            | zero_byte_mask(chunk2 ^ N_UPPER)
            | zero_byte_mask(chunk2 ^ N_LOWER);

        distance += count_nonzero_bytes((chunk1 ^ chunk2) | n_mask);
        i += 8;
    }

    while i < len {
        let x = seq1[i];
        let y = seq2[i];
        if x != y || x == b'N' || x == b'n' || y == b'N' || y == b'n' {
            distance += 1;
        }
        i += 1;
    }

    distance
}

/// Leftmost offset at which `barcode` occurs in `read` with at most
/// `max_mismatches` differences.
///
/// With mismatches allowed, the barcode is cut into `max_mismatches + 1`
/// chunks; by pigeonhole one of them must match exactly, so the full
/// distance is only computed for windows where a chunk hits.
pub fn find_barcode(barcode: &[u8], read: &[u8], max_mismatches: u32) -> Option<usize> {
    let bc_len = barcode.len();
    let read_len = read.len();

    if bc_len == 0 || read_len < bc_len {
        return None;
    }

    if max_mismatches == 0 {
        return read.windows(bc_len).position(|window| window == barcode);
    }

    let num_chunks = (max_mismatches + 1) as usize;
    if bc_len < num_chunks {
        return (0..=(read_len - bc_len)).find(|&i| {
            hamming_distance_with_n(barcode, &read[i..i + bc_len]) <= max_mismatches
        });
    }

    let chunk_size = bc_len / num_chunks;
    (0..=(read_len - bc_len)).find(|&i| {
        let window = &read[i..i + bc_len];
        let seeded = (0..num_chunks).any(|chunk_idx| {
            let start = chunk_idx * chunk_size;
            let end = if chunk_idx == num_chunks - 1 {
                bc_len
            } else {
                start + chunk_size
            };
            barcode[start..end] == window[start..end]
        });
        seeded && hamming_distance_with_n(barcode, window) <= max_mismatches
    })
}

/// Matches reads against a fixed list of equal-length barcodes.
///
/// The forward strand is scanned first, then the reverse complement. The
/// first whitelist entry found wins, and the read is narrowed to the matched
/// window, reverse-complemented when the hit was on the opposite strand.
#[derive(Debug, Clone)]
pub struct WhitelistMatcher {
    barcodes: Vec<Vec<u8>>,
    barcode_len: usize,
    max_mismatches: u32,
}

impl WhitelistMatcher {
    pub fn new(barcodes: Vec<Vec<u8>>, max_mismatches: u32) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let barcodes: Vec<Vec<u8>> = barcodes
            .into_iter()
            .map(|b| b.to_ascii_uppercase())
            .filter(|b| seen.insert(b.clone()))
            .collect();

        let barcode_len = match barcodes.first() {
            Some(b) if !b.is_empty() => b.len(),
            _ => {
                return Err(ConfigError::InvalidWhitelist(
                    "no barcodes in whitelist".to_string(),
                ))
            }
        };
        if let Some(bad) = barcodes.iter().find(|b| b.len() != barcode_len) {
            return Err(ConfigError::InvalidWhitelist(format!(
                "barcode {} has length {}, expected {}",
                String::from_utf8_lossy(bad),
                bad.len(),
                barcode_len
            )));
        }

        Ok(Self {
            barcodes,
            barcode_len,
            max_mismatches,
        })
    }

    /// Load a whitelist with one barcode per line. Blank lines and lines
    /// starting with `#` are ignored.
    pub fn from_path(path: &Path, max_mismatches: u32) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let barcodes = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| l.as_bytes().to_vec())
            .collect();
        Self::new(barcodes, max_mismatches)
    }

    pub fn barcode_len(&self) -> usize {
        self.barcode_len
    }

    fn find_any(&self, read: &[u8]) -> Option<usize> {
        self.barcodes
            .iter()
            .find_map(|bc| find_barcode(bc, read, self.max_mismatches))
    }
}

impl BarcodeMatcher for WhitelistMatcher {
    fn extract(&self, read: &mut Sequence) -> ExtractionResult {
        if read.len() < self.barcode_len {
            return ExtractionResult::NoMatch;
        }

        let upper = read.forward_seq().to_ascii_uppercase();
        if let Some(pos) = self.find_any(&upper) {
            read.truncate_to(pos, self.barcode_len);
            return ExtractionResult::ForwardMatch;
        }

        let mut rc = upper;
        reverse_complement_in_place(&mut rc);
        if let Some(pos) = self.find_any(&rc) {
            read.reverse_complement_in_place();
            read.truncate_to(pos, self.barcode_len);
            return ExtractionResult::ReverseComplementMatch;
        }

        ExtractionResult::NoMatch
    }
}
