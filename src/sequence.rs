/// Complement a single nucleotide, preserving case. Anything outside
/// `ACGTN` becomes `N`.
#[inline]
fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        b'n' => b'n',
        _ => b'N',
    }
}

/// Reverse-complement a nucleotide string in place.
pub fn reverse_complement_in_place(seq: &mut [u8]) {
    seq.reverse();
    for b in seq.iter_mut() {
        *b = complement(*b);
    }
}

/// A read (or a region of one): bases plus per-base Phred+33 qualities.
///
/// `qual` is either as long as `seq` or empty when the input carried no
/// qualities (FASTA).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    seq: Vec<u8>,
    qual: Vec<u8>,
}

impl Sequence {
    /// Build a sequence. Qualities whose length does not match the bases are
    /// dropped rather than kept misaligned.
    pub fn new(seq: Vec<u8>, qual: Option<Vec<u8>>) -> Self {
        let qual = match qual {
            Some(q) if q.len() == seq.len() => q,
            _ => Vec::new(),
        };
        Self { seq, qual }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn forward_seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn quality(&self) -> &[u8] {
        &self.qual
    }

    pub fn has_quality(&self) -> bool {
        !self.qual.is_empty()
    }

    /// Copy out `[start, start + len)`. Returns `None` if the window runs past
    /// the end of the read.
    pub fn sub_read(&self, start: usize, len: usize) -> Option<Sequence> {
        let end = start.checked_add(len)?;
        if end > self.seq.len() {
            return None;
        }
        let qual = if self.has_quality() {
            self.qual[start..end].to_vec()
        } else {
            Vec::new()
        };
        Some(Sequence {
            seq: self.seq[start..end].to_vec(),
            qual,
        })
    }

    /// Reverse-complement the bases and reverse the qualities to match.
    pub fn reverse_complement_in_place(&mut self) {
        reverse_complement_in_place(&mut self.seq);
        self.qual.reverse();
    }

    /// Narrow this sequence to `[start, start + len)` without copying into a
    /// new value. Returns `false`, leaving `self` untouched, if the window is
    /// out of range.
    pub fn truncate_to(&mut self, start: usize, len: usize) -> bool {
        match start.checked_add(len) {
            Some(end) if end <= self.seq.len() => {
                self.seq.truncate(end);
                self.seq.drain(..start);
                if self.has_quality() {
                    self.qual.truncate(end);
                    self.qual.drain(..start);
                }
                true
            }
            _ => false,
        }
    }
}
