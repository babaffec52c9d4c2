/// ASCII offset of Phred scores in FASTQ quality strings.
pub const PHRED_OFFSET: u8 = 33;

/// Check that the mean Phred score of `qual` reaches `threshold`.
///
/// An empty quality string (FASTA input) always passes since there is
/// nothing to judge the call by.
pub fn passes_quality(qual: &[u8], threshold: f64) -> bool {
    if qual.is_empty() {
        return true;
    }
    let total: u64 = qual
        .iter()
        .map(|&q| u64::from(q.saturating_sub(PHRED_OFFSET)))
        .sum();
    total as f64 / qual.len() as f64 >= threshold
}
