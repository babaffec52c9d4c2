pub mod error;
pub mod io;
pub mod matcher;
pub mod processing;
pub mod quality;
pub mod sequence;
pub mod umi;

pub use error::ConfigError;
pub use matcher::{BarcodeMatcher, ExtractionResult, WhitelistMatcher};
pub use processing::{ReadCounters, ReadPipeline};
pub use sequence::Sequence;
pub use umi::{FixedUmiExtractor, UmiConfig, UmiExtractor};

/// Percentage of `part` in `total`, 0 when there is nothing to divide by.
pub fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
