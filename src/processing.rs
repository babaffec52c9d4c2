use anyhow::Result;
use log::{debug, warn};
use std::path::Path;

use crate::error::ConfigError;
use crate::io::{barcode_output_path, BarcodeWriter, ReadEvent, ReadSource};
use crate::matcher::{BarcodeMatcher, ExtractionResult};
use crate::quality::passes_quality;
use crate::sequence::{reverse_complement_in_place, Sequence};
use crate::umi::UmiExtractor;

/// Run-level tallies. Owned by one pipeline; only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCounters {
    /// Every successfully parsed read.
    pub total_reads: u64,
    /// Reads with an unambiguous barcode match, whatever their quality.
    pub total_barcodes: u64,
    /// Barcode reads that also passed the quality gate and were written.
    pub total_valid_barcodes: u64,
    /// Reads rejected for carrying a barcode on both sides of the UMI.
    pub ambiguous_reads: u64,
}

/// The UMI extractor plus the read split it implies, fixed at construction.
struct UmiSplit {
    extractor: Box<dyn UmiExtractor>,
    first_part_end: usize,
    second_part_start: usize,
}

/// Pulls reads from a source, finds their barcode (and UMI), and writes
/// `sequence,umi` or `sequence,line` records for calls that pass the
/// quality threshold.
pub struct ReadPipeline<S, M> {
    source: S,
    matcher: M,
    umi: Option<UmiSplit>,
    writer: BarcodeWriter,
    quality_threshold: f64,
    counters: ReadCounters,
}

impl<S: ReadSource, M: BarcodeMatcher> ReadPipeline<S, M> {
    /// Fails with [`ConfigError::InvalidConfiguration`] unless the UMI
    /// extractor, when given, has exactly one UMI region.
    pub fn new(
        source: S,
        matcher: M,
        umi: Option<Box<dyn UmiExtractor>>,
        writer: BarcodeWriter,
        quality_threshold: f64,
    ) -> Result<Self, ConfigError> {
        let umi = umi.map(split_for).transpose()?;
        Ok(Self::from_parts(source, matcher, umi, writer, quality_threshold))
    }

    /// Like [`ReadPipeline::new`], writing to `<output_prefix>_barcode.txt`
    /// (`.gz` when `compress`). The configuration is checked before the file
    /// is created.
    pub fn create(
        source: S,
        matcher: M,
        umi: Option<Box<dyn UmiExtractor>>,
        output_prefix: &Path,
        quality_threshold: f64,
        compress: bool,
    ) -> Result<Self, ConfigError> {
        let umi = umi.map(split_for).transpose()?;
        let writer = BarcodeWriter::create(&barcode_output_path(output_prefix, compress))?;
        Ok(Self::from_parts(source, matcher, umi, writer, quality_threshold))
    }

    fn from_parts(
        source: S,
        matcher: M,
        umi: Option<UmiSplit>,
        writer: BarcodeWriter,
        quality_threshold: f64,
    ) -> Self {
        Self {
            source,
            matcher,
            umi,
            writer,
            quality_threshold,
            counters: ReadCounters::default(),
        }
    }

    pub fn counters(&self) -> ReadCounters {
        self.counters
    }

    /// Process every remaining read in the source.
    ///
    /// Only source and output I/O errors are returned; anything wrong with
    /// an individual read just skips that read.
    pub fn extract(&mut self) -> Result<()> {
        loop {
            match self.source.next_read()? {
                ReadEvent::Done => break,
                ReadEvent::Malformed { line } => {
                    debug!("Skipping malformed record at line {line}");
                }
                ReadEvent::Record { read, line } => {
                    self.counters.total_reads += 1;
                    let call = match &self.umi {
                        Some(split) => call_with_umi(&self.matcher, split, read, line),
                        None => call_barcode_only(&self.matcher, read),
                    };
                    match call {
                        ReadCall::Barcode { region, umi } => {
                            self.log_and_count(&region, line, &umi)?
                        }
                        ReadCall::Ambiguous => self.counters.ambiguous_reads += 1,
                        ReadCall::Dropped => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Flush the output and hand back the final counters.
    pub fn finish(mut self) -> Result<ReadCounters> {
        self.writer.flush()?;
        Ok(self.counters)
    }

    /// Count a barcode call and write it out if it passes the quality gate.
    fn log_and_count(&mut self, region: &Sequence, line: u64, umi: &[u8]) -> Result<()> {
        self.counters.total_barcodes += 1;
        if !passes_quality(region.quality(), self.quality_threshold) {
            return Ok(());
        }
        if umi.is_empty() {
            self.writer
                .write_record(region.forward_seq(), line.to_string().as_bytes())?;
        } else {
            self.writer.write_record(region.forward_seq(), umi)?;
        }
        self.counters.total_valid_barcodes += 1;
        Ok(())
    }
}

/// What became of one read before the quality gate.
enum ReadCall {
    /// An unambiguous barcode region and the UMI to report with it.
    Barcode { region: Sequence, umi: Vec<u8> },
    /// Barcodes on both sides of the UMI.
    Ambiguous,
    /// No barcode, or the read could not be processed.
    Dropped,
}

fn call_barcode_only<M: BarcodeMatcher>(matcher: &M, mut read: Sequence) -> ReadCall {
    if matcher.extract(&mut read).is_match() {
        ReadCall::Barcode {
            region: read,
            umi: Vec::new(),
        }
    } else {
        ReadCall::Dropped
    }
}

fn call_with_umi<M: BarcodeMatcher>(
    matcher: &M,
    split: &UmiSplit,
    read: Sequence,
    line: u64,
) -> ReadCall {
    if read.len() < split.second_part_start {
        warn!(
            "read at line {line} is {} bases, shorter than the UMI end at {}; skipping",
            read.len(),
            split.second_part_start
        );
        return ReadCall::Dropped;
    }
    let Some(mut umi) = split.extractor.extract_umi(&read) else {
        warn!("could not recover a UMI from read at line {line}; skipping");
        return ReadCall::Dropped;
    };
    let (Some(mut previous), Some(mut after)) = (
        read.sub_read(0, split.first_part_end),
        read.sub_read(
            split.second_part_start,
            read.len() - split.second_part_start,
        ),
    ) else {
        warn!("read at line {line} cannot be split around the UMI; skipping");
        return ReadCall::Dropped;
    };

    let result_previous = matcher.extract(&mut previous);
    let result_after = matcher.extract(&mut after);

    let (region, result) = match (result_previous, result_after) {
        (ExtractionResult::NoMatch, ExtractionResult::NoMatch) => return ReadCall::Dropped,
        (ExtractionResult::NoMatch, result) => (after, result),
        (result, ExtractionResult::NoMatch) => (previous, result),
        _ => {
            warn!(
                "read: {} at line {line} has at least two barcodes",
                String::from_utf8_lossy(read.forward_seq())
            );
            warn!("This read will be skipped!");
            return ReadCall::Ambiguous;
        }
    };

    if result == ExtractionResult::ReverseComplementMatch {
        reverse_complement_in_place(&mut umi);
    }
    ReadCall::Barcode { region, umi }
}

fn split_for(extractor: Box<dyn UmiExtractor>) -> Result<UmiSplit, ConfigError> {
    let (first_part_end, second_part_start) = match extractor.umi_configs() {
        [cfg] => match cfg.end() {
            Some(end) => (cfg.position(), end),
            None => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "UMI at {} with length {} ends past any possible read",
                    cfg.position(),
                    cfg.length()
                )))
            }
        },
        configs => {
            return Err(ConfigError::InvalidConfiguration(format!(
                "exactly one UMI region is supported, got {}",
                configs.len()
            )))
        }
    };
    Ok(UmiSplit {
        extractor,
        first_part_end,
        second_part_start,
    })
}
