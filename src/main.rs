use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use barcode_extract::io::FastxSource;
use barcode_extract::{
    percent, FixedUmiExtractor, ReadPipeline, UmiConfig, UmiExtractor, WhitelistMatcher,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Barcode extractor - pulls whitelisted barcodes (and an optional UMI) out of reads"
)]
struct Args {
    /// Input file (FASTA or FASTQ, optionally gzipped)
    #[arg(short, long)]
    input: PathBuf,

    /// Barcode whitelist, one barcode per line
    #[arg(short, long)]
    whitelist: PathBuf,

    /// Output prefix; records go to <prefix>_barcode.txt
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum number of mismatches allowed when matching a barcode (<=3)
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=3))]
    mismatches: u32,

    /// Minimum mean Phred quality of a barcode call
    #[arg(short, long, default_value_t = 0.0)]
    quality: f64,

    /// 0-based offset of the UMI within each read
    #[arg(long, requires = "umi_length")]
    umi_position: Option<usize>,

    /// UMI length in base pairs
    #[arg(long, requires = "umi_position")]
    umi_length: Option<usize>,

    /// Gzip the output records
    #[arg(long, default_value_t = false)]
    gzip: bool,

    /// Verbose output (show elapsed time)
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn umi_extractor(&self) -> Option<Box<dyn UmiExtractor>> {
        match (self.umi_position, self.umi_length) {
            (Some(position), Some(length)) => Some(Box::new(FixedUmiExtractor::new(vec![
                UmiConfig::new(position, length),
            ]))),
            _ => None,
        }
    }
}

/// CLI entry point: parse args, build the pipeline, run it, and print a
/// tab-separated summary: file, total, barcodes, percent_barcodes, valid,
/// percent_valid, ambiguous.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let matcher = WhitelistMatcher::from_path(&args.whitelist, args.mismatches)
        .with_context(|| format!("Failed to load whitelist {}", args.whitelist.display()))?;
    let source = FastxSource::from_path(&args.input)?;

    let start = std::time::Instant::now();

    let mut pipeline = ReadPipeline::create(
        source,
        matcher,
        args.umi_extractor(),
        &args.output,
        args.quality,
        args.gzip,
    )?;
    pipeline.extract()?;
    let counters = pipeline.finish()?;

    let elapsed = start.elapsed();

    info!(
        "{} reads, {} with a barcode, {} passed quality, {} ambiguous",
        counters.total_reads,
        counters.total_barcodes,
        counters.total_valid_barcodes,
        counters.ambiguous_reads
    );

    let fname = args
        .input
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| args.input.to_string_lossy().to_string());

    println!(
        "{}\t{}\t{}\t{:.2}\t{}\t{:.2}\t{}",
        fname,
        counters.total_reads,
        counters.total_barcodes,
        percent(counters.total_barcodes, counters.total_reads),
        counters.total_valid_barcodes,
        percent(counters.total_valid_barcodes, counters.total_reads),
        counters.ambiguous_reads
    );

    if args.verbose {
        println!("Elapsed: {:.3}s", elapsed.as_secs_f64());
    }

    Ok(())
}
