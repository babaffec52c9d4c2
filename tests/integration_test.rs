use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use barcode_extract::io::FastxSource;
use barcode_extract::{
    ConfigError, FixedUmiExtractor, ReadCounters, ReadPipeline, UmiConfig, UmiExtractor,
    WhitelistMatcher,
};

// Barcodes GGCCAT / TTAGCA; UMI at offset 8, length 4.
//   r1: barcode before the UMI, forward          -> GGCCAT,ACGT
//   r2: barcode after the UMI, reverse strand    -> TTAGCA,GGGG (UMI CCCC flipped)
//   r3: barcode on both sides                    -> ambiguous
//   r4: no barcode
//   r5: barcode before the UMI but low quality   -> counted, not written
const FASTQ: &str = "\
@r1
AAGGCCATACGTTTTTTTTT
+
IIIIIIIIIIIIIIIIIIII
@r2
AAAAAAAACCCCTGCTAAAA
+
IIIIIIIIIIIIIIIIIIII
@r3
GGCCATAAACGTTTAGCATT
+
IIIIIIIIIIIIIIIIIIII
@r4
AAAAAAAAACGTAAAAAAAA
+
IIIIIIIIIIIIIIIIIIII
@r5
AAGGCCATACGTTTTTTTTT
+
####################
";

fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let reads = dir.join("reads.fastq");
    let whitelist = dir.join("whitelist.txt");
    fs::write(&reads, FASTQ).expect("write reads");
    fs::write(&whitelist, "# barcodes\nGGCCAT\nttagca\n\n").expect("write whitelist");
    (reads, whitelist)
}

fn umi() -> Option<Box<dyn UmiExtractor>> {
    Some(Box::new(FixedUmiExtractor::new(vec![UmiConfig::new(8, 4)])))
}

fn run_once(reads: &Path, whitelist: &Path, prefix: &Path) -> ReadCounters {
    let source = FastxSource::from_path(reads).expect("open reads");
    let matcher = WhitelistMatcher::from_path(whitelist, 0).expect("load whitelist");
    let mut pipeline =
        ReadPipeline::create(source, matcher, umi(), prefix, 20.0, false).expect("pipeline");
    pipeline.extract().expect("extraction failed");
    pipeline.finish().expect("flush failed")
}

#[test]
fn test_umi_pipeline_on_fastq() {
    let tmp = tempdir().unwrap();
    let (reads, whitelist) = write_inputs(tmp.path());
    let prefix = tmp.path().join("run");

    let counters = run_once(&reads, &whitelist, &prefix);
    assert_eq!(
        counters,
        ReadCounters {
            total_reads: 5,
            total_barcodes: 3,
            total_valid_barcodes: 2,
            ambiguous_reads: 1,
        }
    );

    let out = fs::read_to_string(tmp.path().join("run_barcode.txt")).unwrap();
    assert_eq!(out, "GGCCAT,ACGT\nTTAGCA,GGGG\n");
}

#[test]
fn test_rerun_is_identical() {
    let tmp = tempdir().unwrap();
    let (reads, whitelist) = write_inputs(tmp.path());

    let first = run_once(&reads, &whitelist, &tmp.path().join("a"));
    let second = run_once(&reads, &whitelist, &tmp.path().join("b"));
    assert_eq!(first, second);
    assert_eq!(
        fs::read(tmp.path().join("a_barcode.txt")).unwrap(),
        fs::read(tmp.path().join("b_barcode.txt")).unwrap()
    );
}

#[test]
fn test_bad_umi_config_creates_no_output() {
    let tmp = tempdir().unwrap();
    let (reads, whitelist) = write_inputs(tmp.path());
    let prefix = tmp.path().join("bad");

    let source = FastxSource::from_path(&reads).unwrap();
    let matcher = WhitelistMatcher::from_path(&whitelist, 0).unwrap();
    let umi: Box<dyn UmiExtractor> = Box::new(FixedUmiExtractor::new(vec![
        UmiConfig::new(0, 4),
        UmiConfig::new(8, 4),
    ]));
    let res = ReadPipeline::create(source, matcher, Some(umi), &prefix, 0.0, false);
    assert!(matches!(res, Err(ConfigError::InvalidConfiguration(_))));
    assert!(!tmp.path().join("bad_barcode.txt").exists());
}

#[test]
fn test_malformed_record_does_not_end_the_run() {
    let tmp = tempdir().unwrap();
    let reads = tmp.path().join("broken.fastq");
    let whitelist = tmp.path().join("whitelist.txt");
    fs::write(
        &reads,
        "@r1\nGGCCATAA\n+\nIIIIIIII\n\
         @r2\nGGCCATA\n+\nIII\n\
         @r3\nAAGGCCAT\n+\nIIIIIIII\n\
         @r4\nTTGGCCAT\n+\nIIIIIIII\n",
    )
    .unwrap();
    fs::write(&whitelist, "GGCCAT\n").unwrap();
    let prefix = tmp.path().join("broken");

    let source = FastxSource::from_path(&reads).unwrap();
    let matcher = WhitelistMatcher::from_path(&whitelist, 0).unwrap();
    let mut pipeline = ReadPipeline::create(source, matcher, None, &prefix, 0.0, false).unwrap();
    pipeline.extract().unwrap();
    let counters = pipeline.finish().unwrap();

    assert_eq!(counters.total_reads, 3);
    assert_eq!(counters.total_barcodes, 3);
    assert_eq!(counters.total_valid_barcodes, 3);
    let out = fs::read_to_string(tmp.path().join("broken_barcode.txt")).unwrap();
    assert_eq!(out, "GGCCAT,1\nGGCCAT,9\nGGCCAT,13\n");
}

#[test]
fn test_main_cli_writes_outputs_and_prints_summary() -> Result<(), Box<dyn std::error::Error>> {
    use assert_cmd::assert::OutputAssertExt;
    use assert_cmd::cargo;
    use predicates::prelude::*;
    use std::process::Command;

    let tmp = tempdir()?;
    let (reads, whitelist) = write_inputs(tmp.path());
    let out_prefix = tmp.path().join("cli");

    let mut cmd = Command::new(cargo::cargo_bin!(env!("CARGO_PKG_NAME")));
    cmd.arg("-i")
        .arg(&reads)
        .arg("-w")
        .arg(&whitelist)
        .arg("-o")
        .arg(&out_prefix)
        .arg("-q")
        .arg("20")
        .arg("--umi-position")
        .arg("8")
        .arg("--umi-length")
        .arg("4");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("reads.fastq\t5\t3\t60.00\t2\t40.00\t1"))
        .stderr(predicate::str::contains("has at least two barcodes"));

    let out = fs::read_to_string(tmp.path().join("cli_barcode.txt"))?;
    assert_eq!(out, "GGCCAT,ACGT\nTTAGCA,GGGG\n");

    Ok(())
}

#[test]
fn test_main_cli_without_umi_reports_line_numbers() -> Result<(), Box<dyn std::error::Error>> {
    use assert_cmd::assert::OutputAssertExt;
    use assert_cmd::cargo;
    use std::process::Command;

    let tmp = tempdir()?;
    let (reads, whitelist) = write_inputs(tmp.path());
    let out_prefix = tmp.path().join("plain");

    let mut cmd = Command::new(cargo::cargo_bin!(env!("CARGO_PKG_NAME")));
    cmd.arg("-i")
        .arg(&reads)
        .arg("-w")
        .arg(&whitelist)
        .arg("-o")
        .arg(&out_prefix);
    cmd.assert().success();

    let out = fs::read_to_string(tmp.path().join("plain_barcode.txt"))?;
    let lines: Vec<&str> = out.lines().collect();
    // r1, r2, r3 and r5 carry a barcode; r4 does not
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("GGCCAT,"));
    assert!(lines[1].starts_with("TTAGCA,"));
    assert!(lines.iter().all(|l| l.split(',').nth(1).unwrap().parse::<u64>().is_ok()));

    Ok(())
}
