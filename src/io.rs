use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use needletail::errors::ParseErrorKind;
use needletail::{parse_fastx_file, FastxReader};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::sequence::Sequence;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One step of a read stream.
#[derive(Debug)]
pub enum ReadEvent {
    /// A parsed read and the 1-based line its record starts on.
    Record { read: Sequence, line: u64 },
    /// A record that could not be parsed; the stream continues after it.
    Malformed { line: u64 },
    /// No more records.
    Done,
}

/// A forward-only stream of reads.
///
/// `Done` is final: once returned, callers must not pull again.
pub trait ReadSource {
    fn next_read(&mut self) -> Result<ReadEvent>;
}

/// Line-oriented FASTQ reader that resynchronises after a bad record.
///
/// Every call consumes at least one line, so a broken record can never stall
/// the stream.
pub struct FastqRecords<R> {
    reader: R,
    line: u64,
}

impl<R: BufRead> FastqRecords<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: 0 }
    }

    /// Read the next line without its terminator. `None` at end of input.
    fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(Some(buf))
    }
}

impl<R: BufRead> ReadSource for FastqRecords<R> {
    fn next_read(&mut self) -> Result<ReadEvent> {
        let header = loop {
            match self.next_line()? {
                None => return Ok(ReadEvent::Done),
                Some(l) if l.is_empty() => continue,
                Some(l) => break l,
            }
        };
        let line = self.line;
        if header.first() != Some(&b'@') {
            return Ok(ReadEvent::Malformed { line });
        }

        let Some(seq) = self.next_line()? else {
            return Ok(ReadEvent::Malformed { line });
        };
        match self.next_line()? {
            Some(sep) if sep.first() == Some(&b'+') => {}
            _ => return Ok(ReadEvent::Malformed { line }),
        }
        let Some(qual) = self.next_line()? else {
            return Ok(ReadEvent::Malformed { line });
        };
        if qual.len() != seq.len() {
            return Ok(ReadEvent::Malformed { line });
        }

        Ok(ReadEvent::Record {
            read: Sequence::new(seq, Some(qual)),
            line,
        })
    }
}

enum Input {
    Empty,
    Fastq(FastqRecords<Box<dyn BufRead>>),
    Other(Box<dyn FastxReader>),
}

/// FASTA or FASTQ input, plain or gzip-compressed.
///
/// FASTQ (plain or gzip) is read record by record so a malformed record is
/// skipped and reading carries on. Everything else goes through needletail,
/// which stops at its first parse error; that error is returned rather than
/// treated as end of input.
pub struct FastxSource {
    input: Input,
}

impl FastxSource {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let mut raw = BufReader::new(file);
        let compressed = raw.fill_buf()?.starts_with(&GZIP_MAGIC);
        let mut reader: Box<dyn BufRead> = if compressed {
            Box::new(BufReader::new(MultiGzDecoder::new(raw)))
        } else {
            Box::new(raw)
        };

        let first = reader.fill_buf()?.first().copied();
        let input = match first {
            None => Input::Empty,
            Some(b'@') => Input::Fastq(FastqRecords::new(reader)),
            Some(_) => match parse_fastx_file(path) {
                Ok(r) => Input::Other(r),
                Err(e) if e.kind == ParseErrorKind::EmptyFile => Input::Empty,
                Err(e) => return Err(e).context("Failed to parse FASTX file"),
            },
        };
        Ok(Self { input })
    }
}

impl ReadSource for FastxSource {
    fn next_read(&mut self) -> Result<ReadEvent> {
        match &mut self.input {
            Input::Empty => Ok(ReadEvent::Done),
            Input::Fastq(records) => records.next_read(),
            Input::Other(reader) => match reader.next() {
                None => Ok(ReadEvent::Done),
                Some(Ok(rec)) => {
                    let read = Sequence::new(rec.seq().into_owned(), rec.qual().map(|q| q.to_vec()));
                    Ok(ReadEvent::Record {
                        read,
                        line: rec.start_line_number(),
                    })
                }
                Some(Err(e)) => Err(e).context("Failed to parse FASTX record"),
            },
        }
    }
}

/// Output path for a run: `<prefix>_barcode.txt`, with `.gz` appended when
/// compressing.
pub fn barcode_output_path(prefix: &Path, compress: bool) -> PathBuf {
    let mut name: OsString = prefix.as_os_str().to_owned();
    name.push("_barcode.txt");
    if compress {
        name.push(".gz");
    }
    PathBuf::from(name)
}

/// Create a buffered writer for `path`, gzip-wrapped if the path ends in
/// `.gz`.
pub fn create_writer(path: &Path) -> Result<Box<dyn Write>, std::io::Error> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    if path.extension().map_or(false, |e| e == "gz") {
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    } else {
        Ok(Box::new(writer))
    }
}

/// Append-only sink of `sequence,field` lines.
pub struct BarcodeWriter {
    inner: Box<dyn Write>,
}

impl BarcodeWriter {
    pub fn new(inner: Box<dyn Write>) -> Self {
        Self { inner }
    }

    pub fn create(path: &Path) -> Result<Self, std::io::Error> {
        Ok(Self::new(create_writer(path)?))
    }

    /// Write `seq,field\n`.
    pub fn write_record(&mut self, seq: &[u8], field: &[u8]) -> Result<()> {
        self.inner.write_all(seq)?;
        self.inner.write_all(b",")?;
        self.inner.write_all(field)?;
        self.inner.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().context("Failed to flush barcode output")
    }
}
