//! Paired FASTQ reading.
//!
//! Reads are consumed as raw four-line records rather than through a parsing
//! FASTQ library: the separator line is carried through to the output verbatim
//! and an incomplete record at the end of either file ends the paired stream
//! silently instead of failing. Gzipped inputs are detected by file extension
//! and decompressed transparently.

use std::io::BufRead;
use std::path::Path;

use fgoxide::io::Io;

use crate::errors::{ExtractError, Result};

/// One FASTQ record, kept as the four raw lines without trailing newlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    /// Name line including the leading `@`, truncated at the first whitespace
    pub name: Vec<u8>,
    /// Base sequence
    pub sequence: Vec<u8>,
    /// Separator line (usually `+`), preserved as read
    pub separator: Vec<u8>,
    /// Quality string
    pub quality: Vec<u8>,
}

impl ReadRecord {
    /// Serialized size of this record in bytes, newlines included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.name.len() + self.sequence.len() + self.separator.len() + self.quality.len() + 4
    }

    /// Writes the four lines of this record to `out`.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> std::io::Result<()> {
        use std::io::Write;
        out.write_all(&self.name)?;
        out.push(b'\n');
        out.write_all(&self.sequence)?;
        out.push(b'\n');
        out.write_all(&self.separator)?;
        out.push(b'\n');
        out.write_all(&self.quality)?;
        out.push(b'\n');
        Ok(())
    }
}

/// A mate pair read in lockstep from the two input files, plus the barcodes
/// extracted for it (empty until the extraction stage fills it in).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPair {
    pub r1: ReadRecord,
    pub r2: ReadRecord,
    /// One entry per non-spacer layout segment across both mates
    pub barcodes: Vec<String>,
}

/// Synchronized reader over two FASTQ files.
///
/// Iteration yields pairs until either file runs out of complete records. A
/// record with any missing or empty line is treated as truncation and ends the
/// stream; it is not an error.
pub struct PairedFastqReader {
    r1: Box<dyn BufRead + Send>,
    r2: Box<dyn BufRead + Send>,
}

impl PairedFastqReader {
    /// Opens both mate files, decompressing `.gz` inputs transparently.
    ///
    /// # Errors
    ///
    /// Returns an error when either file cannot be opened.
    pub fn open<P: AsRef<Path>>(path1: P, path2: P) -> Result<Self> {
        let fgio = Io::default();
        let open = |path: &Path| {
            fgio.new_reader(path).map_err(|e| ExtractError::InvalidFileFormat {
                file_type: "FASTQ".to_string(),
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        };
        Ok(Self { r1: open(path1.as_ref())?, r2: open(path2.as_ref())? })
    }

    /// Builds a reader from already-open sources.
    #[must_use]
    pub fn from_readers(r1: Box<dyn BufRead + Send>, r2: Box<dyn BufRead + Send>) -> Self {
        Self { r1, r2 }
    }

    /// Reads one line without its trailing newline, or `None` at end of file
    /// or on a blank line.
    fn next_field(reader: &mut dyn BufRead) -> std::io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        while line.last() == Some(&b'\n') || line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Reads one complete record, or `None` when the file is exhausted or the
    /// trailing record is incomplete.
    fn next_record(reader: &mut dyn BufRead) -> std::io::Result<Option<ReadRecord>> {
        let Some(mut name) = Self::next_field(reader)? else {
            return Ok(None);
        };
        let Some(sequence) = Self::next_field(reader)? else {
            return Ok(None);
        };
        let Some(separator) = Self::next_field(reader)? else {
            return Ok(None);
        };
        let Some(quality) = Self::next_field(reader)? else {
            return Ok(None);
        };
        // Keep only the name proper; the comment after the first whitespace
        // would collide with the barcode annotation appended downstream.
        if let Some(pos) = name.iter().position(u8::is_ascii_whitespace) {
            name.truncate(pos);
        }
        Ok(Some(ReadRecord { name, sequence, separator, quality }))
    }
}

impl Iterator for PairedFastqReader {
    type Item = std::io::Result<ReadPair>;

    fn next(&mut self) -> Option<Self::Item> {
        let r1 = match Self::next_record(&mut self.r1) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };
        let r2 = match Self::next_record(&mut self.r2) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(ReadPair { r1, r2, barcodes: Vec::new() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_fastq(dir: &TempDir, name: &str, records: &[(&str, &str, &str)]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        for (name, seq, qual) in records {
            writeln!(file, "@{name}").unwrap();
            writeln!(file, "{seq}").unwrap();
            writeln!(file, "+").unwrap();
            writeln!(file, "{qual}").unwrap();
        }
        path
    }

    fn write_fastq_gz(dir: &TempDir, name: &str, records: &[(&str, &str, &str)]) -> PathBuf {
        let path = dir.path().join(name);
        let mut gz = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        for (name, seq, qual) in records {
            writeln!(gz, "@{name}").unwrap();
            writeln!(gz, "{seq}").unwrap();
            writeln!(gz, "+").unwrap();
            writeln!(gz, "{qual}").unwrap();
        }
        gz.finish().unwrap();
        path
    }

    #[test]
    fn test_reads_pairs_in_lockstep() {
        let tmp = TempDir::new().unwrap();
        let r1 = write_fastq(&tmp, "r1.fastq", &[("q1", "ACGT", "IIII"), ("q2", "GGGG", "!!!!")]);
        let r2 = write_fastq(&tmp, "r2.fastq", &[("q1", "TTTT", "IIII"), ("q2", "CCCC", "!!!!")]);
        let pairs: Vec<ReadPair> =
            PairedFastqReader::open(&r1, &r2).unwrap().map(|p| p.unwrap()).collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].r1.name, b"@q1");
        assert_eq!(pairs[0].r1.sequence, b"ACGT");
        assert_eq!(pairs[0].r1.separator, b"+");
        assert_eq!(pairs[0].r2.sequence, b"TTTT");
        assert_eq!(pairs[1].r1.name, b"@q2");
        assert!(pairs[1].barcodes.is_empty());
    }

    #[test]
    fn test_gzip_input_is_transparent() {
        let tmp = TempDir::new().unwrap();
        let r1 = write_fastq_gz(&tmp, "r1.fastq.gz", &[("q1", "ACGT", "IIII")]);
        let r2 = write_fastq_gz(&tmp, "r2.fastq.gz", &[("q1", "TTTT", "IIII")]);
        let pairs: Vec<ReadPair> =
            PairedFastqReader::open(&r1, &r2).unwrap().map(|p| p.unwrap()).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].r1.sequence, b"ACGT");
        assert_eq!(pairs[0].r2.sequence, b"TTTT");
    }

    #[test]
    fn test_name_truncated_at_first_whitespace() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r1.fastq");
        std::fs::write(&path, "@q1 1:N:0:ACGT\nACGT\n+\nIIII\n").unwrap();
        let r2 = write_fastq(&tmp, "r2.fastq", &[("q1", "TTTT", "IIII")]);
        let pairs: Vec<ReadPair> =
            PairedFastqReader::open(&path, &r2).unwrap().map(|p| p.unwrap()).collect();
        assert_eq!(pairs[0].r1.name, b"@q1");
    }

    #[test]
    fn test_truncated_record_ends_stream() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r1.fastq");
        // Second record is missing its quality line.
        std::fs::write(&path, "@q1\nACGT\n+\nIIII\n@q2\nGGGG\n+\n").unwrap();
        let r2 = write_fastq(&tmp, "r2.fastq", &[("q1", "TTTT", "IIII"), ("q2", "CCCC", "!!!!")]);
        let pairs: Vec<ReadPair> =
            PairedFastqReader::open(&path, &r2).unwrap().map(|p| p.unwrap()).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].r1.name, b"@q1");
    }

    #[test]
    fn test_shorter_mate_file_ends_stream() {
        let tmp = TempDir::new().unwrap();
        let r1 = write_fastq(&tmp, "r1.fastq", &[("q1", "ACGT", "IIII"), ("q2", "GGGG", "!!!!")]);
        let r2 = write_fastq(&tmp, "r2.fastq", &[("q1", "TTTT", "IIII")]);
        let pairs: Vec<ReadPair> =
            PairedFastqReader::open(&r1, &r2).unwrap().map(|p| p.unwrap()).collect();
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_crlf_line_endings_are_trimmed() {
        let r1 = std::io::Cursor::new(b"@q1\r\nACGT\r\n+\r\nIIII\r\n".to_vec());
        let r2 = std::io::Cursor::new(b"@q1\nTTTT\n+\nIIII\n".to_vec());
        let pairs: Vec<ReadPair> = PairedFastqReader::from_readers(Box::new(r1), Box::new(r2))
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(pairs[0].r1.sequence, b"ACGT");
        assert_eq!(pairs[0].r1.quality, b"IIII");
    }

    #[test]
    fn test_record_encode_round_trip() {
        let record = ReadRecord {
            name: b"@q1".to_vec(),
            sequence: b"ACGT".to_vec(),
            separator: b"+".to_vec(),
            quality: b"IIII".to_vec(),
        };
        let mut out = Vec::new();
        record.encode(&mut out).unwrap();
        assert_eq!(out, b"@q1\nACGT\n+\nIIII\n");
        assert_eq!(out.len(), record.encoded_len());
    }
}
