//! Output sink: classification, compression, file appends, and statistics.
//!
//! The sink owns every destination handle. Files are created in truncate mode
//! once, up front, and only appended to afterwards, so each compressed block
//! lands contiguously. Every record is compressed as its own gzip member;
//! concatenated members form a valid gzip stream that standard decompressors
//! read transparently.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::errors::Result;
use crate::fastq::{ReadPair, ReadRecord};

/// Separator between the original read name and the appended barcode list.
pub const BARCODE_SEPARATOR: u8 = b'[';

/// Destination files derived from the output prefix. Optional outputs are
/// `None` when their flag is unset and are never created on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub valid_r1: PathBuf,
    pub valid_r2: Option<PathBuf>,
    pub filtered_r1: Option<PathBuf>,
    pub filtered_r2: Option<PathBuf>,
    pub stats: PathBuf,
}

impl OutputPaths {
    /// Derives the full set of destination paths from an output prefix.
    #[must_use]
    pub fn from_prefix(prefix: &Path, write_filtered: bool, write_read2: bool) -> Self {
        let base = prefix.display();
        Self {
            valid_r1: PathBuf::from(format!("{base}_r1.fastq.gz")),
            valid_r2: write_read2.then(|| PathBuf::from(format!("{base}_r2.fastq.gz"))),
            filtered_r1: write_filtered
                .then(|| PathBuf::from(format!("{base}_filtered_r1.fastq.gz"))),
            filtered_r2: (write_filtered && write_read2)
                .then(|| PathBuf::from(format!("{base}_filtered_r2.fastq.gz"))),
            stats: PathBuf::from(format!("{base}_stats.tsv")),
        }
    }
}

/// Running match statistics over all processed pairs.
///
/// The bucket vector counts pairs by how many of the N non-spacer segments
/// matched; it is sized lazily on the first recorded pair because N is not
/// known before then.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchStats {
    valid: u64,
    filtered: u64,
    buckets: Vec<u64>,
}

impl MatchStats {
    /// Records one pair with `matched` of `total` segments matched.
    pub fn record(&mut self, matched: usize, total: usize) {
        if self.buckets.is_empty() {
            self.buckets = vec![0; total + 1];
        }
        if matched == total {
            self.valid += 1;
        } else {
            self.filtered += 1;
        }
        self.buckets[matched] += 1;
    }

    /// Pairs with a full barcode set.
    #[must_use]
    pub fn valid(&self) -> u64 {
        self.valid
    }

    /// Pairs with at least one unmatched segment.
    #[must_use]
    pub fn filtered(&self) -> u64 {
        self.filtered
    }

    /// Total pairs recorded.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.valid + self.filtered
    }

    /// Count buckets indexed by number of matched segments.
    #[must_use]
    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Writes the stats table: one `<key>_barcodes\t<count>` line per key,
    /// `valid` and `filtered` first, then the 0..=N buckets. A run that
    /// processed no pairs writes an empty file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created or written.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        if !self.buckets.is_empty() {
            writeln!(out, "valid_barcodes\t{}", self.valid)?;
            writeln!(out, "filtered_barcodes\t{}", self.filtered)?;
            for (k, count) in self.buckets.iter().enumerate() {
                writeln!(out, "{k}_barcodes\t{count}")?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

/// Writer-owned sink for annotated read pairs.
pub struct OutputSink {
    valid_r1: BufWriter<File>,
    valid_r2: Option<BufWriter<File>>,
    filtered_r1: Option<BufWriter<File>>,
    filtered_r2: Option<BufWriter<File>>,
    stats_path: PathBuf,
    stats: MatchStats,
}

impl OutputSink {
    /// Creates (truncating) every configured destination file.
    ///
    /// # Errors
    ///
    /// Returns an error when any destination cannot be created.
    pub fn create(paths: &OutputPaths) -> Result<Self> {
        let open = |p: &PathBuf| -> Result<BufWriter<File>> {
            Ok(BufWriter::new(File::create(p)?))
        };
        Ok(Self {
            valid_r1: open(&paths.valid_r1)?,
            valid_r2: paths.valid_r2.as_ref().map(&open).transpose()?,
            filtered_r1: paths.filtered_r1.as_ref().map(&open).transpose()?,
            filtered_r2: paths.filtered_r2.as_ref().map(&open).transpose()?,
            stats_path: paths.stats.clone(),
            stats: MatchStats::default(),
        })
    }

    /// Classifies, annotates, compresses, and appends one pair, updating the
    /// running statistics.
    ///
    /// # Errors
    ///
    /// Returns an error on any write failure.
    pub fn write_pair(&mut self, mut pair: ReadPair) -> Result<()> {
        let total = pair.barcodes.len();
        let matched = pair.barcodes.iter().filter(|b| !b.is_empty()).count();
        self.stats.record(matched, total);

        // Both mates carry the same annotation so the pairing survives
        // alignment and downstream name-based grouping.
        let mut tag = Vec::with_capacity(1 + pair.barcodes.iter().map(|b| b.len() + 1).sum::<usize>());
        tag.push(BARCODE_SEPARATOR);
        tag.extend_from_slice(pair.barcodes.join("|").as_bytes());
        pair.r1.name.extend_from_slice(&tag);
        pair.r2.name.extend_from_slice(&tag);

        if matched == total {
            Self::append(Some(&mut self.valid_r1), &pair.r1)?;
            Self::append(self.valid_r2.as_mut(), &pair.r2)?;
        } else {
            Self::append(self.filtered_r1.as_mut(), &pair.r1)?;
            Self::append(self.filtered_r2.as_mut(), &pair.r2)?;
        }
        Ok(())
    }

    /// Compresses `record` as a standalone gzip member and appends it, if the
    /// destination is configured.
    fn append(writer: Option<&mut BufWriter<File>>, record: &ReadRecord) -> Result<()> {
        let Some(writer) = writer else {
            return Ok(());
        };
        let mut raw = Vec::with_capacity(record.encoded_len());
        record.encode(&mut raw)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        writer.write_all(&encoder.finish()?)?;
        Ok(())
    }

    /// Current statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> &MatchStats {
        &self.stats
    }

    /// Flushes all outputs and writes the stats file.
    ///
    /// # Errors
    ///
    /// Returns an error on flush or stats-write failure.
    pub fn finish(mut self) -> Result<MatchStats> {
        self.valid_r1.flush()?;
        for writer in [&mut self.valid_r2, &mut self.filtered_r1, &mut self.filtered_r2]
            .into_iter()
            .flatten()
        {
            writer.flush()?;
        }
        self.stats.write(&self.stats_path)?;
        Ok(self.stats)
    }
}
