//! Common CLI options shared across commands.
//!
//! Shared argument structures composed into command structs with
//! `#[command(flatten)]`.

use std::path::PathBuf;

use clap::Args;

/// Options controlling the worker budget and matching tolerances.
#[derive(Debug, Clone, Args)]
pub struct ProcessingOptions {
    /// Number of bases to read into the current part of the read when
    /// matching fuzzy barcode categories
    #[arg(long = "laxity", default_value_t = 6)]
    pub laxity: usize,

    /// Total worker budget; p = 1 runs single-threaded, otherwise one reader,
    /// max(p - 2, 1) extractor threads, and one writer run concurrently
    #[arg(short = 'p', long = "processes", default_value_t = 1)]
    pub processes: usize,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self { laxity: 6, processes: 1 }
    }
}

/// Options selecting which output streams are written.
#[derive(Debug, Clone, Args)]
pub struct OutputOptions {
    /// Prefix for all output files
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Also write reads with an incomplete barcode set to separate files
    #[arg(long = "write-filtered", default_value_t = false)]
    pub write_filtered: bool,

    /// Also write the read2 output, which is usually only needed for barcode
    /// extraction itself
    #[arg(long = "write-read2", default_value_t = false)]
    pub write_read2: bool,
}
