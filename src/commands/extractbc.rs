//! Extract barcode sequences from raw SPRITE-seq paired-end reads.
//!
//! This module implements the `extractbc` command which reads a pair of FASTQ
//! files, matches barcode categories along each read according to the
//! configured layouts, appends the matched barcode names to both read names,
//! and splits the pairs into valid and filtered output streams.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::commands::command::Command;
use crate::commands::common::{OutputOptions, ProcessingOptions};
use spritefridge_lib::barcodes::BarcodeCatalog;
use spritefridge_lib::fastq::PairedFastqReader;
use spritefridge_lib::layout::LayoutPlan;
use spritefridge_lib::logging::{OperationTimer, format_count};
use spritefridge_lib::pipeline::{MatchContext, Pipeline};
use spritefridge_lib::sink::{OutputPaths, OutputSink};
use spritefridge_lib::validation::validate_files_exist;

/// Extracts barcode sequences from raw SPRITE-seq reads and appends them to
/// the read names. By default only reads with a complete barcode set, as
/// defined by the given layouts, are written.
#[derive(Parser, Debug)]
#[command(
    name = "extractbc",
    author,
    version,
    about = "\x1b[38;5;30m[BARCODES]\x1b[0m \x1b[36mExtract barcode sequences from raw SPRITE-seq reads\x1b[0m",
    long_about = r#"
Extracts barcode sequences from raw SPRITE-seq paired-end reads and appends
them to the read names, separated from the original name by '['.

Barcodes are described by a tab-separated table with columns category, name,
and sequence, and by one layout string per read of the form
category1|category2|... naming the categories expected along the read in
order. Category names select the matching strategy:

  - names starting with 'S' are spacers and are skipped without matching,
  - the category 'Y' is matched by exact lookup over every length between the
    category's shortest and longest barcode,
  - names starting with 'D' are matched by a single exact lookup,
  - all other categories are matched with a bounded edit distance given by
    --mismatches, scanning up to --laxity extra bases for position drift.

Pairs in which every layout segment matched are written to
<output>_r1.fastq.gz (and <output>_r2.fastq.gz with --write-read2); the
remaining pairs are written to <output>_filtered_r1/..r2 when
--write-filtered is set. Match statistics go to <output>_stats.tsv.
"#
)]
pub(crate) struct ExtractBc {
    /// (gzipped) FASTQ file containing sequence data for read1
    #[arg(long = "read1")]
    pub read1: PathBuf,

    /// (gzipped) FASTQ file containing sequence data for read2
    #[arg(long = "read2")]
    pub read2: PathBuf,

    /// Tab-separated file with barcode category, name, and sequence columns
    #[arg(short = 'b', long = "barcodes")]
    pub barcodes: PathBuf,

    /// Barcode layout for read1 of the form category1|category2|...
    #[arg(long = "layout1")]
    pub layout1: String,

    /// Barcode layout for read2 of the form category1|category2|...
    #[arg(long = "layout2")]
    pub layout2: String,

    /// Length of the spacer sequences, if the layouts use spacers
    #[arg(long = "spacer-length", default_value_t = 6)]
    pub spacer_length: usize,

    /// Allowed mismatches per barcode category of the form
    /// category1:m1,category2:m2,...
    #[arg(short = 'm', long = "mismatches")]
    pub mismatches: String,

    /// Output stream selection.
    #[command(flatten)]
    pub output: OutputOptions,

    /// Worker budget and matching tolerances.
    #[command(flatten)]
    pub processing: ProcessingOptions,
}

impl ExtractBc {
    /// Validates inputs before any processing starts.
    fn validate(&self) -> Result<()> {
        validate_files_exist(&[
            (&self.read1, "Read1 FASTQ"),
            (&self.read2, "Read2 FASTQ"),
            (&self.barcodes, "Barcode table"),
        ])?;
        Ok(())
    }
}

impl Command for ExtractBc {
    fn execute(&self) -> Result<()> {
        self.validate()?;

        let timer = OperationTimer::new("Extracting barcodes");

        // All configuration errors surface here, before any thread spawns or
        // output file is touched.
        let catalog =
            BarcodeCatalog::from_table(&self.barcodes, &self.mismatches, self.spacer_length)?;
        let plan1 = LayoutPlan::parse(&self.layout1, &catalog)?;
        let plan2 = LayoutPlan::parse(&self.layout2, &catalog)?;

        let paths = OutputPaths::from_prefix(
            &self.output.output,
            self.output.write_filtered,
            self.output.write_read2,
        );
        let sink = OutputSink::create(&paths)?;
        let reader = PairedFastqReader::open(&self.read1, &self.read2)?;

        let context = MatchContext { catalog, plan1, plan2, laxity: self.processing.laxity };
        let pipeline = Pipeline::new(context, self.processing.processes);
        let stats = pipeline.run(reader, sink)?;

        info!(
            "{} valid and {} filtered read pairs",
            format_count(stats.valid()),
            format_count(stats.filtered())
        );
        timer.log_completion(stats.total());
        Ok(())
    }
}
