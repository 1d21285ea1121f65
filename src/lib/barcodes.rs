//! Barcode catalog construction and matching primitives.
//!
//! A barcode table is a headerless tab-separated file with columns
//! `category`, `name`, `sequence`. Each category gets one [`CategoryMatcher`]
//! holding an exact dictionary (sequence -> name) and, when the category's
//! mismatch budget is non-zero, an ordered set of fuzzy patterns matched by
//! bounded edit distance. The catalog is built once at startup and shared
//! read-only across extractor workers.

use std::path::Path;

use ahash::AHashMap;
use fgoxide::io::Io;

use crate::errors::{ExtractError, Result};

/// Name of the synthetic spacer category. Spacers participate in layouts but
/// never in matching; their length is a configured constant.
pub const SPACER_CATEGORY: &str = "SPACER";

/// A single row of the barcode table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeEntry {
    /// Barcode category (e.g. "ODD", "EVEN", "DPM", "Y")
    pub category: String,
    /// Barcode name reported in output read names
    pub name: String,
    /// Nucleotide sequence of the barcode
    pub sequence: Vec<u8>,
}

/// Reads the tab-separated barcode table into entries, preserving row order.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a row does not have exactly
/// three tab-separated columns.
pub fn read_barcode_table<P: AsRef<Path>>(path: P) -> Result<Vec<BarcodeEntry>> {
    let path_ref = path.as_ref();
    let lines = Io::default().read_lines(&path_ref).map_err(|e| ExtractError::InvalidFileFormat {
        file_type: "barcode table".to_string(),
        path: path_ref.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut entries = Vec::with_capacity(lines.len());
    for (lineno, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 || fields.iter().any(|f| f.is_empty()) {
            return Err(ExtractError::InvalidFileFormat {
                file_type: "barcode table".to_string(),
                path: path_ref.display().to_string(),
                reason: format!(
                    "line {}: expected 3 tab-separated columns (category, name, sequence)",
                    lineno + 1
                ),
            });
        }
        entries.push(BarcodeEntry {
            category: fields[0].to_string(),
            name: fields[1].to_string(),
            sequence: fields[2].as_bytes().to_vec(),
        });
    }
    Ok(entries)
}

/// Parses a mismatch specification of the form `cat1:m1,cat2:m2,...` into a
/// category -> allowed-edits map.
///
/// # Errors
///
/// Returns a config error on a malformed pair or a non-numeric budget.
pub fn parse_mismatch_spec(spec: &str) -> Result<AHashMap<String, usize>> {
    let mut budgets = AHashMap::new();
    for pair in spec.split(',') {
        let (category, budget) = pair.split_once(':').ok_or_else(|| {
            ExtractError::config(
                "mismatches",
                format!("'{pair}' is not of the form category:count"),
            )
        })?;
        let budget: usize = budget.parse().map_err(|_| {
            ExtractError::config(
                "mismatches",
                format!("'{budget}' is not a valid mismatch count for category '{category}'"),
            )
        })?;
        budgets.insert(category.to_string(), budget);
    }
    Ok(budgets)
}

/// A barcode sequence compiled for bounded edit-distance matching.
#[derive(Debug, Clone)]
pub struct FuzzyPattern {
    sequence: Vec<u8>,
    name: String,
    max_edits: usize,
}

impl FuzzyPattern {
    /// Returns true if some prefix of `text` is within `max_edits` edits
    /// (substitutions, insertions, deletions) of the pattern sequence.
    #[must_use]
    pub fn matches_prefix(&self, text: &[u8]) -> bool {
        prefix_within_edits(&self.sequence, text, self.max_edits)
    }

    /// The barcode name this pattern reports on a match.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Anchored-prefix bounded edit distance.
///
/// Computes whether any prefix of `text` matches `pattern` within
/// `max_edits` unit-cost edits. The alignment is anchored at the start of
/// `text` with a free end, so trailing `text` bases cost nothing. Only the
/// first `pattern.len() + max_edits` bytes of `text` can participate.
fn prefix_within_edits(pattern: &[u8], text: &[u8], max_edits: usize) -> bool {
    if pattern.is_empty() {
        return true;
    }
    let window = &text[..text.len().min(pattern.len() + max_edits)];
    if window.len() + max_edits < pattern.len() {
        return false;
    }

    // One DP row per text prefix length; prev[i] holds the distance between
    // pattern[..i] and the previous text prefix.
    let mut prev: Vec<usize> = (0..=pattern.len()).collect();
    let mut curr = vec![0usize; pattern.len() + 1];

    if prev[pattern.len()] <= max_edits {
        return true;
    }
    for (j, &t) in window.iter().enumerate() {
        curr[0] = j + 1;
        for (i, &p) in pattern.iter().enumerate() {
            let sub = prev[i] + usize::from(p != t);
            let del = prev[i + 1] + 1;
            let ins = curr[i] + 1;
            curr[i + 1] = sub.min(del).min(ins);
        }
        if curr[pattern.len()] <= max_edits {
            return true;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    false
}

/// Matching structures for one barcode category.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    /// Shortest barcode sequence in this category
    pub min_len: usize,
    /// Longest barcode sequence in this category
    pub max_len: usize,
    /// Exact dictionary, sequence -> name
    exact: AHashMap<Vec<u8>, String>,
    /// Fuzzy patterns in table row order; empty when the budget is zero
    fuzzy: Vec<FuzzyPattern>,
}

impl CategoryMatcher {
    /// Exact dictionary lookup.
    #[must_use]
    pub fn exact_match(&self, sequence: &[u8]) -> Option<&str> {
        self.exact.get(sequence).map(String::as_str)
    }

    /// First fuzzy pattern matching a prefix of `text`, in table row order.
    /// With a zero mismatch budget this degrades to an exact prefix check.
    #[must_use]
    pub fn fuzzy_match(&self, text: &[u8]) -> Option<&str> {
        if self.fuzzy.is_empty() {
            return self
                .exact
                .iter()
                .find(|(seq, _)| text.starts_with(seq))
                .map(|(_, name)| name.as_str());
        }
        self.fuzzy.iter().find(|p| p.matches_prefix(text)).map(FuzzyPattern::name)
    }
}

/// All category matchers plus per-category length ranges, built once from the
/// barcode table and the mismatch specification.
#[derive(Debug, Clone)]
pub struct BarcodeCatalog {
    categories: AHashMap<String, CategoryMatcher>,
    spacer_len: usize,
}

impl BarcodeCatalog {
    /// Builds the catalog from table entries and per-category mismatch
    /// budgets.
    ///
    /// # Errors
    ///
    /// Returns a config error if a category appears in the mismatch
    /// specification but not in the table, or vice versa.
    pub fn build(
        entries: &[BarcodeEntry],
        budgets: &AHashMap<String, usize>,
        spacer_len: usize,
    ) -> Result<Self> {
        let mut grouped: AHashMap<String, Vec<&BarcodeEntry>> = AHashMap::new();
        for entry in entries {
            grouped.entry(entry.category.clone()).or_default().push(entry);
        }

        for category in budgets.keys() {
            if !grouped.contains_key(category) {
                return Err(ExtractError::config(
                    category.clone(),
                    "mismatch specification references a category with no barcodes in the table",
                ));
            }
        }
        for category in grouped.keys() {
            if !budgets.contains_key(category) {
                return Err(ExtractError::config(
                    category.clone(),
                    "barcode table category is missing from the mismatch specification",
                ));
            }
        }

        let mut categories = AHashMap::with_capacity(grouped.len());
        for (category, rows) in grouped {
            let budget = budgets[&category];
            let min_len =
                rows.iter().map(|e| e.sequence.len()).min().unwrap_or(0);
            let max_len =
                rows.iter().map(|e| e.sequence.len()).max().unwrap_or(0);

            let mut exact = AHashMap::with_capacity(rows.len());
            let mut fuzzy = Vec::new();
            for entry in &rows {
                exact.insert(entry.sequence.clone(), entry.name.clone());
            }
            if budget > 0 {
                fuzzy = rows
                    .iter()
                    .map(|entry| FuzzyPattern {
                        sequence: entry.sequence.clone(),
                        name: entry.name.clone(),
                        max_edits: budget,
                    })
                    .collect();
            }
            categories.insert(category, CategoryMatcher { min_len, max_len, exact, fuzzy });
        }

        Ok(Self { categories, spacer_len })
    }

    /// Loads the barcode table and builds the catalog in one step.
    ///
    /// # Errors
    ///
    /// Propagates table-reading, mismatch-parsing and consistency errors.
    pub fn from_table<P: AsRef<Path>>(
        table_path: P,
        mismatch_spec: &str,
        spacer_len: usize,
    ) -> Result<Self> {
        let entries = read_barcode_table(table_path)?;
        let budgets = parse_mismatch_spec(mismatch_spec)?;
        Self::build(&entries, &budgets, spacer_len)
    }

    /// The matcher for a category, if the category has table rows.
    #[must_use]
    pub fn matcher(&self, category: &str) -> Option<&CategoryMatcher> {
        self.categories.get(category)
    }

    /// (min, max) encoded length for a category. The synthetic spacer
    /// category reports the configured spacer length for both bounds.
    #[must_use]
    pub fn length_range(&self, category: &str) -> Option<(usize, usize)> {
        if category == SPACER_CATEGORY {
            return Some((self.spacer_len, self.spacer_len));
        }
        self.categories.get(category).map(|m| (m.min_len, m.max_len))
    }
}
