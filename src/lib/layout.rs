//! Read layout parsing.
//!
//! A layout string such as `DPM|SPACER|ODD|SPACER|EVEN` describes the ordered
//! barcode categories expected along one read. Each category's matching kind
//! is resolved here, once, so the per-read matcher dispatches on a closed enum
//! instead of sniffing category names for every read.

use crate::barcodes::BarcodeCatalog;
use crate::errors::{ExtractError, Result};

/// How a layout segment is matched against the read sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Skipped entirely; advances the cursor by the segment length.
    Spacer,
    /// Exact dictionary lookup trying every length from min to max.
    VariableExact,
    /// Single exact dictionary lookup at the segment's fixed length.
    FixedExact,
    /// Bounded edit-distance matching with a laxity sliding window.
    Fuzzy,
}

/// Category name of the variable-length exact segment kind.
const VARIABLE_EXACT_CATEGORY: &str = "Y";
/// Name prefix marking spacer segments.
const SPACER_PREFIX: char = 'S';
/// Name prefix marking fixed-length exact segments.
const FIXED_EXACT_PREFIX: char = 'D';

impl SegmentKind {
    /// Resolves the matching kind from the category naming convention.
    #[must_use]
    pub fn from_category(category: &str) -> Self {
        if category.starts_with(SPACER_PREFIX) {
            return Self::Spacer;
        }
        if category == VARIABLE_EXACT_CATEGORY {
            return Self::VariableExact;
        }
        if category.starts_with(FIXED_EXACT_PREFIX) {
            return Self::FixedExact;
        }
        Self::Fuzzy
    }
}

/// One element of a read layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSegment {
    /// The barcode category this segment matches against
    pub category: String,
    /// Matching kind, resolved once at parse time
    pub kind: SegmentKind,
    /// Minimum encoded barcode length for the category
    pub min_len: usize,
    /// Maximum encoded barcode length for the category
    pub max_len: usize,
}

/// An ordered sequence of layout segments for a single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    segments: Vec<LayoutSegment>,
}

impl LayoutPlan {
    /// Parses a pipe-delimited category sequence against the catalog's
    /// length table.
    ///
    /// # Errors
    ///
    /// Returns a config error for a category token the catalog does not know.
    pub fn parse(layout: &str, catalog: &BarcodeCatalog) -> Result<Self> {
        let mut segments = Vec::new();
        for token in layout.split('|') {
            let (min_len, max_len) = catalog.length_range(token).ok_or_else(|| {
                ExtractError::config(
                    token,
                    format!("unknown barcode category in layout '{layout}'"),
                )
            })?;
            segments.push(LayoutSegment {
                category: token.to_string(),
                kind: SegmentKind::from_category(token),
                min_len,
                max_len,
            });
        }
        Ok(Self { segments })
    }

    /// The ordered segments of this plan.
    #[must_use]
    pub fn segments(&self) -> &[LayoutSegment] {
        &self.segments
    }

    /// Number of segments that produce a barcode result (everything except
    /// spacers).
    #[must_use]
    pub fn barcode_segment_count(&self) -> usize {
        self.segments.iter().filter(|s| s.kind != SegmentKind::Spacer).count()
    }
}
