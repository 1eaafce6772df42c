
use anyhow::{anyhow, Context};

use crate::data_types::column_index::ColumnIndex;

/// One data row of an input file, reduced to the columns the merge interprets.
/// Instances are transient; each one is owned solely by the iteration step that produced it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VariantRecord {
    /// Chromosome label, e.g. "chr1"
    chrom: String,
    /// 1-based genomic coordinate; non-decreasing within a sorted input stream
    pos: u64,
    /// Reference allele
    ref_allele: String,
    /// Alternate allele; may be the wildcard "." in the archaic file
    alt_allele: String,
    /// Genotype tokens from `sample_start` to the end of the row, one per sample
    genotypes: Vec<String>
}

impl VariantRecord {
    /// Constructor, mostly for the merge engine tests
    pub fn new(chrom: String, pos: u64, ref_allele: String, alt_allele: String, genotypes: Vec<String>) -> Self {
        Self {
            chrom,
            pos,
            ref_allele,
            alt_allele,
            genotypes
        }
    }

    /// Parses one tab-delimited data row using the resolved column positions.
    /// # Arguments
    /// * `line` - the full data line, trailing newline allowed
    /// * `columns` - column positions resolved from this file's header
    /// # Errors
    /// * if a required column is past the end of the row
    /// * if the POS value is not an unsigned integer
    pub fn from_line(line: &str, columns: &ColumnIndex) -> anyhow::Result<VariantRecord> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        let field = |index: usize| {
            fields.get(index).copied()
                .ok_or_else(|| anyhow!("row has {} fields, column {} is out of range", fields.len(), index))
        };

        let chrom = field(columns.chrom())?.to_string();
        let pos_text = field(columns.pos())?;
        let pos: u64 = pos_text.parse()
            .with_context(|| format!("invalid POS value {pos_text:?}"))?;
        let ref_allele = field(columns.ref_allele())?.to_string();
        let alt_allele = field(columns.alt_allele())?.to_string();

        // everything after FORMAT is a genotype column; a row may legally have none
        let genotypes: Vec<String> = if fields.len() > columns.sample_start() {
            fields[columns.sample_start()..].iter().map(|f| f.to_string()).collect()
        } else {
            vec![]
        };

        Ok(VariantRecord {
            chrom,
            pos,
            ref_allele,
            alt_allele,
            genotypes
        })
    }

    /// Returns true if this site is a single-nucleotide variant; anything else is skipped by the merge
    pub fn is_snv(&self) -> bool {
        self.ref_allele.len() == 1 && self.alt_allele.len() == 1
    }

    // getters
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    pub fn alt_allele(&self) -> &str {
        &self.alt_allele
    }

    pub fn genotypes(&self) -> &[String] {
        &self.genotypes
    }
}

/// Converts a diploid genotype token into an alternate-allele count.
/// The two allele characters are read positionally (index 0 and index 2), so both "0/1" and "0|1" decode to 1.
/// Any token whose allele characters are not digits (e.g. "./.") decodes to 0; unresolved calls are
/// deliberately treated the same as homozygous-reference rather than raising an error.
pub fn encode_diploid(token: &str) -> u8 {
    let bytes = token.as_bytes();
    let allele = |index: usize| {
        bytes.get(index)
            .and_then(|b| (*b as char).to_digit(10))
    };
    match (allele(0), allele(2)) {
        (Some(a), Some(b)) => (a + b) as u8,
        _ => 0
    }
}

/// One output row of the combined genotype matrix.
/// Rows are produced once per emitted site and serialized immediately; they are never accumulated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MergedRow {
    /// Chromosome label
    chrom: String,
    /// 1-based genomic coordinate
    pos: u64,
    /// Reference allele
    ref_allele: String,
    /// Alternate allele; for matched sites the modern ALT is authoritative
    alt_allele: String,
    /// Alternate-allele count for the archaic sample
    archaic_count: u8,
    /// Alternate-allele counts for the modern samples, in header order
    modern_counts: Vec<u8>
}

impl MergedRow {
    /// Constructor
    pub fn new(chrom: String, pos: u64, ref_allele: String, alt_allele: String, archaic_count: u8, modern_counts: Vec<u8>) -> Self {
        Self {
            chrom,
            pos,
            ref_allele,
            alt_allele,
            archaic_count,
            modern_counts
        }
    }

    // getters
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    pub fn alt_allele(&self) -> &str {
        &self.alt_allele
    }

    pub fn archaic_count(&self) -> u8 {
        self.archaic_count
    }

    pub fn modern_counts(&self) -> &[u8] {
        &self.modern_counts
    }
}
