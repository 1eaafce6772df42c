
#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum HeaderError {
    #[error("required column {column:?} is missing from the header line")]
    MissingColumn { column: &'static str },
    #[error("no #CHROM header line found before end of file")]
    MissingHeaderLine
}

/// Resolved positions of the columns we interpret in a tab-split VCF header.
/// All five lookups happen eagerly at construction; the struct is immutable afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnIndex {
    /// Position of the "#CHROM" column
    chrom: usize,
    /// Position of the "POS" column
    pos: usize,
    /// Position of the "REF" column
    ref_allele: usize,
    /// Position of the "ALT" column
    alt_allele: usize,
    /// Position of the first sample column, immediately after "FORMAT"
    sample_start: usize
}

impl ColumnIndex {
    /// Resolves the required column names from a header line, which must start with "#CHROM".
    /// # Arguments
    /// * `header_line` - the full tab-delimited header line, comment lines already stripped
    /// # Errors
    /// * if any of `#CHROM`, `POS`, `REF`, `ALT`, or `FORMAT` is absent
    pub fn from_header_line(header_line: &str) -> Result<ColumnIndex, HeaderError> {
        let fields: Vec<&str> = header_line.trim_end().split('\t').collect();
        let resolve = |column: &'static str| {
            fields.iter().position(|f| *f == column)
                .ok_or(HeaderError::MissingColumn { column })
        };

        let chrom = resolve("#CHROM")?;
        let pos = resolve("POS")?;
        let ref_allele = resolve("REF")?;
        let alt_allele = resolve("ALT")?;

        // sample columns begin immediately after FORMAT
        let sample_start = resolve("FORMAT")? + 1;

        Ok(ColumnIndex {
            chrom,
            pos,
            ref_allele,
            alt_allele,
            sample_start
        })
    }

    // getters
    pub fn chrom(&self) -> usize {
        self.chrom
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn ref_allele(&self) -> usize {
        self.ref_allele
    }

    pub fn alt_allele(&self) -> usize {
        self.alt_allele
    }

    pub fn sample_start(&self) -> usize {
        self.sample_start
    }
}
