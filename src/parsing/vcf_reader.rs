
use anyhow::Context;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::data_types::column_index::{ColumnIndex, HeaderError};
use crate::data_types::records::VariantRecord;

/// Leading bytes of a gzip stream; compression is detected by content, never by file extension
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Streaming reader over the data rows of a VCF-like file.
/// Opening the file resolves the column positions and sample names from the header line;
/// afterwards the reader yields one `VariantRecord` per data row in file order.
pub struct VcfReader {
    /// Column positions resolved from this file's header
    column_index: ColumnIndex,
    /// Sample names, taken from the header columns after FORMAT
    sample_names: Vec<String>,
    /// Remaining lines of the underlying text stream
    lines: Lines<Box<dyn BufRead>>,
    /// Holds a record that was read ahead by `first_chrom`
    buffered: Option<VariantRecord>,
    /// Source path, kept for error messages
    filename: PathBuf,
    /// 1-based line number of the most recently read line
    line_number: u64
}

impl std::fmt::Debug for VcfReader {
    // manual impl because the `lines` stream is not Debug
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcfReader")
            .field("column_index", &self.column_index)
            .field("sample_names", &self.sample_names)
            .field("buffered", &self.buffered)
            .field("filename", &self.filename)
            .field("line_number", &self.line_number)
            .finish_non_exhaustive()
    }
}

impl VcfReader {
    /// Opens a plain or gzip-compressed VCF-like file and parses its header.
    /// Lines before the one starting with "#CHROM" (the "##" comment block) are discarded.
    /// # Arguments
    /// * `filename` - path to the input file
    /// # Errors
    /// * if the file cannot be opened or read
    /// * if no "#CHROM" header line is present
    /// * if a required column is missing from the header
    pub fn open(filename: &Path) -> anyhow::Result<VcfReader> {
        let reader = open_text_reader(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;
        let mut lines = reader.lines();
        let mut line_number: u64 = 0;

        // scan forward to the column-header line
        let header_line = loop {
            match lines.next() {
                Some(line) => {
                    let line = line.with_context(|| format!("Error while reading {filename:?}:"))?;
                    line_number += 1;
                    if line.starts_with("#CHROM") {
                        break line;
                    }
                },
                None => {
                    return Err(anyhow::Error::new(HeaderError::MissingHeaderLine)
                        .context(format!("Error while parsing {filename:?}:")));
                }
            }
        };

        let column_index = ColumnIndex::from_header_line(&header_line)
            .with_context(|| format!("Error while parsing header of {filename:?}:"))?;
        let sample_names: Vec<String> = header_line.trim_end().split('\t')
            .skip(column_index.sample_start())
            .map(|s| s.to_string())
            .collect();

        Ok(VcfReader {
            column_index,
            sample_names,
            lines,
            buffered: None,
            filename: filename.to_path_buf(),
            line_number
        })
    }

    /// Returns the chromosome of the first data record without consuming it.
    /// Returns None if the file has no data rows.
    pub fn first_chrom(&mut self) -> anyhow::Result<Option<String>> {
        if self.buffered.is_none() {
            self.buffered = self.read_record()?;
        }
        Ok(self.buffered.as_ref().map(|r| r.chrom().to_string()))
    }

    /// Reads the next data record from the underlying stream, skipping blank lines
    fn read_record(&mut self) -> anyhow::Result<Option<VariantRecord>> {
        loop {
            match self.lines.next() {
                Some(line) => {
                    let line = line.with_context(|| format!("Error while reading {:?}:", self.filename))?;
                    self.line_number += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record = VariantRecord::from_line(&line, &self.column_index)
                        .with_context(|| format!("Error while parsing {:?} line {}:", self.filename, self.line_number))?;
                    return Ok(Some(record));
                },
                None => return Ok(None)
            }
        }
    }

    // getters
    pub fn column_index(&self) -> &ColumnIndex {
        &self.column_index
    }

    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }
}

impl Iterator for VcfReader {
    type Item = anyhow::Result<VariantRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.buffered.take() {
            return Some(Ok(record));
        }
        self.read_record().transpose()
    }
}

/// Opens a file as a buffered text reader, transparently decompressing gzip.
/// Detection reads the two magic bytes and then rewinds, so mislabeled extensions do not matter.
fn open_text_reader(filename: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    let mut file = File::open(filename)?;
    let mut magic = [0_u8; 2];
    let bytes_read = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    if bytes_read == GZIP_MAGIC.len() && magic == GZIP_MAGIC {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_stream() {
        let vcf_fn = PathBuf::from("test_data/chr1_example/modern.vcf");
        let mut reader = VcfReader::open(&vcf_fn).unwrap();
        assert_eq!(reader.sample_names(), &["UV1001".to_string(), "UV1002".to_string()]);

        let records: Vec<VariantRecord> = reader.by_ref().collect::<anyhow::Result<_>>().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].chrom(), "chr1");
        assert_eq!(records[0].pos(), 200);
        assert_eq!(records[2].pos(), 400);
        assert_eq!(records[1].genotypes(), &["0/0".to_string(), "0/1".to_string()]);
    }

    #[test]
    fn test_gzip_stream_matches_plain() {
        let plain_fn = PathBuf::from("test_data/chr1_example/modern.vcf");
        let gzip_fn = PathBuf::from("test_data/chr1_example/modern.vcf.gz");

        let plain: Vec<VariantRecord> = VcfReader::open(&plain_fn).unwrap()
            .collect::<anyhow::Result<_>>().unwrap();
        let gzipped: Vec<VariantRecord> = VcfReader::open(&gzip_fn).unwrap()
            .collect::<anyhow::Result<_>>().unwrap();
        assert_eq!(plain, gzipped);
    }

    #[test]
    fn test_archaic_sample_name() {
        let vcf_fn = PathBuf::from("test_data/chr1_example/archaic.vcf");
        let reader = VcfReader::open(&vcf_fn).unwrap();
        assert_eq!(reader.sample_names(), &["Vindija33.19".to_string()]);
    }

    #[test]
    fn test_first_chrom_does_not_consume() {
        let vcf_fn = PathBuf::from("test_data/chr1_example/archaic.vcf");
        let mut reader = VcfReader::open(&vcf_fn).unwrap();
        assert_eq!(reader.first_chrom().unwrap(), Some("chr1".to_string()));

        // the peeked record must still come out of the iterator
        let records: Vec<VariantRecord> = reader.collect::<anyhow::Result<_>>().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].pos(), 100);
    }

    #[test]
    fn test_missing_header_line() {
        let vcf_fn = PathBuf::from("test_data/chr1_example/no_header.vcf");
        let error = VcfReader::open(&vcf_fn).unwrap_err();
        assert_eq!(
            error.downcast_ref::<HeaderError>(),
            Some(&HeaderError::MissingHeaderLine)
        );
    }

    #[test]
    fn test_missing_file() {
        let vcf_fn = PathBuf::from("test_data/chr1_example/does_not_exist.vcf");
        assert!(VcfReader::open(&vcf_fn).is_err());
    }
}
