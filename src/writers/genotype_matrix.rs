
use anyhow::anyhow;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::Path;

use crate::data_types::records::MergedRow;
use crate::writers::RowSink;

/// Writes the combined genotype matrix as a gzip-compressed, tab-delimited file
pub struct GenotypeMatrixWriter {
    /// Handle on the writer
    csv_writer: csv::Writer<GzEncoder<File>>
}

impl GenotypeMatrixWriter {
    /// Creates a new writer for the genotype matrix. The output will be tab-delimited and gzipped.
    /// # Arguments
    /// * `filename` - path to the filename that will get created; expected to be `{sample}_{chrom}.gz`
    pub fn new(filename: &Path) -> anyhow::Result<Self> {
        let delimiter: u8 = b'\t';
        let gzip_writer = GzEncoder::new(
            File::create(filename)?,
            // default compression = 6; the "best" mode was 2x slow with very little gains
            flate2::Compression::default()
        );

        let csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(gzip_writer);
        Ok(Self {
            csv_writer
        })
    }

    /// Flushes the remaining rows and finalizes the gzip stream.
    /// # Errors
    /// * if flushing the row buffer or the compressed stream fails
    pub fn finish(mut self) -> anyhow::Result<()> {
        self.csv_writer.flush()?;
        let gzip_writer = self.csv_writer.into_inner()
            .map_err(|e| anyhow!("Error while flushing output rows: {e}"))?;
        gzip_writer.finish()?;
        Ok(())
    }
}

impl RowSink for GenotypeMatrixWriter {
    fn write_header(&mut self, archaic_sample: &str, modern_samples: &[String]) -> anyhow::Result<()> {
        let mut fields: Vec<&str> = vec!["chrom", "pos", "ref", "alt", archaic_sample];
        fields.extend(modern_samples.iter().map(|s| s.as_str()));
        self.csv_writer.write_record(&fields)?;
        Ok(())
    }

    fn write_row(&mut self, row: &MergedRow) -> anyhow::Result<()> {
        let mut fields: Vec<String> = vec![
            row.chrom().to_string(),
            row.pos().to_string(),
            row.ref_allele().to_string(),
            row.alt_allele().to_string(),
            row.archaic_count().to_string()
        ];
        fields.extend(row.modern_counts().iter().map(|c| c.to_string()));
        self.csv_writer.write_record(&fields)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use flate2::read::MultiGzDecoder;
    use std::io::Read;

    #[test]
    fn test_round_trip_content() {
        let out_fn = std::env::temp_dir().join("gtmerge_matrix_writer_test.gz");

        let mut writer = GenotypeMatrixWriter::new(&out_fn).unwrap();
        writer.write_header("Vindija33.19", &["UV1001".to_string(), "UV1002".to_string()]).unwrap();
        writer.write_row(&MergedRow::new(
            "chr1".to_string(), 100, "A".to_string(), "T".to_string(), 1, vec![0, 0]
        )).unwrap();
        writer.write_row(&MergedRow::new(
            "chr1".to_string(), 200, "G".to_string(), "C".to_string(), 2, vec![1, 2]
        )).unwrap();
        writer.finish().unwrap();

        // decompress and verify the exact byte content
        let mut decoder = MultiGzDecoder::new(File::open(&out_fn).unwrap());
        let mut content = String::new();
        decoder.read_to_string(&mut content).unwrap();
        assert_eq!(content,
            "chrom\tpos\tref\talt\tVindija33.19\tUV1001\tUV1002\n\
             chr1\t100\tA\tT\t1\t0\t0\n\
             chr1\t200\tG\tC\t2\t1\t2\n"
        );

        std::fs::remove_file(&out_fn).unwrap();
    }
}
