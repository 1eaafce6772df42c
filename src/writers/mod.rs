/*!
# Writers module
Contains the logic for writing the genotype matrix output.
*/
/// Generates the gzip-compressed genotype matrix file
pub mod genotype_matrix;

use crate::data_types::records::MergedRow;

/// Sink for merged output rows.
/// The header is written exactly once before any row; rows arrive in emission order and
/// must be serialized without buffering the whole output.
pub trait RowSink {
    /// Writes the header row naming all output columns
    /// # Arguments
    /// * `archaic_sample` - name of the archaic sample column
    /// * `modern_samples` - names of the modern sample columns, in input order
    fn write_header(&mut self, archaic_sample: &str, modern_samples: &[String]) -> anyhow::Result<()>;

    /// Writes one merged output row
    fn write_row(&mut self, row: &MergedRow) -> anyhow::Result<()>;
}
