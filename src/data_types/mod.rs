
/// Maps the required VCF header columns to their tab-split positions
pub mod column_index;
/// Contains variant records, genotype encoding, and merged output rows
pub mod records;
