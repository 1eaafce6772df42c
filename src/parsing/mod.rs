/*!
# Parsing module
Contains the logic for parsing input files into meaningful structs / data.
*/
/// Streaming reader for plain or gzip-compressed VCF-like files
pub mod vcf_reader;
