/*!
# CLI module
Command line interface functionality that is specific to gtmerge.
*/

/// The main CLI module that contains the top-level parser and help text
pub mod core;
/// Settings and validation for generating the genotype matrix
pub mod generate;
