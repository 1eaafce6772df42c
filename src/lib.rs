
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Core logic for the sorted merge-join of archaic and modern variant streams
pub mod merge_engine;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// All output writers
pub mod writers;
