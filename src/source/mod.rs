//! Path listing files: one path specification per line.

pub mod parse;

pub use parse::{parse_paths, parse_paths_file};
