//! Shared utilities for the ESI gasket compiler.
mod errors;
mod id;
mod math;
mod namegenerator;
mod out_file;

pub use errors::{Error, ErrorKind, EsiResult};
pub use id::Id;
pub use math::{clog2, words_for_bits};
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
