//! Parse MPS format into a [`Model`].
//!
//! ```no_run
//! # fn main() -> Result<(), tabuip::mps::MpsParseError> {
//! let model = tabuip::mps::load_file("instance.mps.gz", false)?;
//! # Ok(()) }
//! ```
//!
//! Differences from the original fixed format
//! ------------------------------------------
//! - Lines are parsed as whitespace-separated fields, as required by the
//!   benchmark instances in the wild.
//! - `OBJSENSE` accepts the long tokens (`MINIMIZE`, `MAXIMIZATION`, ..)
//!   case-insensitively, on the header line or the following line.
//! - Continuous columns are rejected unless `accept_continuous` is set, in
//!   which case they are read as integer.
//! - Fractional bounds on integer columns are floored with a warning,
//!   matching the explicit integer bound types `LI`/`UI`.
//! - Gzipped files are detected by their magic bytes and decompressed
//!   transparently.

mod convert;
mod parser;

pub use convert::convert;
pub use parser::{Mps, MpsObjSense};

use crate::{Model, ModelError};
use std::path::Path;

/// Read an MPS file (optionally gzipped) and build the model.
pub fn load_file(
    path: impl AsRef<Path>,
    accept_continuous: bool,
) -> Result<Model, MpsParseError> {
    let mps = Mps::load(path)?;
    convert(mps, accept_continuous)
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MpsParseError {
    #[error("Unknown row name {name} (line {line})")]
    UnknownRowName { name: String, line: usize },

    #[error("Duplicate row name {name} (line {line})")]
    DuplicateRowName { name: String, line: usize },

    #[error("Invalid row type {token} (line {line})")]
    InvalidRowType { token: String, line: usize },

    #[error("Invalid bound type {token} (line {line})")]
    InvalidBoundType { token: String, line: usize },

    #[error("Invalid header line: {content} (line {line})")]
    InvalidHeader { content: String, line: usize },

    #[error("Invalid marker in COLUMNS section: {token} (line {line})")]
    InvalidMarker { token: String, line: usize },

    #[error("Invalid OBJSENSE: {token} (line {line})")]
    InvalidObjSense { token: String, line: usize },

    #[error("Malformed field line (line {line})")]
    InvalidFields { line: usize },

    #[error("Invalid number {token} (line {line})")]
    InvalidNumber { token: String, line: usize },

    #[error("Column {name} is continuous; pass --accept-continuous to read it as integer")]
    ContinuousColumn { name: String },

    #[error("Bounds of column {name} are empty: [{lower}, {upper}]")]
    EmptyBound {
        name: String,
        lower: f64,
        upper: f64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub(crate) fn is_gzipped(head: &[u8]) -> bool {
    head.len() >= 2 && head[0] == 0x1f && head[1] == 0x8b
}
