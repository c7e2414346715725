#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
/// Error handling and custom [`Error`](std::error::Error) types
pub mod errors;
/// Finding statements on disk and keeping the totals file up to date
pub mod folder;
/// Functions for reading statements and reading and writing running totals
pub mod io;
/// Business logic for splitting amounts and merging totals
pub mod ops;
/// Data types used throughout Tallyup
pub mod types;
