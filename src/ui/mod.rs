//! Terminal and file output of extraction results.
pub mod output;
