//! The core of packet-to-flow feature extraction.
//! Parse captured packets, track per-flow state and assemble a cleaned feature table.
pub mod cleaner;
pub mod containers;
pub mod core;
pub mod errors;
pub mod features;
pub mod flows;
pub mod parser;
pub mod summary;
pub mod table;
pub mod utils;
