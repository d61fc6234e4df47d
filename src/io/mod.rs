//! CSV ingest and result exports.

pub mod export;
pub mod ingest;
pub mod meta_file;
