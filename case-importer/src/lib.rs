//! Case intake: spreadsheet ingestion and record normalization
//!
//! Reads the first worksheet of an intake workbook, turns its data block into
//! normalized case records and commits them in a single transaction.

pub mod config;
pub mod intake;
pub mod services;
pub mod template;
