//! Docgen Server Library
//!
//! Merges JSON data into DOCX templates through Adobe PDF Services and serves
//! the result as a DOCX or PDF download. The server binary is in main.rs, the
//! `docgen` command-line client in bin/docgen.rs.
//!
//! # Modules
//!
//! - `templates`: Read-only template directory
//! - `merge`: PDF Services client, merge orchestration, response streaming
//! - `routes`: HTTP endpoints
//! - `client`: Merge form workflow used by the command-line client

pub mod client;
pub mod config;
pub mod error;
pub mod merge;
pub mod routes;
pub mod state;
pub mod templates;
