//! Template Module
//!
//! DOCX templates merged by PDF Services live in a flat, read-only directory
//! and are addressed by file name.

mod store;

pub use store::{TemplateError, TemplateFile, TemplateInfo, TemplateStore};
