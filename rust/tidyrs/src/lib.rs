//! tidyrs - typed handles over the HTML Tidy library
//!
//! This crate provides:
//! - `Document`, owning a libtidy document, its options and diagnostics
//! - `Node`, `Attribute` and `ConfigOption` views borrowed from a document
//! - `Buffer`, `InputSource` and `OutputSink` for libtidy's byte I/O
//! - `Allocator` for routing libtidy allocations through Rust
//!
//! Status codes from libtidy are turned into [`Result`]s by one rule: a
//! negative status or `2` (errors found) is an [`Error`], anything else is
//! returned as a [`Status`].

pub mod ffi;
pub mod error;
pub mod alloc;
pub mod buffer;
pub mod input_source;
pub mod output_sink;
pub mod option;
pub mod attribute;
pub mod node;
pub mod report;
pub mod document;
pub mod config;

pub use alloc::{Allocator, RawAllocator, SystemAllocator};
pub use attribute::{AttrId, Attribute};
pub use buffer::Buffer;
pub use config::Config;
pub use document::Document;
pub use error::{Error, Result, Status};
pub use input_source::{ByteSource, InputSource, ReadSource, SliceSource};
pub use node::{Node, NodeType, Tag, TagId};
pub use option::{ConfigCategory, ConfigOption, OptionId, OptionType, OptionValue};
pub use output_sink::{ByteSink, OutputSink, WriteSink};
pub use report::{Report, ReportLevel};

/// Install `env_logger` as the `log` backend. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::try_init();
}

/// Release date of the linked libtidy, e.g. `"2017/11/25"`.
pub fn release_date() -> &'static str {
    unsafe { ffi::to_str(ffi::tidyReleaseDate()) }.unwrap_or("")
}

/// Semantic version of the linked libtidy, e.g. `"5.6.0"`.
pub fn library_version() -> &'static str {
    unsafe { ffi::to_str(ffi::tidyLibraryVersion()) }.unwrap_or("")
}

/// Parse `html`, repair it and pretty-print the result using `config`.
pub fn clean(html: &str, config: &Config) -> Result<String> {
    let mut doc = Document::new();
    doc.apply(config)?;
    doc.parse_string(html)?;
    doc.clean_and_repair()?;
    let out = doc.save_to_string()?;
    log::debug!("cleaned {} bytes of markup into {}", html.len(), out.len());
    Ok(out)
}
