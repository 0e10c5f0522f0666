//! Orchestration around the markdown converter.
//!
//! Ties conversion to the filesystem ([`files`]), runs conversions as
//! background jobs ([`jobs`]), and drives page-level flows against a
//! document service ([`pages`]).

pub mod files;
pub mod jobs;
pub mod pages;

pub use files::{MarkdownFiles, parse_markdown_file, parse_markdown_file_with};
pub use jobs::{
    ConversionJob, JobInput, JobKind, JobManager, JobOutput, JobParams, JobStatus,
};
pub use pages::{
    DocumentClient, PageConversion, archive_page, create_page_from_markdown,
    export_page_to_markdown, update_page_from_markdown,
};
