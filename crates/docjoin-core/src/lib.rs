//! Document assembly: merge PDFs and slide decks, extract pages
//!
//! A request is a set of named uploads plus an ordering. Each upload is
//! classified, PDFs go to the page composition engine, slide decks to the
//! slide composition engine (legacy decks are converted first), and the
//! results are written through a request-scoped staging area.
//!
//! - [`Assembler::assemble`] / [`Assembler::extract`]: the request pipeline
//! - [`compose_pdf`] / [`compose_decks`]: the composition engines on their own
//! - [`run_command`]: a JSON command surface over the pipeline

pub mod assemble;
pub mod classify;
pub mod command;
pub mod convert;
pub mod deck;
pub mod error;
pub mod extract;
pub mod input;
pub mod merge;
pub mod ordering;
pub mod page;
pub mod page_range;
pub mod report;
pub mod staging;

#[cfg(test)]
mod testing;

pub use assemble::{Artifact, Assembler, AssemblyOptions, AssemblyReport, AssemblyRequest};
pub use classify::{classify, classify_all, ClassifiedInput, DocumentKind};
pub use command::{run_command, CommandResult, JoinCommand, ProcessMetrics};
pub use convert::{CommandConverter, CommandSpec, Converter};
pub use deck::{compose_decks, CanvasPolicy, MergedDeck, SlideDeck};
pub use error::{DocJoinError, OrderingViolation};
pub use extract::extract_pages;
pub use input::InputDocument;
pub use merge::{compose_pdf, PageStream};
pub use ordering::{parse_index_ordering, resolve_ordering};
pub use page::PageDocument;
pub use page_range::parse_page_range;
pub use report::{Composition, DocumentFailure, FailureKind, MergePolicy};
pub use staging::StagingArea;
