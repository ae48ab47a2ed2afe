//! Slide deck reading, cloning and merging (PresentationML packages).

mod merge;
pub mod package;
mod slide;
mod template;
pub mod xml;

pub use merge::{compose_decks, CanvasPolicy, MergedDeck};
pub use slide::{CanvasSize, Slide, SlideDeck, DEFAULT_CANVAS};
