//! Block model and pure conversion pipeline for the Notion page bridge.
//!
//! Everything here is synchronous and side-effect-free:
//!
//! - `block`: typed block model + Notion JSON (de)serialization
//! - `markdown`: text → blocks classification and blocks → text render-back
//! - `chunk`: size-driven batching against remote request limits

pub mod block;
pub mod chunk;
pub mod markdown;

pub use block::{Annotations, Block, BlockKind, Document, TextRun};
pub use chunk::{chunk, Limits, SizeError};
pub use markdown::{convert, render_markdown, ConvertOptions};
