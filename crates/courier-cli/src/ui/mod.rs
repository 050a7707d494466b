//! UI primitives for the Courier CLI.
//!
//! - **Context**: Environment detection (TTY, width, color, unicode)
//! - **Mode**: Output mode resolution (json, plain, pretty)
//! - **Theme**: Badges and color styles
//! - **Render**: Headers, key-value lines, hints, tables
//! - **Progress**: Live per-job progress for `courier run`

mod context;
mod mode;
pub mod progress;
pub mod render;
pub mod theme;

pub use context::UiContext;
pub use mode::OutputMode;
pub use theme::Badge;

pub use render::{badge, header, hint, kv, receipt, table};
