//! Report generation: serialize a monitor's state, statistics and change
//! history into JSON, CSV, HTML or Markdown, optionally to a file.

pub mod errors;
pub mod model;
pub mod render;

pub use errors::ExportError;
pub use model::{ExportFormat, ExportOptions, ExportOutcome, Report};
pub use render::export;
