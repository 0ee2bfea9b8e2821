//! Passes run around the merge folds
//!
//! - [`PreValidator`]: instruction misuse in one input, before it is merged
//! - [`ElementsTrimmer`]: redundant OpenGL ES requirements after the folds
//! - [`PostValidator`]: element order and namespace required by the platform
//! - [`ToolsInstructionsCleaner`]: removes tools instructions from the output

mod cleaner;
mod post;
mod pre;
mod trimmer;

pub use cleaner::ToolsInstructionsCleaner;
pub use post::PostValidator;
pub use pre::PreValidator;
pub use trimmer::ElementsTrimmer;
