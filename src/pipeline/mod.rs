pub mod dedupe;
pub mod extract;
pub mod runner;
pub mod transform;
pub mod validate;

pub use extract::{Extractor, RecordStream, SourceFile};
pub use runner::{PipelineRunner, RunState};
pub use transform::Transformer;
pub use validate::{validate, ValidationOutcome};
