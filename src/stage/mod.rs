// Stage invocation module
// Builds the per-invocation configuration document and spawns the external stage

pub mod document;
pub mod runner;

pub use document::{read_document, DocumentBuilder, DocumentError, StageDocument, StageKind};
pub use runner::{ProcessRunner, RunnerError, StageRunner};
