//! Rule schema types.
//!
//! - [`RuleDefinition`]: the persisted record (metadata plus rule text)
//! - `body`: serde view of the versioned rule text, only used by the compiler
//! - [`CompiledRule`]: the validated in-memory form the evaluator runs

pub(crate) mod body;
mod compiled;
mod definition;

pub use compiled::*;
pub use definition::*;
