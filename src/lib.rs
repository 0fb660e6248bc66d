pub mod bfile;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod factory;
pub mod generators;
pub mod metadata;
pub mod output;
pub mod registry;
pub mod sequence;

pub use domain::{SequenceId, SequenceKey, find_references, name, number};
pub use error::OeisError;
pub use factory::{LoadOptions, SequenceFactory};
pub use registry::{RegisterMeta, Registry};
pub use sequence::{Generator, IndexFunction, Sequence, TermSource};
