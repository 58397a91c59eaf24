//! Stage logic for docsift.
//!
//! - [`assembler`]: section detection and size-bounded chunk packing
//! - [`pipeline`]: the document processing stage and its JSON contract
//! - [`retriever`]: the retrieval stage feeding the processor
//! - [`progress`]: progress callbacks shared by both stages

pub mod assembler;
pub mod pipeline;
pub mod progress;
pub mod retriever;

pub use assembler::{ChunkAssembler, PARAGRAPH_DELIMITER, assemble};
pub use pipeline::{
    DocumentOutcome, DocumentProcessor, INVALID_INPUT_ERROR, SkipReason, parse_batch,
};
pub use progress::{ProgressReporter, SilentProgress, StageSummary};
pub use retriever::{INVALID_QUERY_ERROR, NO_QUERIES_ERROR, Retriever, parse_query};
