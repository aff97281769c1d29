//! LLM-backed agents — classification, summarization, drafting, extraction.

pub mod classifier;
pub mod extractor;
pub mod responder;
pub mod summarizer;

pub use classifier::{Classifier, ParseOutcome};
pub use extractor::Extractor;
pub use responder::Responder;
pub use summarizer::Summarizer;
