//! omr-eval - Accuracy evaluation for optical music recognition
//!
//! Reference scores are split into small fragments, each fragment is
//! rendered and fed to an OMR engine, and the recognized result is scored
//! against the fragment it came from by aligning their token sequences.

pub mod domain;
pub mod storage;
pub mod external;
pub mod pipeline;
pub mod cli;

pub use domain::{dissimilarity, extract_tokens, AlignStrategy, ScoreDocument, Split, Splitter, Token};
