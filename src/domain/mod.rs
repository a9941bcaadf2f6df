//! Domain models for omr-eval
//!
//! Contains the score model, splitting, token extraction and alignment,
//! without any I/O concerns.

mod element;
mod score;
mod split;
mod token;
mod align;

pub use element::{Element, Node};
pub use score::{
    Chord, Event, KeySig, Measure, Note, Part, Rest, ScoreDocument, ScoreError, Staff, Voice,
};
pub use split::{Split, Splitter, DEFAULT_GROUP_SIZE};
pub use token::{extract_tokens, extract_tokens_from_root, Token, TokenSequence};
pub use align::{dissimilarity, opcodes, AlignStrategy, OpTag, Opcode};

#[cfg(test)]
pub(crate) use score::fixtures;
