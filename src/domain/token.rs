//! Token extraction
//!
//! Reduces a score to the sequence of key signatures, rests and notes a
//! listener would hear, dropping everything that only affects layout.

use std::fmt;

use serde::{Serialize, Serializer};

use super::element::Element;
use super::score::{Event, ScoreDocument};

/// One normalized musical event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Key signature with its accidental count; `None` means C major
    Key(Option<String>),
    /// Rest with its duration, if written
    Rest(Option<String>),
    /// Chord, represented by the pitch of its first note
    Note(Option<String>),
}

/// Ordered tokens of one document
pub type TokenSequence = Vec<Token>;

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Key(Some(accidental)) => write!(f, "Key {}", accidental),
            Token::Key(None) => write!(f, "Key C"),
            Token::Rest(Some(duration)) => write!(f, "Rest {}", duration),
            Token::Rest(None) => write!(f, "Rest"),
            Token::Note(Some(pitch)) => write!(f, "Note {}", pitch),
            Token::Note(None) => write!(f, "Note"),
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Token {
    /// Normalizes a voice event; `None` for events that carry no pitch content
    pub fn from_event(event: &Event<'_>) -> Option<Self> {
        match event {
            Event::KeySig(key) => Some(Token::Key(key.accidental())),
            Event::Rest(rest) => Some(Token::Rest(rest.duration())),
            Event::Chord(chord) => Some(Token::Note(chord.first_note().and_then(|n| n.pitch()))),
            Event::Other(_) => None,
        }
    }
}

/// Extracts tokens staff by staff, measure by measure, from each measure's
/// first voice
pub fn extract_tokens(doc: &ScoreDocument) -> TokenSequence {
    doc.staves()
        .flat_map(|staff| staff.measures())
        .filter_map(|measure| measure.voice())
        .flat_map(|voice| voice.events())
        .filter_map(|event| Token::from_event(&event))
        .collect()
}

/// Extracts tokens from any document root; a root without a `Score`
/// element (e.g. MusicXML `score-partwise`) has no staves and yields nothing
pub fn extract_tokens_from_root(root: Element) -> TokenSequence {
    match ScoreDocument::new(root) {
        Ok(doc) => extract_tokens(&doc),
        Err(_) => TokenSequence::new(),
    }
}
