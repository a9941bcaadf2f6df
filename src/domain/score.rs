//! Typed view over a MuseScore document
//!
//! Layout of the parts of an `.mscx` file the evaluator cares about:
//!
//! ```text
//! museScore
//! └── Score
//!     ├── Part            (0..n, identified by position)
//!     │   └── Staff id    (references to member staves)
//!     └── Staff id        (0..n, owns the music)
//!         └── Measure
//!             ├── voice
//!             │   └── KeySig | Rest | Chord(Note*) | ...
//!             └── LayoutBreak
//! ```
//!
//! Views borrow from the underlying [`Element`] tree; nothing here mutates.

use thiserror::Error;

use super::element::Element;

pub(crate) const SCORE: &str = "Score";
pub(crate) const PART: &str = "Part";
pub(crate) const STAFF: &str = "Staff";
pub(crate) const MEASURE: &str = "Measure";
pub(crate) const VOICE: &str = "voice";
pub(crate) const LAYOUT_BREAK: &str = "LayoutBreak";
pub(crate) const KEY_SIG: &str = "KeySig";
pub(crate) const REST: &str = "Rest";
pub(crate) const CHORD: &str = "Chord";
pub(crate) const NOTE: &str = "Note";

#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
    #[error("Document has no <Score> element under <{0}>")]
    MissingScore(String),

    #[error("Staff #{0} has no id attribute")]
    MissingStaffId(usize),

    #[error("Part index {0} out of range ({1} parts)")]
    PartOutOfRange(usize, usize),
}

/// A parsed score document
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreDocument {
    root: Element,
}

impl ScoreDocument {
    /// Wraps a root element, checking that it holds a `Score`
    pub fn new(root: Element) -> Result<Self, ScoreError> {
        if !root.has_child(SCORE) {
            return Err(ScoreError::MissingScore(root.name.clone()));
        }
        Ok(Self { root })
    }

    /// Returns the document root (`museScore`)
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Consumes the document, returning its root
    pub fn into_root(self) -> Element {
        self.root
    }

    /// Returns the `Score` element
    pub fn score(&self) -> &Element {
        // Presence is checked in `new` and the root is never exposed mutably.
        self.root.child(SCORE).unwrap_or(&self.root)
    }

    /// Iterates over parts in document order
    pub fn parts(&self) -> impl Iterator<Item = Part<'_>> {
        self.score().children_named(PART).map(Part)
    }

    /// Iterates over staves in document order
    pub fn staves(&self) -> impl Iterator<Item = Staff<'_>> {
        self.score().children_named(STAFF).map(Staff)
    }

    /// Number of parts
    pub fn part_count(&self) -> usize {
        self.parts().count()
    }

    /// Looks up a staff by id
    pub fn staff(&self, id: &str) -> Option<Staff<'_>> {
        self.staves().find(|s| s.id() == Some(id))
    }
}

/// A part: an instrument grouping one or more staves
#[derive(Debug, Clone, Copy)]
pub struct Part<'a>(&'a Element);

impl<'a> Part<'a> {
    /// Ids of the staves belonging to this part
    pub fn staff_ids(&self) -> Vec<&'a str> {
        self.0
            .children_named(STAFF)
            .filter_map(|s| s.attr("id"))
            .collect()
    }

    /// Returns true if the staff belongs to this part
    pub fn contains_staff(&self, id: &str) -> bool {
        self.staff_ids().iter().any(|s| *s == id)
    }

    pub fn element(&self) -> &'a Element {
        self.0
    }
}

/// A staff holding the measures of one line of music
#[derive(Debug, Clone, Copy)]
pub struct Staff<'a>(&'a Element);

impl<'a> Staff<'a> {
    pub fn id(&self) -> Option<&'a str> {
        self.0.attr("id")
    }

    pub fn measures(&self) -> impl Iterator<Item = Measure<'a>> {
        self.0.children_named(MEASURE).map(Measure)
    }

    pub fn measure_count(&self) -> usize {
        self.measures().count()
    }

    pub fn element(&self) -> &'a Element {
        self.0
    }
}

/// One measure of a staff
#[derive(Debug, Clone, Copy)]
pub struct Measure<'a>(&'a Element);

impl<'a> Measure<'a> {
    /// The first voice, which is the only one the evaluator reads
    pub fn voice(&self) -> Option<Voice<'a>> {
        self.0.child(VOICE).map(Voice)
    }

    pub fn voices(&self) -> impl Iterator<Item = Voice<'a>> {
        self.0.children_named(VOICE).map(Voice)
    }

    pub fn has_layout_break(&self) -> bool {
        self.0.has_child(LAYOUT_BREAK)
    }

    /// Key signature declared in the first voice, if any
    pub fn key_sig(&self) -> Option<KeySig<'a>> {
        first_key_sig(self.0).map(KeySig)
    }

    pub fn element(&self) -> &'a Element {
        self.0
    }
}

/// Finds the KeySig element in a measure element's first voice
pub(crate) fn first_key_sig(measure: &Element) -> Option<&Element> {
    measure.child(VOICE).and_then(|voice| voice.child(KEY_SIG))
}

/// A voice: an ordered run of events
#[derive(Debug, Clone, Copy)]
pub struct Voice<'a>(&'a Element);

impl<'a> Voice<'a> {
    pub fn events(&self) -> impl Iterator<Item = Event<'a>> {
        self.0.elements().map(Event::from_element)
    }

    pub fn element(&self) -> &'a Element {
        self.0
    }
}

/// A musical event inside a voice
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    KeySig(KeySig<'a>),
    Rest(Rest<'a>),
    Chord(Chord<'a>),
    /// Anything else (clefs, time signatures, beams, ...)
    Other(&'a Element),
}

impl<'a> Event<'a> {
    pub fn from_element(element: &'a Element) -> Self {
        match element.name.as_str() {
            KEY_SIG => Event::KeySig(KeySig(element)),
            REST => Event::Rest(Rest(element)),
            CHORD => Event::Chord(Chord(element)),
            _ => Event::Other(element),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeySig<'a>(&'a Element);

impl<'a> KeySig<'a> {
    /// Accidental count, e.g. `-3` for three flats
    pub fn accidental(&self) -> Option<String> {
        self.0.child_text("accidental")
    }

    pub fn element(&self) -> &'a Element {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rest<'a>(&'a Element);

impl<'a> Rest<'a> {
    pub fn duration(&self) -> Option<String> {
        self.0.child_text("duration")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chord<'a>(&'a Element);

impl<'a> Chord<'a> {
    pub fn notes(&self) -> impl Iterator<Item = Note<'a>> {
        self.0.children_named(NOTE).map(Note)
    }

    pub fn first_note(&self) -> Option<Note<'a>> {
        self.0.child(NOTE).map(Note)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Note<'a>(&'a Element);

impl<'a> Note<'a> {
    /// MIDI pitch number as written in the file
    pub fn pitch(&self) -> Option<String> {
        self.0.child_text("pitch")
    }
}
