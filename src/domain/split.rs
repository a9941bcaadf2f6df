//! Splitting a score into renderable fragments
//!
//! A full score renders to pages that are too large for recognition, so each
//! staff is cut into groups of a few measures. Every fragment is a complete
//! document on its own:
//!
//! - only one part is kept, with the staves of that part seen so far
//! - kept staves are renumbered from 1
//! - layout breaks are dropped from kept measures
//! - the last key signature before the cut is carried into the first kept
//!   measure, so the fragment still sounds in the right key

use std::collections::HashMap;
use std::ops::Range;

use serde::Serialize;

use super::element::{Element, Node};
use super::score::{self, ScoreDocument, ScoreError, LAYOUT_BREAK, MEASURE, PART, STAFF, VOICE};

/// Default number of measures per fragment
pub const DEFAULT_GROUP_SIZE: usize = 4;

/// One fragment to cut out of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Split {
    /// Position of the part among the document's parts
    pub part: usize,

    /// Ids of the staves to keep, in document order
    pub staff_ids: Vec<String>,

    /// Measure indices to keep
    pub measures: Range<usize>,
}

impl Split {
    pub fn keeps_staff(&self, id: &str) -> bool {
        self.staff_ids.iter().any(|s| s == id)
    }
}

/// Computes and applies split plans
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    group_size: usize,
}

impl Default for Splitter {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
        }
    }
}

impl Splitter {
    /// Creates a splitter cutting `group_size` measures per fragment (at least 1)
    pub fn new(group_size: usize) -> Self {
        Self {
            group_size: group_size.max(1),
        }
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Computes the split plan for a document
    ///
    /// For each part, staves are walked in document order. Each staff of the
    /// part joins the kept set, then its measures are grouped; every group
    /// becomes one split keeping all the part's staves seen so far.
    pub fn plan(&self, doc: &ScoreDocument) -> Result<Vec<Split>, ScoreError> {
        let mut splits = Vec::new();

        for (part_index, part) in doc.parts().enumerate() {
            let staff_ids_in_part = part.staff_ids();
            let mut maintained: Vec<String> = Vec::new();

            for (staff_index, staff) in doc.staves().enumerate() {
                let id = staff.id().ok_or(ScoreError::MissingStaffId(staff_index))?;
                if !staff_ids_in_part.contains(&id) {
                    continue;
                }
                maintained.push(id.to_string());

                let count = staff.measure_count();
                let mut start = 0;
                while start < count {
                    let end = (start + self.group_size).min(count);
                    splits.push(Split {
                        part: part_index,
                        staff_ids: maintained.clone(),
                        measures: start..end,
                    });
                    start = end;
                }
            }
        }

        Ok(splits)
    }

    /// Produces the fragment described by `split`
    ///
    /// The source document is left untouched; the fragment is built from a
    /// deep copy.
    pub fn apply(&self, doc: &ScoreDocument, split: &Split) -> Result<ScoreDocument, ScoreError> {
        let part_count = doc.part_count();
        if split.part >= part_count {
            return Err(ScoreError::PartOutOfRange(split.part, part_count));
        }

        let renumbered = renumber_staves(doc, split)?;

        let mut root = doc.root().clone();
        let score = root
            .child_mut(score::SCORE)
            .ok_or_else(|| ScoreError::MissingScore(doc.root().name.clone()))?;

        let mut part_index = 0;
        let mut kept = Vec::with_capacity(score.children.len());
        for node in score.take_children() {
            match node {
                Node::Element(part) if part.name == PART => {
                    let index = part_index;
                    part_index += 1;
                    if index == split.part {
                        kept.push(Node::Element(retain_part_staves(part, &renumbered)));
                    }
                }
                Node::Element(mut staff) if staff.name == STAFF => {
                    let new_id = staff.attr("id").and_then(|id| renumbered.get(id)).cloned();
                    if let Some(new_id) = new_id {
                        staff.set_attr("id", new_id);
                        kept.push(Node::Element(cut_measures(staff, &split.measures)));
                    }
                }
                other => kept.push(other),
            }
        }
        score.children = kept;

        ScoreDocument::new(root)
    }

    /// Plans and applies every split of a document
    pub fn fragments(&self, doc: &ScoreDocument) -> Result<Vec<ScoreDocument>, ScoreError> {
        self.plan(doc)?
            .iter()
            .map(|split| self.apply(doc, split))
            .collect()
    }
}

/// Maps kept staff ids to their new ids `1..`, in document order
fn renumber_staves(
    doc: &ScoreDocument,
    split: &Split,
) -> Result<HashMap<String, String>, ScoreError> {
    let mut mapping = HashMap::new();
    for (staff_index, staff) in doc.staves().enumerate() {
        let id = staff.id().ok_or(ScoreError::MissingStaffId(staff_index))?;
        if split.keeps_staff(id) && !mapping.contains_key(id) {
            let next = mapping.len() + 1;
            mapping.insert(id.to_string(), next.to_string());
        }
    }
    Ok(mapping)
}

/// Keeps only the part's references to kept staves, renumbered
fn retain_part_staves(mut part: Element, renumbered: &HashMap<String, String>) -> Element {
    let children = part.take_children();
    part.children = children
        .into_iter()
        .filter_map(|node| match node {
            Node::Element(mut staff_ref) if staff_ref.name == STAFF => {
                let new_id = staff_ref.attr("id").and_then(|id| renumbered.get(id)).cloned()?;
                staff_ref.set_attr("id", new_id);
                Some(Node::Element(staff_ref))
            }
            other => Some(other),
        })
        .collect();
    part
}

/// Keeps the measures in `range`, carrying the last discarded key signature
/// into the first kept measure
fn cut_measures(mut staff: Element, range: &Range<usize>) -> Element {
    let mut last_key_sig: Option<Element> = None;
    let mut first_kept = true;
    let mut measure_index = 0;

    let children = staff.take_children();
    let mut kept = Vec::with_capacity(children.len());

    for node in children {
        let mut measure = match node {
            Node::Element(e) if e.name == MEASURE => e,
            other => {
                kept.push(other);
                continue;
            }
        };
        let index = measure_index;
        measure_index += 1;

        if !range.contains(&index) {
            if let Some(key_sig) = score::first_key_sig(&measure) {
                last_key_sig = Some(key_sig.clone());
            }
            continue;
        }

        measure.remove_children_named(LAYOUT_BREAK);

        if first_kept {
            first_kept = false;
            if score::first_key_sig(&measure).is_none() {
                if let (Some(key_sig), Some(voice)) = (last_key_sig.take(), measure.child_mut(VOICE)) {
                    voice.insert_child(0, key_sig);
                }
            }
        }

        kept.push(Node::Element(measure));
    }

    staff.children = kept;
    staff
}
