//! Recognition and scoring of rendered fragments

use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;

use super::{worker_pool, Failure, FailureKind};
use crate::domain::{extract_tokens, extract_tokens_from_root, opcodes, AlignStrategy, Opcode, Token};
use crate::external::Recognizer;
use crate::storage::{mscx, reference_for_image, MscxError};

/// Token-level comparison of a recognized document with its reference
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub score: usize,
    pub result: Vec<Token>,
    pub reference: Vec<Token>,
    pub opcodes: Vec<Opcode>,
}

impl Comparison {
    pub fn new(result: Vec<Token>, reference: Vec<Token>, strategy: AlignStrategy) -> Self {
        let opcodes = opcodes(&result, &reference, strategy);
        let score = opcodes.iter().map(Opcode::cost).sum();
        Self {
            score,
            result,
            reference,
            opcodes,
        }
    }
}

/// Reads two score files and compares their token sequences
///
/// The result only has to be well-formed XML: a recognized document with no
/// `Score` element contributes no tokens. The reference must be a score.
pub fn compare_files(
    result: &Path,
    reference: &Path,
    strategy: AlignStrategy,
) -> Result<Comparison, MscxError> {
    let result_tokens = extract_tokens_from_root(mscx::read_element(result)?);
    let reference_tokens = extract_tokens(&mscx::read_file(reference)?);
    Ok(Comparison::new(result_tokens, reference_tokens, strategy))
}

/// What happened to one fragment image
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FragmentStatus {
    Scored { score: usize },
    Failed { kind: FailureKind, reason: String },
}

/// Outcome for one fragment image
#[derive(Debug, Clone, Serialize)]
pub struct FragmentOutcome {
    pub image: PathBuf,
    pub reference: PathBuf,
    #[serde(flatten)]
    pub status: FragmentStatus,
}

impl FragmentOutcome {
    pub fn score(&self) -> Option<usize> {
        match self.status {
            FragmentStatus::Scored { score } => Some(score),
            FragmentStatus::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<Failure> {
        match &self.status {
            FragmentStatus::Scored { .. } => None,
            FragmentStatus::Failed { kind, reason } => Some(Failure {
                kind: *kind,
                path: self.image.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Runs recognition on fragment images and scores the results
pub struct Evaluator<'a> {
    recognizer: &'a dyn Recognizer,
    strategy: AlignStrategy,
    page_suffix: String,
    jobs: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(recognizer: &'a dyn Recognizer, page_suffix: impl Into<String>) -> Self {
        Self {
            recognizer,
            strategy: AlignStrategy::default(),
            page_suffix: page_suffix.into(),
            jobs: 1,
        }
    }

    pub fn with_strategy(mut self, strategy: AlignStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn strategy(&self) -> AlignStrategy {
        self.strategy
    }

    /// Evaluates every image; outcomes are in the order of `images`
    pub fn evaluate(&self, images: &[PathBuf]) -> Result<Vec<FragmentOutcome>> {
        let outcomes = worker_pool(self.jobs)?.install(|| {
            images
                .par_iter()
                .map(|image| self.evaluate_image(image))
                .collect::<Vec<_>>()
        });
        Ok(outcomes)
    }

    /// Recognizes one image and scores it against its reference fragment
    pub fn evaluate_image(&self, image: &Path) -> FragmentOutcome {
        let reference = reference_for_image(image, &self.page_suffix);
        let status = match self.score_image(image, &reference) {
            Ok(score) => {
                log::info!("Comparing {} with {}: {}", image.display(), reference.display(), score);
                FragmentStatus::Scored { score }
            }
            Err(failure) => FragmentStatus::Failed {
                kind: failure.kind,
                reason: failure.reason,
            },
        };
        FragmentOutcome {
            image: image.to_path_buf(),
            reference,
            status,
        }
    }

    fn score_image(&self, image: &Path, reference: &Path) -> Result<usize, Failure> {
        let result = self
            .recognizer
            .recognize(image)
            .map_err(|e| Failure::new(FailureKind::Recognition, image, e))?;

        let comparison = compare_files(&result, reference, self.strategy)
            .map_err(|e| Failure::new(FailureKind::Parse, image, e))?;
        log::debug!(
            "{}: {} result tokens, {} reference tokens",
            image.display(),
            comparison.result.len(),
            comparison.reference.len()
        );
        Ok(comparison.score)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::fixtures::{chord, document, key_sig, measure, part, rest, staff};
    use crate::external::ExternalError;
    use std::fs;
    use tempfile::TempDir;

    /// Copies a prepared `{stem}.result.mscx` next to the image, or fails
    /// when none was prepared
    pub(crate) struct FakeRecognizer;

    impl Recognizer for FakeRecognizer {
        fn recognize(&self, image: &Path) -> Result<PathBuf, ExternalError> {
            let prepared = image.with_extension("result.mscx");
            if !prepared.is_file() {
                return Err(ExternalError::MissingOutput(prepared));
            }
            let output = image.with_extension("musicxml");
            fs::copy(&prepared, &output).unwrap();
            Ok(output)
        }
    }

    fn write_score(path: &Path, events: Vec<crate::domain::Element>) {
        let doc = document(vec![part(&["1"])], vec![staff("1", vec![measure(events)])]);
        mscx::write_file(path, &doc).unwrap();
    }

    #[test]
    fn compares_files_token_by_token() {
        let dir = TempDir::new().unwrap();
        let result = dir.path().join("result.mscx");
        let reference = dir.path().join("reference.mscx");
        write_score(&result, vec![key_sig("0"), rest("4/4")]);
        write_score(&reference, vec![key_sig("0"), rest("4/4"), chord(&["60"])]);

        let comparison = compare_files(&result, &reference, AlignStrategy::Lcs).unwrap();
        assert_eq!(comparison.score, 1);
        assert_eq!(comparison.reference.len(), 3);
        assert_eq!(comparison.opcodes.len(), 2);
    }

    #[test]
    fn unparsable_file_is_an_error_not_a_score() {
        let dir = TempDir::new().unwrap();
        let result = dir.path().join("result.mscx");
        let reference = dir.path().join("reference.mscx");
        fs::write(&result, "not xml").unwrap();
        write_score(&reference, vec![rest("4/4")]);

        assert!(compare_files(&result, &reference, AlignStrategy::Lcs).is_err());
    }

    #[test]
    fn musicxml_result_scores_reference_length() {
        let dir = TempDir::new().unwrap();
        let result = dir.path().join("split_0-1.musicxml");
        let reference = dir.path().join("split_0.mscx");
        fs::write(
            &result,
            r#"<?xml version="1.0"?><score-partwise version="3.1"><part-list/><part id="P1"><measure number="1"/></part></score-partwise>"#,
        )
        .unwrap();
        write_score(&reference, vec![key_sig("1"), rest("4/4")]);

        let comparison = compare_files(&result, &reference, AlignStrategy::Lcs).unwrap();
        assert!(comparison.result.is_empty());
        assert_eq!(comparison.score, 2);
    }

    #[test]
    fn musicxml_result_is_scored_not_failed() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("split_0-1.png");
        fs::write(&image, "png").unwrap();
        fs::write(image.with_extension("result.mscx"), "<score-partwise/>").unwrap();
        write_score(&dir.path().join("split_0.mscx"), vec![key_sig("1"), rest("4/4"), chord(&["60"])]);

        let outcome = Evaluator::new(&FakeRecognizer, "-1").evaluate_image(&image);
        assert_eq!(outcome.score(), Some(3));
    }

    #[test]
    fn scores_images_in_order() {
        let dir = TempDir::new().unwrap();
        let images: Vec<PathBuf> = (0..3)
            .map(|i| dir.path().join(format!("split_{}-1.png", i)))
            .collect();
        for (i, image) in images.iter().enumerate() {
            fs::write(image, "png").unwrap();
            write_score(&dir.path().join(format!("split_{}.mscx", i)), vec![key_sig("1"), rest("1/2")]);
        }
        // Perfect recognition, a missed rest, and no output at all
        write_score(&images[0].with_extension("result.mscx"), vec![key_sig("1"), rest("1/2")]);
        write_score(&images[1].with_extension("result.mscx"), vec![key_sig("1")]);

        let outcomes = Evaluator::new(&FakeRecognizer, "-1")
            .with_jobs(2)
            .evaluate(&images)
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].score(), Some(0));
        assert_eq!(outcomes[1].score(), Some(1));
        assert_eq!(outcomes[0].reference, dir.path().join("split_0.mscx"));
        let failure = outcomes[2].failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Recognition);
        assert_eq!(failure.path, images[2]);
    }

    #[test]
    fn missing_reference_is_parse_failure() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("split_0-1.png");
        fs::write(&image, "png").unwrap();
        write_score(&image.with_extension("result.mscx"), vec![rest("4/4")]);

        let outcome = Evaluator::new(&FakeRecognizer, "-1").evaluate_image(&image);
        assert_eq!(outcome.failure().unwrap().kind, FailureKind::Parse);
    }

    #[test]
    fn outcome_serializes_flat() {
        let outcome = FragmentOutcome {
            image: PathBuf::from("split_0-1.png"),
            reference: PathBuf::from("split_0.mscx"),
            status: FragmentStatus::Scored { score: 4 },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "scored");
        assert_eq!(json["score"], 4);
    }
}
