//! Batch evaluation of a folder and its summary

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Evaluator, Failure, FailureCounts, FailureKind, FragmentOutcome, Preparer};
use crate::domain::AlignStrategy;
use crate::external::{Acquisition, AcquisitionStatus};

/// Aggregated result of a batch
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationSummary {
    pub folder: PathBuf,
    pub strategy: AlignStrategy,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Sum of the dissimilarity of every scored fragment
    pub total_score: usize,
    /// Fragments that produced a score
    pub scored: usize,
    pub failures: FailureCounts,
    pub total_failures: usize,
    /// Preparation reused an earlier run
    pub reused_preparation: bool,
    pub datasets: Vec<Acquisition>,
    /// Failures before recognition (sources, rendering, datasets)
    pub preparation_failures: Vec<Failure>,
    pub fragments: Vec<FragmentOutcome>,
}

impl EvaluationSummary {
    /// Summary of a batch that has not done anything yet
    pub fn new(folder: &Path, strategy: AlignStrategy) -> Self {
        let now = Utc::now();
        Self {
            folder: folder.to_path_buf(),
            strategy,
            started_at: now,
            finished_at: now,
            total_score: 0,
            scored: 0,
            failures: FailureCounts::default(),
            total_failures: 0,
            reused_preparation: false,
            datasets: Vec::new(),
            preparation_failures: Vec::new(),
            fragments: Vec::new(),
        }
    }

    pub fn record_datasets(&mut self, datasets: Vec<Acquisition>) {
        for acquisition in &datasets {
            if let AcquisitionStatus::Failed { reason } = &acquisition.status {
                self.record_failure(Failure {
                    kind: FailureKind::Acquisition,
                    path: acquisition.dir.clone(),
                    reason: reason.clone(),
                });
            }
        }
        self.datasets = datasets;
    }

    pub fn record_failure(&mut self, failure: Failure) {
        self.failures.add(failure.kind);
        self.preparation_failures.push(failure);
    }

    pub fn record_fragment(&mut self, outcome: FragmentOutcome) {
        match outcome.score() {
            Some(score) => {
                self.total_score += score;
                self.scored += 1;
            }
            None => {
                if let Some(failure) = outcome.failure() {
                    self.failures.add(failure.kind);
                }
            }
        }
        self.fragments.push(outcome);
    }

    /// Stamps the finish time and totals
    pub fn finish(mut self) -> Self {
        self.total_failures = self.failures.total();
        self.finished_at = Utc::now();
        self
    }
}

/// Prepares `folder`, then recognizes and scores every fragment image
///
/// `datasets` are acquisition outcomes from before the batch; their failures
/// are counted but do not stop it.
pub fn evaluate_folder(
    folder: &Path,
    force: bool,
    datasets: Vec<Acquisition>,
    preparer: &Preparer<'_>,
    evaluator: &Evaluator<'_>,
) -> Result<EvaluationSummary> {
    let mut summary = EvaluationSummary::new(folder, evaluator.strategy());
    summary.record_datasets(datasets);

    let preparation = preparer.prepare(folder, force)?;
    summary.reused_preparation = preparation.reused;
    for failure in preparation.failures {
        summary.record_failure(failure);
    }

    log::info!("Evaluating {} fragment images", preparation.images.len());
    for outcome in evaluator.evaluate(&preparation.images)? {
        summary.record_fragment(outcome);
    }

    let summary = summary.finish();
    log::info!(
        "Total dissimilarity {} over {} fragments, {} hard failures",
        summary.total_score,
        summary.scored,
        summary.total_failures
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Splitter;
    use crate::pipeline::evaluate::tests::FakeRecognizer;
    use crate::pipeline::prepare::tests::{write_source, FakeRenderer};
    use crate::pipeline::split_score;
    use crate::storage::{mscx, MarkerFile};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn end_to_end_with_fakes() {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path(), "lc1.mscx", 9);

        let mut renderer = FakeRenderer::new();
        renderer.broken.push("split_2".into());
        let marker = MarkerFile::new("prepare_done.txt");
        let preparer = Preparer::new(Splitter::default(), &renderer, &marker);
        let evaluator = Evaluator::new(&FakeRecognizer, "-1");

        // Recognize fragment 0 perfectly; fragment 1 comes back as the whole
        // source score; fragment 2 is never rendered
        split_score(&Splitter::default(), &source).unwrap();
        let fragment0 = dir.path().join("split_0.mscx");
        fs::copy(&fragment0, dir.path().join("split_0-1.result.mscx")).unwrap();
        fs::copy(&source, dir.path().join("split_1-1.result.mscx")).unwrap();

        let datasets = vec![Acquisition {
            name: "Lieder".into(),
            dir: PathBuf::from("Lieder"),
            status: AcquisitionStatus::Failed {
                reason: "offline".into(),
            },
        }];
        let summary = evaluate_folder(dir.path(), false, datasets, &preparer, &evaluator).unwrap();

        // Fragment 1 holds Key 2 (carried), Note 64..67; the source has
        // Key 2, Rest, Note 61..68, so 5 tokens are extra
        let fragment1 = crate::domain::extract_tokens(&mscx::read_file(&dir.path().join("split_1.mscx")).unwrap());
        assert_eq!(fragment1.len(), 5);

        assert_eq!(summary.fragments.len(), 2);
        assert_eq!(summary.scored, 2);
        assert_eq!(summary.total_score, 5);
        assert_eq!(summary.failures.acquisition, 1);
        assert_eq!(summary.failures.rendering, 1);
        assert_eq!(summary.total_failures, 2);
        assert!(summary.finished_at >= summary.started_at);
    }

    #[test]
    fn summary_json_shape() {
        let summary = EvaluationSummary::new(Path::new("scores"), AlignStrategy::MatchingBlocks).finish();
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["strategy"], "matching-blocks");
        assert_eq!(json["total_score"], 0);
        assert_eq!(json["failures"]["recognition"], 0);
        assert!(json["started_at"].is_string());
    }
}
