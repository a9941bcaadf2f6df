//! Batch commands: run, fetch, prepare

use std::path::Path;

use anyhow::Result;

use super::output::Output;
use crate::domain::Splitter;
use crate::external::{ensure_datasets, Acquisition, AcquisitionStatus, CommandRecognizer, CommandRenderer, GitFetcher};
use crate::pipeline::{evaluate_folder, EvaluationSummary, Evaluator, Failure, FailureKind, FragmentStatus, Preparer};
use crate::storage::{Config, MarkerFile};

const FAILURE_KINDS: [FailureKind; 4] = [
    FailureKind::Acquisition,
    FailureKind::Rendering,
    FailureKind::Recognition,
    FailureKind::Parse,
];

pub fn run(output: &Output, config: &Config, folder: &Path, skip_fetch: bool, force: bool) -> Result<()> {
    output.verbose_ctx("run", &format!("Evaluating {} with {} job(s)", folder.display(), config.jobs));

    let datasets = if skip_fetch {
        Vec::new()
    } else {
        acquire(config)
    };

    let renderer = CommandRenderer::from_config(&config.renderer);
    let recognizer = CommandRecognizer::from_config(&config.recognizer);
    let marker = MarkerFile::new(&config.prepare.marker);
    let preparer = Preparer::new(Splitter::new(config.split.group_size), &renderer, &marker)
        .with_jobs(config.jobs);
    let evaluator = Evaluator::new(&recognizer, config.renderer.page_suffix.clone())
        .with_strategy(config.compare.strategy)
        .with_jobs(config.jobs);

    let summary = evaluate_folder(folder, force, datasets, &preparer, &evaluator)?;
    print_summary(output, &summary);
    Ok(())
}

pub fn fetch(output: &Output, config: &Config) -> Result<()> {
    let acquisitions = acquire(config);

    if output.is_json() {
        output.data(&acquisitions);
        return Ok(());
    }

    for acquisition in &acquisitions {
        let status = match &acquisition.status {
            AcquisitionStatus::Present => "present".to_string(),
            AcquisitionStatus::Fetched => "fetched".to_string(),
            AcquisitionStatus::Failed { reason } => format!("failed: {}", reason),
        };
        let dir = acquisition.dir.display().to_string();
        output.row(&[acquisition.name.as_str(), dir.as_str(), status.as_str()]);
    }
    Ok(())
}

pub fn prepare(output: &Output, config: &Config, folder: &Path, force: bool) -> Result<()> {
    let renderer = CommandRenderer::from_config(&config.renderer);
    let marker = MarkerFile::new(&config.prepare.marker);
    let preparation = Preparer::new(Splitter::new(config.split.group_size), &renderer, &marker)
        .with_jobs(config.jobs)
        .prepare(folder, force)?;

    if output.is_json() {
        output.data(&preparation);
        return Ok(());
    }

    for image in &preparation.images {
        output.row(&[image.display().to_string().as_str()]);
    }
    for failure in &preparation.failures {
        failure_row(output, failure);
    }
    let verb = if preparation.reused { "Reused" } else { "Prepared" };
    output.success(&format!(
        "{} {} fragment image(s) in {} ({} failure(s))",
        verb,
        preparation.images.len(),
        folder.display(),
        preparation.failures.len()
    ));
    Ok(())
}

fn acquire(config: &Config) -> Vec<Acquisition> {
    let fetcher = GitFetcher::new(&config.git.program);
    ensure_datasets(&config.datasets, Path::new("."), &fetcher)
}

fn failure_row(output: &Output, failure: &Failure) {
    let kind = format!("{} failure", failure.kind);
    let path = failure.path.display().to_string();
    output.row(&[kind.as_str(), path.as_str(), failure.reason.as_str()]);
}

fn print_summary(output: &Output, summary: &EvaluationSummary) {
    if output.is_json() {
        output.data(summary);
        return;
    }

    if !summary.fragments.is_empty() {
        output.row(&["IMAGE", "SCORE"]);
        for fragment in &summary.fragments {
            let score = match &fragment.status {
                FragmentStatus::Scored { score } => score.to_string(),
                FragmentStatus::Failed { kind, .. } => format!("{} failure", kind),
            };
            let image = fragment.image.display().to_string();
            output.row(&[image.as_str(), score.as_str()]);
        }
        output.blank();
    }

    if output.is_verbose() {
        for failure in &summary.preparation_failures {
            failure_row(output, failure);
        }
    }

    let breakdown: Vec<String> = FAILURE_KINDS
        .iter()
        .filter(|kind| summary.failures.get(**kind) > 0)
        .map(|kind| format!("{} {}", summary.failures.get(*kind), kind))
        .collect();

    println!("Total dissimilarity: {}", summary.total_score);
    if breakdown.is_empty() {
        println!("Hard failures: {}", summary.total_failures);
    } else {
        println!("Hard failures: {} ({})", summary.total_failures, breakdown.join(", "));
    }
    println!(
        "Scored fragments: {} in {:.1}s",
        summary.scored,
        (summary.finished_at - summary.started_at).num_milliseconds() as f64 / 1000.0
    );
}
