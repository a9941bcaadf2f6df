//! Single-file commands: plan, split, tokens, compare

use std::path::Path;

use anyhow::{Context, Result};

use super::output::Output;
use crate::domain::{extract_tokens, AlignStrategy, OpTag, Splitter};
use crate::pipeline::{compare_files, split_score};
use crate::storage::{mscx, Config};

pub fn plan(output: &Output, config: &Config, file: &Path) -> Result<()> {
    let doc = mscx::read_file(file)?;
    let splitter = Splitter::new(config.split.group_size);
    let splits = splitter
        .plan(&doc)
        .with_context(|| format!("Failed to plan {}", file.display()))?;
    output.verbose_ctx("plan", &format!("{} split(s) of at most {} measures", splits.len(), splitter.group_size()));

    if output.is_json() {
        output.data(&splits);
        return Ok(());
    }

    output.row(&["SPLIT", "PART", "STAVES", "MEASURES"]);
    for (index, split) in splits.iter().enumerate() {
        let index = index.to_string();
        let part = split.part.to_string();
        let staves = split.staff_ids.join(",");
        let measures = format!("{}-{}", split.measures.start, split.measures.end.saturating_sub(1));
        output.row(&[index.as_str(), part.as_str(), staves.as_str(), measures.as_str()]);
    }
    Ok(())
}

pub fn split(output: &Output, config: &Config, file: &Path) -> Result<()> {
    let paths = split_score(&Splitter::new(config.split.group_size), file)?;

    if output.is_json() {
        output.data(&paths);
        return Ok(());
    }

    for path in &paths {
        output.row(&[path.display().to_string().as_str()]);
    }
    output.success(&format!("Wrote {} fragment(s) of {}", paths.len(), file.display()));
    Ok(())
}

pub fn tokens(output: &Output, file: &Path) -> Result<()> {
    let doc = mscx::read_file(file)?;
    let tokens = extract_tokens(&doc);

    if output.is_json() {
        output.data(&tokens);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }
    Ok(())
}

pub fn compare(output: &Output, result: &Path, reference: &Path, strategy: AlignStrategy) -> Result<()> {
    let comparison = compare_files(result, reference, strategy)
        .with_context(|| format!("Failed to compare {} with {}", result.display(), reference.display()))?;

    if output.is_json() {
        output.data(&comparison);
        return Ok(());
    }

    for op in comparison.opcodes.iter().filter(|op| op.tag != OpTag::Equal) {
        let tag = format!("{:?}", op.tag).to_lowercase();
        let removed = join(&comparison.result[op.a.clone()]);
        let added = join(&comparison.reference[op.b.clone()]);
        output.row(&[tag.as_str(), removed.as_str(), "->", added.as_str()]);
    }
    println!(
        "Comparing {} with {}: {}",
        result.display(),
        reference.display(),
        comparison.score
    );
    Ok(())
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}
