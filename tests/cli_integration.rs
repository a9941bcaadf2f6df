//! CLI integration tests for omr-eval
//!
//! These tests run the binary against small MuseScore files written to a
//! temporary directory. The end-to-end tests stand in shell one-liners for
//! the renderer and the recognizer.

use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command instance for the omr-eval binary
fn omr_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("omr-eval"))
}

/// Command running inside `dir`, isolated from any user configuration
fn omr_in(dir: &Path) -> assert_cmd::Command {
    let mut cmd = omr_cmd();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("OMR_EVAL_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// A single-staff score of `measures` measures: measure 0 holds a key
/// signature and a rest, every other measure one note, measure 3 ends a line
fn score_xml(measures: usize) -> String {
    let mut body = String::new();
    for i in 0..measures {
        body.push_str("      <Measure>\n        <voice>\n");
        if i == 0 {
            body.push_str("          <KeySig><accidental>-2</accidental></KeySig>\n");
            body.push_str("          <Rest><durationType>measure</durationType><duration>4/4</duration></Rest>\n");
        } else {
            body.push_str(&format!(
                "          <Chord><durationType>whole</durationType><Note><pitch>{}</pitch></Note></Chord>\n",
                60 + i
            ));
        }
        body.push_str("        </voice>\n");
        if i == 3 {
            body.push_str("        <LayoutBreak><subtype>line</subtype></LayoutBreak>\n");
        }
        body.push_str("      </Measure>\n");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<museScore version="4.20">
  <Score>
    <Division>480</Division>
    <Part>
      <Staff id="1"/>
      <trackName>Voice</trackName>
    </Part>
    <Staff id="1">
{}    </Staff>
  </Score>
</museScore>
"#,
        body
    )
}

fn write_score(dir: &Path, name: &str, measures: usize) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, score_xml(measures)).unwrap();
    path
}

// =============================================================================
// Tokens
// =============================================================================

#[test]
fn test_tokens_prints_sequence() {
    let dir = TempDir::new().unwrap();
    write_score(dir.path(), "song.mscx", 3);

    omr_in(dir.path())
        .args(["tokens", "song.mscx"])
        .assert()
        .success()
        .stdout("Key -2\nRest 4/4\nNote 61\nNote 62\n");
}

#[test]
fn test_tokens_json() {
    let dir = TempDir::new().unwrap();
    write_score(dir.path(), "song.mscx", 2);

    let output = omr_in(dir.path())
        .args(["--format", "json", "tokens", "song.mscx"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let tokens: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tokens, vec!["Key -2", "Rest 4/4", "Note 61"]);
}

#[test]
fn test_tokens_missing_file_fails() {
    let dir = TempDir::new().unwrap();

    omr_in(dir.path())
        .args(["tokens", "missing.mscx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

// =============================================================================
// Plan and split
// =============================================================================

#[test]
fn test_plan_nine_measures() {
    let dir = TempDir::new().unwrap();
    write_score(dir.path(), "song.mscx", 9);

    omr_in(dir.path())
        .args(["plan", "song.mscx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0\t0\t1\t0-3"))
        .stdout(predicate::str::contains("1\t0\t1\t4-7"))
        .stdout(predicate::str::contains("2\t0\t1\t8-8"));
}

#[test]
fn test_plan_json_respects_group_size() {
    let dir = TempDir::new().unwrap();
    write_score(dir.path(), "song.mscx", 5);
    fs::write(dir.path().join("omr-eval.toml"), "[split]\ngroup_size = 2\n").unwrap();

    let output = omr_in(dir.path())
        .args(["-f", "json", "plan", "song.mscx"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let splits: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let splits = splits.as_array().unwrap();
    assert_eq!(splits.len(), 3);
    assert_eq!(splits[2]["measures"]["start"], 4);
    assert_eq!(splits[2]["measures"]["end"], 5);
    assert_eq!(splits[0]["staff_ids"][0], "1");
}

#[test]
fn test_split_writes_fragments_with_carried_key() {
    let dir = TempDir::new().unwrap();
    write_score(dir.path(), "song.mscx", 9);

    omr_in(dir.path())
        .args(["split", "song.mscx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 3 fragment(s)"));

    for i in 0..3 {
        assert!(dir.path().join(format!("split_{}.mscx", i)).is_file());
    }

    // Fragment 0 keeps its own key signature exactly once
    omr_in(dir.path())
        .args(["tokens", "split_0.mscx"])
        .assert()
        .success()
        .stdout("Key -2\nRest 4/4\nNote 61\nNote 62\nNote 63\n");

    // Fragment 1 starts at measure 4 and gets the key signature carried over
    omr_in(dir.path())
        .args(["tokens", "split_1.mscx"])
        .assert()
        .success()
        .stdout("Key -2\nNote 64\nNote 65\nNote 66\nNote 67\n");

    let fragment0 = fs::read_to_string(dir.path().join("split_0.mscx")).unwrap();
    assert!(!fragment0.contains("LayoutBreak"));
}

#[test]
fn test_split_rejects_non_score() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("other.xml"), "<score-partwise/>").unwrap();

    omr_in(dir.path())
        .args(["split", "other.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Score"));
}

// =============================================================================
// Compare
// =============================================================================

#[test]
fn test_compare_identical_scores_zero() {
    let dir = TempDir::new().unwrap();
    write_score(dir.path(), "a.mscx", 4);
    write_score(dir.path(), "b.mscx", 4);

    omr_in(dir.path())
        .args(["compare", "a.mscx", "b.mscx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Comparing a.mscx with b.mscx: 0"));
}

#[test]
fn test_compare_counts_missing_tokens() {
    let dir = TempDir::new().unwrap();
    write_score(dir.path(), "result.mscx", 2);
    write_score(dir.path(), "reference.mscx", 5);

    omr_in(dir.path())
        .args(["compare", "result.mscx", "reference.mscx", "--strategy", "matching-blocks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("insert"))
        .stdout(predicate::str::contains(": 3"));
}

#[test]
fn test_compare_json() {
    let dir = TempDir::new().unwrap();
    write_score(dir.path(), "result.mscx", 5);
    write_score(dir.path(), "reference.mscx", 4);

    let output = omr_in(dir.path())
        .args(["--format", "json", "compare", "result.mscx", "reference.mscx"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let comparison: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(comparison["score"], 1);
    assert_eq!(comparison["reference"].as_array().unwrap().len(), 5);
    assert_eq!(comparison["opcodes"][1]["tag"], "delete");
}

#[test]
fn test_compare_musicxml_result_scores_reference_length() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("result.musicxml"),
        r#"<score-partwise version="3.1"><part-list/></score-partwise>"#,
    )
    .unwrap();
    write_score(dir.path(), "reference.mscx", 2);

    omr_in(dir.path())
        .args(["compare", "result.musicxml", "reference.mscx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Comparing result.musicxml with reference.mscx: 3"));
}

#[test]
fn test_compare_unparsable_result_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("result.mscx"), "<museScore>").unwrap();
    write_score(dir.path(), "reference.mscx", 2);

    omr_in(dir.path())
        .args(["compare", "result.mscx", "reference.mscx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to compare"));
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_init_and_show() {
    let dir = TempDir::new().unwrap();

    omr_in(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));
    assert!(dir.path().join("omr-eval.toml").is_file());

    omr_in(dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    omr_in(dir.path())
        .args(["config", "init", "--force"])
        .assert()
        .success();

    omr_in(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("group_size = 4"))
        .stdout(predicate::str::contains("marker = \"prepare_done.txt\""))
        .stdout(predicate::str::contains("https://github.com/OpenScore/Lieder"));
}

#[test]
fn test_config_show_explicit_path_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(&path, "jobs = 3\n[compare]\nstrategy = \"matching-blocks\"\n").unwrap();

    let output = omr_in(dir.path())
        .args(["--format", "json", "--config", "custom.toml", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["jobs"], 3);
    assert_eq!(config["compare"]["strategy"], "matching-blocks");
    assert_eq!(config["split"]["group_size"], 4);
}

#[test]
fn test_invalid_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_score(dir.path(), "song.mscx", 4);
    fs::write(dir.path().join("omr-eval.toml"), "[split]\ngroup_size = 0\n").unwrap();

    omr_in(dir.path())
        .args(["plan", "song.mscx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("group_size"));
}

// =============================================================================
// Batch
// =============================================================================

#[test]
fn test_prepare_missing_folder_fails() {
    let dir = TempDir::new().unwrap();

    omr_in(dir.path())
        .args(["prepare", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Folder not found"));
}

#[test]
fn test_run_rejects_zero_jobs() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("scores")).unwrap();

    omr_in(dir.path())
        .args(["run", "--skip-fetch", "--folder", "scores", "--jobs", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("jobs"));
}

/// Renderer copies the fragment to `{stem}-1.png`; recognizer copies the
/// image to `{stem}.musicxml`, so recognition is perfect
#[cfg(unix)]
const COPYING_TOOLS: &str = r#"
folder = "scores"

[renderer]
program = "sh"
args = ["-c", 'cp "$0" "${1%.png}-1.png"', "{input}", "{output}"]

[recognizer]
program = "sh"
args = ["-c", 'cp "$0" "${0%.png}.musicxml"', "{input}"]
"#;

#[cfg(unix)]
fn setup_batch(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let song = dir.path().join("scores").join("song");
    fs::create_dir_all(&song).unwrap();
    write_score(&song, "lc1.mscx", 9);
    fs::write(dir.path().join("omr-eval.toml"), config).unwrap();
    dir
}

#[cfg(unix)]
#[test]
fn test_run_end_to_end() {
    let dir = setup_batch(COPYING_TOOLS);

    omr_in(dir.path())
        .args(["run", "--skip-fetch"])
        .assert()
        .success()
        .stdout(predicate::str::contains("split_2-1.png\t0"))
        .stdout(predicate::str::contains("Total dissimilarity: 0"))
        .stdout(predicate::str::contains("Hard failures: 0"));

    let song = dir.path().join("scores").join("song");
    assert!(song.join("split_1-1.png").is_file());
    assert!(song.join("split_1-1.musicxml").is_file());
    assert!(dir.path().join("scores").join("prepare_done.txt").is_file());
}

#[cfg(unix)]
#[test]
fn test_run_json_reuses_preparation() {
    let dir = setup_batch(COPYING_TOOLS);

    omr_in(dir.path())
        .args(["prepare", "--jobs", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prepared 3 fragment image(s)"));

    let output = omr_in(dir.path())
        .args(["--format", "json", "run", "--skip-fetch"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["reused_preparation"], true);
    assert_eq!(summary["total_score"], 0);
    assert_eq!(summary["scored"], 3);
    assert_eq!(summary["fragments"].as_array().unwrap().len(), 3);
    assert_eq!(summary["fragments"][0]["status"], "scored");
}

#[cfg(unix)]
#[test]
fn test_run_counts_recognition_failures() {
    let config = r#"
folder = "scores"

[renderer]
program = "sh"
args = ["-c", 'cp "$0" "${1%.png}-1.png"', "{input}", "{output}"]

[recognizer]
program = "false"
"#;
    let dir = setup_batch(config);

    // Hard failures are reported, not fatal
    omr_in(dir.path())
        .args(["run", "--skip-fetch"])
        .assert()
        .success()
        .stdout(predicate::str::contains("split_0-1.png\trecognition failure"))
        .stdout(predicate::str::contains("Hard failures: 3 (3 recognition)"));
}

#[cfg(unix)]
#[test]
fn test_run_counts_rendering_failures() {
    let config = r#"
folder = "scores"

[renderer]
program = "false"
"#;
    let dir = setup_batch(config);

    omr_in(dir.path())
        .args(["run", "--skip-fetch", "--jobs", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total dissimilarity: 0"))
        .stdout(predicate::str::contains("Hard failures: 3 (3 rendering)"));
}
