use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

fn write_zip(path: &Path, files: &[(&str, &[u8])]) -> anyhow::Result<PathBuf> {
    let mut writer = ZipWriter::new(File::create(path)?);
    let modified = DateTime::from_date_and_time(2024, 1, 15, 10, 30, 0)
        .map_err(|e| anyhow::anyhow!("invalid fixture time: {:?}", e))?;
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(modified)
        .unix_permissions(0o644);

    for (name, content) in files {
        writer.start_file(*name, options)?;
        writer.write_all(content)?;
    }

    writer.finish()?;
    Ok(path.to_path_buf())
}

fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn zipmerge(workdir: &Path) -> anyhow::Result<Command> {
    let mut cmd = Command::cargo_bin("zipmerge")?;
    cmd.current_dir(workdir).env_remove("RUST_LOG");
    Ok(cmd)
}

fn two_exports(dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    let first = write_zip(
        &dir.join("takeout-001.zip"),
        &[
            ("Takeout/Drive/Shared/plan.txt", b"the shared plan"),
            ("Takeout/Drive/Shared/alice.txt", b"alice's notes"),
        ],
    )?;
    let second = write_zip(
        &dir.join("takeout-002.zip"),
        &[
            ("Takeout/Drive/Shared/plan.txt", b"the shared plan"),
            ("Takeout/Drive/Shared/bob.txt", b"bob's notes"),
        ],
    )?;
    Ok((first, second))
}

#[test]
fn test_merge_then_rerun_is_idempotent() -> anyhow::Result<()> {
    let workdir = tempdir()?;
    let (first, second) = two_exports(workdir.path())?;
    let dest = workdir.path().join("merged");

    zipmerge(workdir.path())?
        .arg(&dest)
        .arg(&first)
        .arg(&second)
        .arg("--auto")
        .assert()
        .success()
        .stdout(predicate::str::contains("Extraction Log for"));

    let shared = dest.join("Takeout/Drive/Shared");
    assert_eq!(fs::read(shared.join("alice.txt"))?, b"alice's notes");
    assert_eq!(fs::read(shared.join("bob.txt"))?, b"bob's notes");
    let after_first = snapshot(&dest);

    zipmerge(workdir.path())?
        .arg(&dest)
        .arg(&first)
        .arg(&second)
        .arg("--auto")
        .assert()
        .success()
        .stdout(predicate::str::contains("Everything already extracted"));

    assert_eq!(snapshot(&dest), after_first);
    Ok(())
}

#[test]
fn test_dry_run_writes_nothing() -> anyhow::Result<()> {
    let workdir = tempdir()?;
    let (first, _) = two_exports(workdir.path())?;
    let dest = workdir.path().join("merged");

    zipmerge(workdir.path())?
        .arg(&dest)
        .arg(&first)
        .args(["--auto", "--dry-run"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("DRY RUN")
                .and(predicate::str::contains("Takeout/Drive/Shared/plan.txt")),
        );

    assert!(!dest.exists());
    Ok(())
}

#[test]
fn test_base_path_and_csv_log() -> anyhow::Result<()> {
    let workdir = tempdir()?;
    let (first, second) = two_exports(workdir.path())?;
    let dest = workdir.path().join("merged");
    let log = workdir.path().join("merge-log.csv");

    zipmerge(workdir.path())?
        .arg(&dest)
        .arg(&first)
        .arg(&second)
        .args(["--auto", "--base-path", "Takeout/Drive", "--workers", "2"])
        .arg("--log")
        .arg(&log)
        .assert()
        .success();

    assert!(dest.join("Shared/plan.txt").is_file());
    assert!(!dest.join("Takeout").exists());

    let mut reader = csv::Reader::from_path(&log)?;
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    assert_eq!(
        headers,
        ["Timestamp", "Path", "DestPath", "Size", "Status", "Reason", "DryRun"]
    );

    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 4);
    let skipped = rows
        .iter()
        .filter(|row| &row[4] == "Skipped")
        .count();
    assert_eq!(skipped, 1);
    assert!(rows.iter().all(|row| &row[6] == "false"));
    Ok(())
}

#[test]
fn test_corrupt_archive_is_skipped() -> anyhow::Result<()> {
    let workdir = tempdir()?;
    let (first, _) = two_exports(workdir.path())?;
    let broken = workdir.path().join("takeout-broken.zip");
    fs::write(&broken, b"PK\x03\x04 cut off mid-download")?;
    let dest = workdir.path().join("merged");

    zipmerge(workdir.path())?
        .arg(&dest)
        .arg(&broken)
        .arg(&first)
        .arg("--auto")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Skipping ZIP due to error"));

    assert!(dest.join("Takeout/Drive/Shared/alice.txt").is_file());
    Ok(())
}

#[test]
fn test_json_output_is_line_delimited() -> anyhow::Result<()> {
    let workdir = tempdir()?;
    let (first, _) = two_exports(workdir.path())?;
    let dest = workdir.path().join("merged");

    let output = zipmerge(workdir.path())?
        .arg(&dest)
        .arg(&first)
        .args(["--auto", "--output-format", "json"])
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let records = stdout
        .lines()
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<Result<Vec<_>, _>>()?;

    let extracted = records
        .iter()
        .filter(|v| v["type"] == "record" && v["record"]["status"] == "Extracted")
        .count();
    assert_eq!(extracted, 2);
    assert!(records.iter().any(|v| v["type"] == "run_summary"));
    Ok(())
}

#[test]
fn test_generate_config() -> anyhow::Result<()> {
    let workdir = tempdir()?;
    let config_path = workdir.path().join("custom.toml");

    zipmerge(workdir.path())?
        .arg("--generate-config")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated sample configuration file"));

    let content = fs::read_to_string(&config_path)?;
    assert!(content.contains("[extraction]"));
    assert!(content.contains("workers = 4"));
    Ok(())
}

#[test]
fn test_config_file_is_picked_up() -> anyhow::Result<()> {
    let workdir = tempdir()?;
    let (first, _) = two_exports(workdir.path())?;
    let dest = workdir.path().join("merged");
    fs::write(
        workdir.path().join("zipmerge.toml"),
        "[extraction]\nstart_path = \"Takeout/Drive/Shared\"\n\n[output]\nauto_confirm = true\n",
    )?;

    zipmerge(workdir.path())?
        .arg(&dest)
        .arg(&first)
        .assert()
        .success();

    assert!(dest.join("alice.txt").is_file());
    Ok(())
}

#[test]
fn test_missing_arguments() -> anyhow::Result<()> {
    let workdir = tempdir()?;
    zipmerge(workdir.path())?
        .arg(workdir.path().join("merged"))
        .assert()
        .failure();
    Ok(())
}
