use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const PROFILE: &str = r#"
[schema]
name = "chequing"
owner = 1
account_id = 3
header_skip_count = 1
date_format = "%Y-%m-%d"
date_column = 0
description_column = 1
amount_column = 2

[rules]
owner = 1

[[rules.categories]]
id = 1
name = "Coffee"
priority = 1

[[rules.categories.rules]]
match_text = "coffee"

[[rules.categories]]
id = 9
name = "Uncategorized"
priority = 100
is_fallback = true
"#;

fn write_profile(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("profile.toml");
    fs::write(&path, PROFILE).unwrap();
    path
}

fn sift() -> Command {
    Command::cargo_bin("sift").unwrap()
}

#[test]
fn check_lists_categories_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(&dir);
    sift()
        .arg("check")
        .arg(&profile)
        .assert()
        .success()
        .stdout(predicate::str::contains("1. Coffee (priority 1, 1 rules)"))
        .stdout(predicate::str::contains("Uncategorized otherwise"));
}

#[test]
fn parse_prints_json_preview_and_stages() {
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(&dir);
    let upload = dir.path().join("upload.csv");
    fs::write(&upload, "Date,Desc,Amount\n2024-01-15,COFFEE BAR,\"$4.50\"\n2024-01-16,RENT,1500\n").unwrap();
    let staged = dir.path().join("staged.csv");

    sift()
        .args(["parse", "--json", "--stage"])
        .arg(&staged)
        .arg(&profile)
        .arg(&upload)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"category\": \"Coffee\""))
        .stdout(predicate::str::contains("\"category\": \"Uncategorized\""));

    let text = fs::read_to_string(&staged).unwrap();
    assert!(text.contains("2024-01-16,RENT,1500.0,9,"));
}

#[test]
fn parse_reports_first_bad_row() {
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(&dir);
    let upload = dir.path().join("upload.csv");
    fs::write(&upload, "Date,Desc,Amount\n2024-01-15,COFFEE,abc\n").unwrap();

    sift()
        .arg("parse")
        .arg(&profile)
        .arg(&upload)
        .assert()
        .failure()
        .stderr(predicate::str::contains("The value (abc) on line 2 column 2 is not a number"));
}

#[test]
fn parse_collect_errors_lists_every_bad_row() {
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(&dir);
    let upload = dir.path().join("upload.csv");
    fs::write(
        &upload,
        "Date,Desc,Amount\n2024-01-15,COFFEE,abc\n\n2024-01-17,TEA,1\n2024-01-18,RENT,1e5\n",
    )
    .unwrap();

    sift()
        .args(["parse", "--collect-errors"])
        .arg(&profile)
        .arg(&upload)
        .assert()
        .failure()
        .stdout(predicate::str::contains("TEA"))
        .stderr(predicate::str::contains("amount_parse_error: The value (abc) on line 2"))
        .stderr(predicate::str::contains("amount_parse_error: The value (1e5) on line 5"))
        .stderr(predicate::str::contains("2 invalid rows"));
}

#[test]
fn recategorize_writes_changes_but_keeps_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(&dir);
    let txs = dir.path().join("txs.json");
    fs::write(
        &txs,
        r#"[
            {"id": 1, "date": "2024-01-15", "description": "COFFEE", "amount": -4.5,
             "account_id": 3, "category_id": 9},
            {"id": 2, "date": "2024-01-16", "description": "COFFEE BEANS", "amount": -20.0,
             "account_id": 3, "category_id": 9, "category_override": true}
        ]"#,
    )
    .unwrap();

    sift()
        .arg("recategorize")
        .arg(&profile)
        .arg(&txs)
        .arg("--write")
        .assert()
        .success()
        .stdout(predicate::str::contains("1: Uncategorized -> Coffee"))
        .stdout(predicate::str::contains("1 changed, 0 unchanged, 1 manual overrides kept"));

    let stored: serde_json::Value = serde_json::from_str(&fs::read_to_string(&txs).unwrap()).unwrap();
    assert_eq!(stored[0]["category_id"], 1);
    assert_eq!(stored[1]["category_id"], 9);
}
