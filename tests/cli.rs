use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fleetdocs(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fleetdocs").unwrap();
    cmd.env("HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("FLEETDOCS_REGISTRY_KEY");
    cmd
}

fn initialized() -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let data_dir = home.path().join("data");
    fleetdocs(home.path())
        .args(["init", "--data-dir", data_dir.to_str().unwrap(), "--company", "Sharma Roadlines"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized fleetdocs"));
    home
}

#[test]
fn commands_require_init() {
    let home = tempfile::tempdir().unwrap();
    fleetdocs(home.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("fleetdocs init"));
}

#[test]
fn add_vehicle_and_show_status() {
    let home = initialized();
    fleetdocs(home.path())
        .args(["vehicles", "add", "mh 12 ab-1234", "--registration-date", "2015-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added vehicle: MH12AB1234"));

    fleetdocs(home.path())
        .args(["vehicles", "add", "MH12AB1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    fleetdocs(home.path())
        .args(["vehicles", "set-doc", "MH12AB1234", "--doc", "insurance", "--expiry", "2000-01-01", "--cost", "15000"])
        .assert()
        .success();

    fleetdocs(home.path())
        .args(["status", "--only", "expired"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MH12AB1234"))
        .stdout(predicate::str::contains("Expired"));

    fleetdocs(home.path())
        .args(["status", "--doc", "licence"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown document type"));

    fleetdocs(home.path())
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sharma Roadlines"))
        .stdout(predicate::str::contains("Vehicles:        1"));
}

#[test]
fn invalid_registration_rejected() {
    let home = initialized();
    fleetdocs(home.path())
        .args(["vehicles", "add", "not a plate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid registration number"));
}

#[test]
fn summary_rejects_half_open_range() {
    let home = initialized();
    fleetdocs(home.path())
        .args(["summary", "--from", "2025-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from requires --to"));

    fleetdocs(home.path())
        .args(["summary", "--window", "this-month"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Renewals in window"));
}

#[test]
fn import_then_export_csv() {
    let home = initialized();
    let csv_path = home.path().join("fleet.csv");
    std::fs::write(
        &csv_path,
        "registration_number,registration_date,tax_expiry_date,tax_amount\n\
         MH12AB1234,2020-01-15,2001-03-31,12000\n\
         KA01CD5678,,2001-03-31,\n\
         bogus,,,\n",
    )
    .unwrap();

    fleetdocs(home.path())
        .args(["import", csv_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 added, 0 updated"))
        .stdout(predicate::str::contains("1 rows skipped"));

    fleetdocs(home.path())
        .args(["import", csv_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("already been imported"));

    let out = home.path().join("status.csv");
    fleetdocs(home.path())
        .args(["export", "csv", "--output", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 vehicles"));

    let content = std::fs::read_to_string(&out).unwrap();
    let mut lines = content.lines();
    assert!(lines
        .next()
        .unwrap()
        .starts_with("Registration Number,RC Status,RC Expiry,Insurance Status"));
    assert_eq!(lines.next().unwrap(), "KA01CD5678,missing,,missing,,missing,,missing,,missing,,expired,2001-03-31");
    assert!(lines.next().unwrap().starts_with("MH12AB1234,valid,2035-01-15,"));

    fleetdocs(home.path())
        .args(["renewals", "--from", "2001-01-01", "--to", "2001-12-31"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MH12AB1234"))
        .stdout(predicate::str::contains("\u{20b9}12,900.00"));
}

#[test]
fn docs_attach_list_and_view() {
    let home = initialized();
    fleetdocs(home.path())
        .args(["vehicles", "add", "MH12AB1234"])
        .assert()
        .success();
    fleetdocs(home.path())
        .args(["docs", "attach", "MH12AB1234", "--doc", "puc", "https://files.test/puc/MH12AB1234.pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Attached PUC file"));
    fleetdocs(home.path())
        .args(["docs", "attach", "MH12AB1234", "--doc", "puc", "https://files.test/puc/MH12AB1234.pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already attached"));
    fleetdocs(home.path())
        .args(["docs", "list", "MH12AB1234"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PDF"));
    fleetdocs(home.path())
        .args(["docs", "view", "https://files.test/permit.docx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unable to preview"));
}
