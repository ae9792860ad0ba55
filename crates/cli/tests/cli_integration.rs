//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `cmsload` binary and verify exit codes and
//! output. Every test runs in an empty temporary directory with the
//! Contentful variables cleared, so no `.env` file or shell setting leaks in.
//! None of these tests reach the network: each stops at a setup error, a
//! refusal, an unconfirmed prompt or a refused connection to a closed local
//! port.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const VARS: &[&str] = &[
    "CONTENTFUL_MANAGEMENT_TOKEN",
    "CONTENTFUL_SPACE_ID",
    "CONTENTFUL_ENVIRONMENT",
    "CONTENTFUL_PRODUCTION_ENVIRONMENT",
    "CONTENTFUL_API_URL",
    "CONTENTFUL_LOCALE",
    "LOADER_BATCH_SIZE",
    "LOADER_BATCH_DELAY_MS",
    "LOADER_RATE_LIMIT",
    "LOADER_RATE_BURST",
    "LOADER_CONCURRENCY",
    "LOADER_PAGE_SIZE",
    "LOADER_LOG_DIR",
    "RUST_LOG",
];

/// Helper: `cmsload` with a clean environment, rooted in `dir`.
fn cmsload(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("cmsload");
    cmd.current_dir(dir.path());
    for var in VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper: `cmsload` with credentials set. Any store call would go to an
/// unroutable address and fail loudly.
fn configured(dir: &TempDir) -> Command {
    let mut cmd = cmsload(dir);
    cmd.env("CONTENTFUL_MANAGEMENT_TOKEN", "test-token")
        .env("CONTENTFUL_SPACE_ID", "space1")
        .env("CONTENTFUL_API_URL", "http://127.0.0.1:9")
        .env("LOADER_LOG_DIR", dir.path().join("logs"));
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = TempDir::new().unwrap();
    cmsload(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Bulk content loading and maintenance for Contentful environments",
        ));
}

#[test]
fn help_lists_every_job() {
    let dir = TempDir::new().unwrap();
    let output = cmsload(&dir).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for job in [
        "courses",
        "councils",
        "align",
        "prune-drafts",
        "mirror",
        "export",
        "generate-migrations",
    ] {
        assert!(stdout.contains(job), "help is missing {job}:\n{stdout}");
    }
}

#[test]
fn asset_flags_are_documented() {
    let dir = TempDir::new().unwrap();
    cmsload(&dir)
        .args(["councils", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--downloads-url"));
    cmsload(&dir)
        .args(["mirror", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--asset-tag"));
    cmsload(&dir)
        .args(["generate-migrations", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--out-dir"))
        .stdout(predicate::str::contains("migrations"));
}

#[test]
fn version_exits_0() {
    let dir = TempDir::new().unwrap();
    cmsload(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cmsload"));
}

// ──────────────────────────────────────────────
// 2. Configuration errors
// ──────────────────────────────────────────────

#[test]
fn missing_token_exits_1() {
    let dir = TempDir::new().unwrap();
    cmsload(&dir)
        .env("CONTENTFUL_SPACE_ID", "space1")
        .args(["export", "--content-type", "pageCourse", "--out", "out.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("CONTENTFUL_MANAGEMENT_TOKEN"));
}

#[test]
fn missing_token_reported_as_json() {
    let dir = TempDir::new().unwrap();
    cmsload(&dir)
        .env("CONTENTFUL_SPACE_ID", "space1")
        .args(["--output", "json", "export", "--content-type", "x", "--out", "o.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("\"error\""));
}

#[test]
fn dotenv_file_supplies_settings() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        "CONTENTFUL_MANAGEMENT_TOKEN=from-file\nCONTENTFUL_SPACE_ID=space1\n",
    )
    .unwrap();
    // Credentials come from .env, so the run gets as far as the guard.
    cmsload(&dir)
        .args(["prune-drafts", "--content-type", "pageCourse"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("refusing to delete draft entries"));
}

#[test]
fn zero_batch_size_in_environment_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .env("LOADER_BATCH_SIZE", "0")
        .args(["export", "--content-type", "pageCourse", "--out", "out.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("LOADER_BATCH_SIZE must be greater than zero"));
}

#[test]
fn non_numeric_batch_size_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .env("LOADER_BATCH_SIZE", "ten")
        .args(["export", "--content-type", "pageCourse", "--out", "out.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must be a whole number"));
}

#[test]
fn unknown_rate_limit_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .env("LOADER_RATE_LIMIT", "leaky")
        .args(["export", "--content-type", "pageCourse", "--out", "out.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("LOADER_RATE_LIMIT must be one of"));
}

#[test]
fn zero_batch_size_flag_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .args([
            "--environment",
            "staging",
            "courses",
            "--feed",
            "http://127.0.0.1:9/graphql",
            "--batch-size",
            "0",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--batch-size must be greater than zero"));
}

// ──────────────────────────────────────────────
// 3. Production safety
// ──────────────────────────────────────────────

#[test]
fn prune_drafts_refused_in_production() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .args(["prune-drafts", "--content-type", "pageCourse"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "refusing to delete draft entries in production environment 'master'",
        ));
    assert!(!dir.path().join("logs").exists());
}

#[test]
fn prune_drafts_refusal_ignores_yes() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .env("CONTENTFUL_PRODUCTION_ENVIRONMENT", "live")
        .args(["--environment", "live", "--yes", "prune-drafts", "--content-type", "x"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("production environment 'live'"));
}

#[test]
fn prune_drafts_outside_production_still_asks() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .args([
            "--environment",
            "staging",
            "prune-drafts",
            "--content-type",
            "pageCourse",
            "--content-type",
            "dataCourse",
        ])
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "About to delete every draft pageCourse, dataCourse entry in the environment 'staging'",
        ))
        .stderr(predicate::str::contains("aborted: deletion not confirmed"));
    // Aborted before any store call, so nothing was logged.
    assert!(!dir.path().join("logs").exists());
}

#[test]
fn unconfirmed_production_load_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .args(["courses", "--feed", "http://127.0.0.1:9/graphql"])
        .write_stdin("no\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Type 'yes' to continue"))
        .stderr(predicate::str::contains("aborted"));
}

#[test]
fn councils_missing_dataset_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .args(["--environment", "staging", "councils", "--data-dir", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("councils.json"));
}

#[test]
fn councils_unknown_service_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .args([
            "--environment",
            "staging",
            "councils",
            "--data-dir",
            ".",
            "--only",
            "dhp,parking",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown service 'parking'"));
}

#[test]
fn align_without_pairs_exits_1() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("align.toml"),
        "[source]\nspace = \"england\"\n\n[target]\nspace = \"scotland\"\n",
    )
    .unwrap();
    configured(&dir)
        .args(["align", "--config", "align.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no [[pair]] entries"));
}

#[test]
fn mirror_into_same_environment_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .args(["--environment", "staging", "mirror", "--from", "staging", "--tag", "t"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("source and target are both 'staging'"));
}

#[test]
fn generate_migrations_unreachable_store_exits_1_without_files() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .args(["generate-migrations", "--out-dir", "model"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("migration error"));
    assert!(!dir.path().join("model").exists());
}
