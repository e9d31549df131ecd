//! Tests for CLI parsing and end-to-end command runs against a fixture file.

use std::path::{Path, PathBuf};

use clap::Parser;
use tempfile::TempDir;

use invoice_group_notify::initialization::init_ledger;
use invoice_group_notify::{
    run_command, Claim, NotificationState, Command, Config, LogFormat, NotificationOutcome, Opt, QuoteStyle, RunReport,
};

#[path = "helpers.rs"]
mod helpers;

use helpers::{fixture_data, GROUP_812_CSV};

fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.json");
    let json = serde_json::to_string_pretty(&fixture_data()).expect("fixture should serialize");
    std::fs::write(&path, json).expect("Failed to write fixture");
    path
}

fn opt(dir: &TempDir, args: &[&str]) -> Opt {
    let fixture = write_fixture(dir.path());
    let db = dir.path().join("ledger.db");
    let outbox = dir.path().join("outbox");
    let mut argv = vec![
        "invoice_group_notify".to_string(),
        "--fixture".to_string(),
        fixture.to_string_lossy().to_string(),
        "--db-path".to_string(),
        db.to_string_lossy().to_string(),
        "--outbox".to_string(),
        outbox.to_string_lossy().to_string(),
        "--send-retries".to_string(),
        "0".to_string(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    Opt::try_parse_from(argv).expect("arguments should parse")
}

#[test]
fn test_defaults() {
    let opt = Opt::try_parse_from(["invoice_group_notify", "--fixture", "f.json", "sweep"]).unwrap();
    assert!(matches!(opt.log_format, LogFormat::Plain));
    assert_eq!(opt.outbox, PathBuf::from("./outbox"));
    let config = Config::from(&opt);
    assert_eq!(config.quote_style, QuoteStyle::Naive);
    assert_eq!(config.send_retries, 2);
    assert_eq!(config.max_concurrency, 4);
}

#[test]
fn test_export_output_flag() {
    let opt = Opt::try_parse_from([
        "invoice_group_notify",
        "--fixture",
        "f.json",
        "export",
        "812",
        "--output",
        "out.csv",
    ])
    .unwrap();
    match opt.command {
        Command::Export { group_id, output } => {
            assert_eq!(group_id, 812);
            assert_eq!(output, Some(PathBuf::from("out.csv")));
        }
        other => panic!("expected export, got {:?}", other),
    }
}

#[test]
fn test_rejects_bad_values() {
    assert!(Opt::try_parse_from([
        "invoice_group_notify",
        "--fixture",
        "f.json",
        "--quote-style",
        "fancy",
        "sweep"
    ])
    .is_err());
    assert!(
        Opt::try_parse_from(["invoice_group_notify", "--fixture", "f.json", "notify", "abc"])
            .is_err()
    );
    assert!(Opt::try_parse_from(["invoice_group_notify", "sweep"]).is_err());
}

#[tokio::test]
async fn test_notify_command_writes_outbox() {
    let dir = TempDir::new().unwrap();
    let opt = opt(&dir, &["notify", "812"]);

    match run_command(&opt).await.unwrap() {
        RunReport::Notify(NotificationOutcome::Sent { group_id, .. }) => assert_eq!(group_id, 812),
        other => panic!("expected Sent, got {:?}", other),
    }

    let messages: Vec<PathBuf> = std::fs::read_dir(&opt.outbox)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert!(message.join("message.json").exists());
    assert!(message.join("Related Invoice PDFs.zip").exists());
    assert_eq!(
        std::fs::read_to_string(message.join("Invoice Details.csv")).unwrap(),
        GROUP_812_CSV
    );

    // The ledger file persists the flag across runs
    match run_command(&opt).await.unwrap() {
        RunReport::Notify(outcome) => {
            assert_eq!(outcome, NotificationOutcome::AlreadyNotified { group_id: 812 })
        }
        other => panic!("expected Notify, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sweep_command() {
    let dir = TempDir::new().unwrap();
    let opt = opt(&dir, &["sweep"]);

    match run_command(&opt).await.unwrap() {
        RunReport::Sweep(report) => {
            assert_eq!(report.total, 2);
            assert_eq!(report.sent, 1);
            assert_eq!(report.skipped, 1);
        }
        other => panic!("expected Sweep, got {:?}", other),
    }
}

#[tokio::test]
async fn test_export_command_writes_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("details.csv");
    let output_arg = output.to_string_lossy().to_string();
    let opt = opt(&dir, &["export", "812", "--output", &output_arg]);

    match run_command(&opt).await.unwrap() {
        RunReport::Export {
            rows_written,
            warnings,
            ..
        } => {
            assert_eq!(rows_written, 2);
            assert_eq!(warnings, 0);
        }
        other => panic!("expected Export, got {:?}", other),
    }
    assert_eq!(std::fs::read_to_string(&output).unwrap(), GROUP_812_CSV);
    assert!(!opt.outbox.exists());
}

#[tokio::test]
async fn test_missing_fixture_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut opt = opt(&dir, &["sweep"]);
    opt.fixture = dir.path().join("missing.json");
    let err = run_command(&opt).await.unwrap_err();
    assert!(err.to_string().contains("Failed to read fixture"));
}

#[tokio::test]
async fn test_sweep_leaves_live_claim_alone() {
    let dir = TempDir::new().unwrap();
    let opt = opt(&dir, &["sweep"]);

    // A record-save trigger in another process has just claimed 812
    let other = init_ledger(&opt.db_path).await.unwrap();
    assert_eq!(other.claim(812).await.unwrap(), Claim::Claimed);

    match run_command(&opt).await.unwrap() {
        RunReport::Sweep(report) => {
            assert_eq!(report.sent, 0);
            assert!(report.outcomes.iter().all(|o| o.group_id() != 812));
        }
        other => panic!("expected Sweep, got {:?}", other),
    }
    assert!(!opt.outbox.exists());
    assert_eq!(
        other.state(812).await.unwrap(),
        Some(NotificationState::Sending)
    );
    assert!(other.mark_sent(812).await.unwrap());
}

#[tokio::test]
async fn test_sweep_requeues_expired_claim() {
    let dir = TempDir::new().unwrap();
    let mut opt = opt(&dir, &["sweep"]);
    opt.claim_timeout_secs = 0;

    let crashed = init_ledger(&opt.db_path).await.unwrap();
    crashed.claim(812).await.unwrap();

    match run_command(&opt).await.unwrap() {
        RunReport::Sweep(report) => assert_eq!(report.sent, 1),
        other => panic!("expected Sweep, got {:?}", other),
    }
    assert!(crashed.is_sent(812).await.unwrap());
}
