//! Runs the `filepulse` binary end to end

use filepulse::protocol::mock::MockServer;
use filepulse::workflow::WorkerResult;
use tokio::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_filepulse");

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_mode_writes_reports() {
    let server = MockServer::start().await.unwrap();
    let address = server.address();
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("report.json");
    let csv_path = dir.path().join("results.csv");

    let output = Command::new(BIN)
        .args(["--server", address.as_str(), "--file-size", "2k", "--workers", "3"])
        .args(["--seed", "5", "--per-worker-output"])
        .arg("--json-output")
        .arg(&json_path)
        .arg("--csv-output")
        .arg(&csv_path)
        .output()
        .await
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("TEST RESULTS"));
    assert!(stdout.contains("Per-Worker Results"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(report["test_info"]["workers"], 3);
    assert_eq!(report["upload"]["successful"], 3);
    assert_eq!(report["download"]["successful"], 3);
    assert_eq!(report["per_worker"].as_array().unwrap().len(), 3);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.lines().nth(1).unwrap().contains(",2048,3,shared,3,0,"));

    assert_eq!(server.stored_files().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_mode_prints_one_json_line() {
    let server = MockServer::start().await.unwrap();
    let address = server.address();

    let output = Command::new(BIN)
        .args(["--mode", "worker", "--server", address.as_str()])
        .args(["--file-size", "1024", "--worker-id", "9", "--seed", "3", "--tag", "w"])
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);

    let result: WorkerResult = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(result.worker_id, 9);
    assert_eq!(result.filename, "w_testfile_9_1kb.dat");
    assert!(result.upload_succeeded());
    assert!(result.download_succeeded());
}

#[tokio::test]
async fn dry_run_does_not_connect() {
    let server = MockServer::start().await.unwrap();
    let address = server.address();

    let output = Command::new(BIN)
        .args(["--server", address.as_str(), "--dry-run"])
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Dry run mode"));
    assert_eq!(server.connection_count(), 0);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let output = Command::new(BIN)
        .args(["--server", "no-port-here", "--dry-run"])
        .output()
        .await
        .unwrap();

    assert!(!output.status.success());
}
