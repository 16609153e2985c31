use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use sweepbench_client::load::Workload;
use sweepbench_harness::config::{RunSettings, ServerSpec};
use sweepbench_harness::driver::InProcessDriver;
use sweepbench_harness::runner::{SweepState, TrialRunner};
use sweepbench_harness::server::pick_free_port;
use sweepbench_harness::table::Metric;
use sweepbench_common::ExperimentKey;

const SERVER_BIN: &str = env!("CARGO_BIN_EXE_sweepbench-server");

#[tokio::test]
async fn test_exits_zero_on_sigterm() {
    let port = pick_free_port().unwrap();
    let mut child = Command::new(SERVER_BIN)
        .arg("--runtime")
        .arg("current-thread")
        .arg(port.to_string())
        .stdout(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(child.try_wait().unwrap().is_none(), "server exited early");

    let pid = child.id().unwrap().to_string();
    let killed = Command::new("kill").arg("-TERM").arg(&pid).status().await.unwrap();
    assert!(killed.success());

    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("server ignored SIGTERM")
        .unwrap();
    assert!(status.success(), "exit status {status}");
}

#[tokio::test]
async fn test_rejects_missing_port() {
    let status = Command::new(SERVER_BIN)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .unwrap();
    assert!(!status.success());
}

#[tokio::test]
async fn test_full_sweep_against_server_process() {
    let settings = RunSettings {
        trials: 2,
        concurrency_levels: vec![1, 2],
        readiness_delay: Duration::from_millis(500),
        confidence_level: 0.95,
        host: "127.0.0.1".to_string(),
        stop_timeout: Duration::from_secs(5),
    };
    let driver = InProcessDriver::new(
        Workload::Requests { per_worker: 50 },
        None,
        Duration::from_secs(30),
    );
    let spec = ServerSpec::new(
        "tokio-multi-thread",
        vec![SERVER_BIN.to_string(), "--runtime".to_string(), "multi-thread".to_string()],
    );

    let mut runner = TrialRunner::new(settings, driver);
    let table = runner.run_sweep(&spec).await.expect("sweep failed");
    assert_eq!(runner.state(), SweepState::Done);

    for concurrency in [1, 2] {
        let key = ExperimentKey::new("tokio-multi-thread", concurrency);
        let throughput = table.summary(&key, Metric::Throughput).unwrap();
        assert_eq!(throughput.count, 2);
        assert!(throughput.mean > 0.0);
        let latency = table.summary(&key, Metric::Latency).unwrap();
        assert_eq!(latency.count, 2 * 50 * concurrency as usize);
    }
    assert!(table.missing.is_empty());
}
