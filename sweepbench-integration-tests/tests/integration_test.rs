use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use sweepbench_client::load::Workload;
use sweepbench_common::{BenchError, ExperimentKey, SampleSet};
use sweepbench_harness::driver::{ClientDriver, InProcessDriver, ServerAddress};
use sweepbench_server::{Server, ServerConfig, ServerStats};

const SERVER_READY_TIMEOUT: Duration = Duration::from_secs(60);
const RUN_TIMEOUT: Duration = Duration::from_secs(30);

async fn start_server() -> (ServerAddress, Arc<ServerStats>) {
    let (ready_tx, ready_rx) = oneshot::channel();

    let server = Server::new(ServerConfig { address: "127.0.0.1:0".parse().unwrap() });
    let stats = server.stats();

    tokio::spawn(async move {
        server.run(ready_tx).await.expect("server failed");
    });

    let addr: SocketAddr = timeout(SERVER_READY_TIMEOUT, ready_rx)
        .await
        .expect("server did not start within 60 seconds")
        .expect("server ready signal dropped");

    (ServerAddress::new("127.0.0.1", addr.port()), stats)
}

#[tokio::test]
async fn test_counted_run_against_echo_server() {
    let (addr, stats) = start_server().await;
    let driver = InProcessDriver::new(Workload::Requests { per_worker: 25 }, None, RUN_TIMEOUT);
    let key = ExperimentKey::new("tokio", 4);

    let result = driver.run(&addr, &key).await.expect("run failed");
    assert_eq!(result.completed, 100);
    assert_eq!(result.latencies.len(), 100);
    assert_eq!(result.latencies.key(), &key);
    assert!(result.throughput > 0.0);
    assert!(result.latencies.samples().iter().all(|&us| us > 0.0));

    assert_eq!(stats.frames.load(Ordering::SeqCst), 100);
    assert_eq!(stats.connections.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_timed_run_counts_only_measurement_window() {
    let (addr, stats) = start_server().await;
    let workload = Workload::Timed {
        warmup: Duration::from_millis(100),
        measure: Duration::from_millis(300),
        cooldown: Duration::from_millis(50),
    };
    let driver = InProcessDriver::new(workload, None, RUN_TIMEOUT);

    let result = driver.run(&addr, &ExperimentKey::new("tokio", 2)).await.expect("run failed");
    assert!(result.completed > 0);
    assert!(result.elapsed >= Duration::from_millis(300));
    assert_eq!(result.latencies.len() as u64, result.completed);
    // Warm-up and cool-down requests reach the server but are not counted
    assert!(stats.frames.load(Ordering::SeqCst) > result.completed);

    let expected = result.completed as f64 / result.elapsed.as_secs_f64();
    assert!((result.throughput - expected).abs() < 1e-6);
}

#[tokio::test]
async fn test_reservoir_caps_latencies_per_worker() {
    let (addr, _) = start_server().await;
    let driver = InProcessDriver::new(Workload::Requests { per_worker: 50 }, Some(10), RUN_TIMEOUT);

    let result = driver.run(&addr, &ExperimentKey::new("tokio", 3)).await.expect("run failed");
    assert_eq!(result.completed, 150);
    assert_eq!(result.latencies.len(), 30);
}

#[tokio::test]
async fn test_nobody_listening_is_client_failure() {
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let driver = InProcessDriver::new(Workload::Requests { per_worker: 1 }, None, RUN_TIMEOUT);

    let err = driver
        .run(&ServerAddress::new("127.0.0.1", port), &ExperimentKey::new("none", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::ClientFailure(_)), "{err:?}");
}

#[tokio::test]
async fn test_repeated_runs_summarize_with_confidence_interval() {
    let (addr, _) = start_server().await;
    let driver = InProcessDriver::new(Workload::Requests { per_worker: 20 }, None, RUN_TIMEOUT);
    let key = ExperimentKey::new("tokio", 2);

    let mut throughput = SampleSet::new(key.clone());
    let mut latency = SampleSet::new(key.clone());
    for _ in 0..4 {
        let run = driver.run(&addr, &key).await.expect("run failed");
        throughput.push(run.throughput);
        latency.merge(run.latencies).expect("same key");
    }

    let summary = throughput.summarize(0.95).unwrap();
    assert_eq!(summary.count, 4);
    assert!(summary.lower() <= summary.mean && summary.mean <= summary.upper());
    assert_eq!(latency.len(), 160);

    let latency_summary = latency.summarize(0.95).unwrap();
    assert!(latency_summary.min <= latency_summary.median);
    assert!(latency_summary.median <= latency_summary.max);
    let p99 = sweepbench_stats::percentile(latency.samples(), 0.99);
    assert!(p99 >= latency_summary.median);
}
