use std::time::Duration;
use sweepbench_common::{BenchError, StatsError};

#[test]
fn test_startup_failure_display() {
    let err = BenchError::StartupFailure {
        command: "./epollserver 54321".to_string(),
        reason: "exited with status 1".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Server failed to start (./epollserver 54321): exited with status 1"
    );
}

#[test]
fn test_client_failure_display() {
    let err = BenchError::ClientFailure("connection refused".to_string());
    assert_eq!(err.to_string(), "Client failure: connection refused");
}

#[test]
fn test_timeout_display() {
    let err = BenchError::Timeout { what: "server exit".to_string(), after: Duration::from_secs(5) };
    assert_eq!(err.to_string(), "Timed out after 5s waiting for server exit");
}

#[test]
fn test_stats_error_converts() {
    let err: BenchError = StatsError::ConvergenceFailure { iterations: 128 }.into();
    assert_eq!(err, BenchError::Stats(StatsError::ConvergenceFailure { iterations: 128 }));
    assert_eq!(err.to_string(), "Statistics error: Failed to converge after 128 iterations");
}

#[test]
fn test_io_error_converts() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
    let err: BenchError = io.into();
    assert_eq!(err, BenchError::Io("no such file".to_string()));
}

#[test]
fn test_error_equality() {
    let a = BenchError::ClientFailure("x".to_string());
    let b = BenchError::ClientFailure("x".to_string());
    let c = BenchError::ClientFailure("y".to_string());
    assert_eq!(a, b);
    assert_ne!(a, c);
}
