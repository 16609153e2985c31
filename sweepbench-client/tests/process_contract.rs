use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::process::Command;
use sweepbench_common::frame::{read_frame, write_frame};
use sweepbench_common::parse_report;

const CLIENT_BIN: &str = env!("CARGO_BIN_EXE_sweepbench-client");

async fn spawn_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                while let Ok(Some(frame)) = read_frame(&mut stream).await {
                    if write_frame(&mut stream, &frame).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    addr
}

fn client(addr: SocketAddr, concurrency: u32) -> Command {
    let mut cmd = Command::new(CLIENT_BIN);
    cmd.arg(addr.ip().to_string())
        .arg(addr.port().to_string())
        .arg(concurrency.to_string())
        .args(["--warmup-secs", "0", "--measure-secs", "1", "--cooldown-ms", "0"])
        .kill_on_drop(true);
    cmd
}

#[tokio::test]
async fn test_prints_report_and_writes_latencies() {
    let addr = spawn_echo().await;
    let dir = tempfile::tempdir().unwrap();
    let latency_path = dir.path().join("latencies.txt");

    let output = tokio::time::timeout(
        Duration::from_secs(30),
        client(addr, 2).arg(&latency_path).output(),
    )
    .await
    .expect("client hung")
    .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let rate = parse_report(&stdout).unwrap();
    assert_eq!(rate.units, "msgs/s");
    assert!(rate.value > 0.0);
    assert!(stdout.trim_end().contains(" requests in "));

    let latencies: Vec<u64> = std::fs::read_to_string(&latency_path)
        .unwrap()
        .lines()
        .map(|l| l.parse().unwrap())
        .collect();
    assert!(!latencies.is_empty());
}

#[tokio::test]
async fn test_unreachable_server_exits_nonzero() {
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

    let output = tokio::time::timeout(Duration::from_secs(30), client(addr, 1).output())
        .await
        .expect("client hung")
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
