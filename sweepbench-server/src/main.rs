use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use sweepbench_server::{Server, ServerConfig};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RuntimeFlavor {
    /// Single-threaded event loop
    CurrentThread,
    /// Work-stealing thread pool
    MultiThread,
}

#[derive(Parser, Debug)]
#[command(name = "sweepbench-server")]
struct Args {
    /// Tokio runtime the server runs on.
    #[arg(long, value_enum, default_value = "multi-thread")]
    runtime: RuntimeFlavor,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on.
    port: u16,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sweepbench=info")),
        )
        .init();

    let args = Args::parse();

    let runtime = match args.runtime {
        RuntimeFlavor::CurrentThread => tokio::runtime::Builder::new_current_thread(),
        RuntimeFlavor::MultiThread => tokio::runtime::Builder::new_multi_thread(),
    }
    .enable_all()
    .build()?;

    runtime.block_on(serve(args))
}

async fn serve(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig { address: SocketAddr::new(args.bind, args.port) };

    let mut terminate = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = terminate.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    };

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

    // Print "Listening on <addr>" once the server signals it is bound.
    tokio::spawn(async move {
        if let Ok(addr) = ready_rx.await {
            println!("Listening on {}", addr);
        }
    });

    Server::new(config).run_until(ready_tx, shutdown).await?;
    Ok(())
}
