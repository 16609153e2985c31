use std::fmt;
use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use sweepbench_common::{BenchError, Result};

/// Program plus argument vector for a server under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Split `[program, args...]`.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| BenchError::Config("empty server command".to_string()))?;
        Ok(Self { program: program.clone(), args: args.to_vec() })
    }

    /// Servers take their listen port as the final argument.
    pub fn with_port(&self, port: u16) -> Self {
        self.clone().arg(port.to_string())
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Lifecycle of a [`ServerHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted,
    Starting,
    Running,
    Stopped,
}

/// Exclusive owner of one server process.
///
/// Dropping a handle that was never stopped terminates the process, so a
/// panicking or cancelled sweep cannot leak a server.
pub struct ServerHandle {
    command: ServerCommand,
    child: Option<Child>,
    pid: Option<u32>,
    state: ServerState,
    stop_timeout: Duration,
}

impl ServerHandle {
    pub fn new(command: ServerCommand, stop_timeout: Duration) -> Self {
        Self { command, child: None, pid: None, state: ServerState::NotStarted, stop_timeout }
    }

    /// Spawn `command`, wait `readiness_delay`, and verify it is still alive.
    pub async fn start(
        command: ServerCommand,
        readiness_delay: Duration,
        stop_timeout: Duration,
    ) -> Result<Self> {
        let mut handle = Self::new(command, stop_timeout);
        handle.spawn(readiness_delay).await?;
        Ok(handle)
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    pub fn command(&self) -> &ServerCommand {
        &self.command
    }

    /// Launch the process. The readiness check is a fixed grace period followed
    /// by a liveness probe, not a handshake; a process that has exited by then
    /// is a `StartupFailure` and is not retried.
    pub async fn spawn(&mut self, readiness_delay: Duration) -> Result<()> {
        if self.state != ServerState::NotStarted {
            return Err(self.startup_failure(format!("handle is already {:?}", self.state)));
        }
        self.state = ServerState::Starting;

        let child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                self.state = ServerState::Stopped;
                return Err(self.startup_failure(format!("spawn failed: {e}")));
            }
        };
        self.pid = child.id();
        self.child = Some(child);
        debug!(command = %self.command, pid = ?self.pid, ?readiness_delay, "server spawned");

        tokio::time::sleep(readiness_delay).await;

        let probe = match self.child.as_mut() {
            Some(child) => child.try_wait(),
            None => Ok(None),
        };
        match probe {
            Ok(None) => {
                self.state = ServerState::Running;
                info!(command = %self.command, pid = ?self.pid, "server running");
                Ok(())
            }
            Ok(Some(status)) => {
                self.child = None;
                self.state = ServerState::Stopped;
                Err(self.startup_failure(format!("exited during readiness delay ({status})")))
            }
            Err(e) => {
                if let Err(stop_err) = self.stop().await {
                    warn!(command = %self.command, "stopping unprobed server failed: {stop_err}");
                }
                Err(self.startup_failure(format!("liveness probe failed: {e}")))
            }
        }
    }

    /// Terminate the process and wait for it to exit.
    ///
    /// Safe to call repeatedly and after the process exited on its own. Sends
    /// SIGTERM, then SIGKILL if the process outlives `stop_timeout`, in which
    /// case `Timeout` is returned after the process has been reaped.
    pub async fn stop(&mut self) -> Result<()> {
        self.state = ServerState::Stopped;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Some(status) = child.try_wait()? {
            debug!(command = %self.command, %status, "server already exited");
            return Ok(());
        }

        if let Some(pid) = self.pid {
            // The process may exit between the probe and the signal.
            if let Err(e) = send_sigterm(pid) {
                debug!(pid, "SIGTERM not delivered: {e}");
            }
        }

        match timeout(self.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                if status.success() {
                    debug!(command = %self.command, "server stopped");
                } else {
                    warn!(command = %self.command, %status, "server did not exit cleanly");
                }
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(command = %self.command, "server ignored SIGTERM; killing");
                child.kill().await?;
                Err(BenchError::Timeout {
                    what: format!("server exit ({})", self.command),
                    after: self.stop_timeout,
                })
            }
        }
    }

    fn startup_failure(&self, reason: String) -> BenchError {
        BenchError::StartupFailure { command: self.command.to_string(), reason }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if matches!(child.try_wait(), Ok(None)) {
            warn!(
                command = %self.command,
                pid = ?self.pid,
                "server handle dropped while running; killing"
            );
            // Drop cannot wait for a graceful exit; tokio reaps the child
            if let Err(e) = child.start_kill() {
                warn!(command = %self.command, "kill failed: {e}");
            }
        }
    }
}

/// Send SIGTERM to a process. Returns `Err` if the signal could not be delivered.
fn send_sigterm(pid: u32) -> std::io::Result<()> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Reserve `count` free TCP ports by binding to port 0 for each, then
/// releasing them all at once. Holding all listeners alive until the ports
/// are collected prevents the same port from being issued twice.
pub fn pick_free_ports(count: usize) -> Result<Vec<u16>> {
    let listeners = (0..count)
        .map(|_| TcpListener::bind("127.0.0.1:0"))
        .collect::<std::io::Result<Vec<_>>>()?;
    let ports = listeners
        .iter()
        .map(|l| l.local_addr().map(|a| a.port()))
        .collect::<std::io::Result<Vec<_>>>()?;
    Ok(ports)
}

pub fn pick_free_port() -> Result<u16> {
    pick_free_ports(1)?
        .pop()
        .ok_or_else(|| BenchError::Io("no free port available".to_string()))
}
