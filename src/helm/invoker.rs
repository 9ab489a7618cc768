//! Bounded execution of external commands
//!
//! Runs a program with a deadline and captures stdout and stderr into a
//! single buffer in arrival order. The command is done when the child
//! exits. The child is killed when the deadline passes or when the calling
//! future is dropped.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How long output is still read after the command has exited
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Run `program` with `args`, returning the combined output
pub async fn invoke(program: &str, args: &[String], timeout: Duration) -> Result<String> {
    let command = display_command(program, args);
    debug!(command = %command, ?timeout, "Invoking external command");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::CommandSpawn {
            command: command.clone(),
            source,
        })?;

    let output = Arc::new(Mutex::new(Vec::new()));
    let drains = Drains(vec![
        tokio::spawn(drain(child.stdout.take(), Arc::clone(&output))),
        tokio::spawn(drain(child.stderr.take(), Arc::clone(&output))),
    ]);

    let result = tokio::time::timeout(timeout, child.wait()).await;
    match result {
        Ok(status) => {
            let status = status?;
            drains.finish().await;
            let output = collect(&output).await;
            if status.success() {
                Ok(output)
            } else {
                Err(Error::CommandFailed {
                    command,
                    status: status.to_string(),
                    output,
                })
            }
        }
        Err(_) => {
            warn!(command = %command, ?timeout, "External command timed out, killing it");
            if let Err(e) = child.kill().await {
                warn!(command = %command, "Failed to kill timed out command: {}", e);
            }
            drains.finish().await;
            Err(Error::CommandTimedOut {
                command,
                timeout,
                output: collect(&output).await,
            })
        }
    }
}

/// Pipe readers for one child, aborted when dropped
struct Drains(Vec<JoinHandle<()>>);

impl Drains {
    /// Wait for the pipes to close, giving up after [`OUTPUT_GRACE`]
    ///
    /// A background process spawned by the command can hold the pipes open
    /// after the command itself has exited.
    async fn finish(mut self) {
        let readers = futures::future::join_all(self.0.iter_mut());
        if tokio::time::timeout(OUTPUT_GRACE, readers).await.is_err() {
            debug!("Command output still open after exit, dropping the rest");
        }
    }
}

impl Drop for Drains {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Copy a child pipe into the shared output buffer until EOF
async fn drain<R>(reader: Option<R>, sink: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => sink.lock().await.extend_from_slice(&buf[..n]),
            Err(e) => {
                debug!("Stopped reading command output: {}", e);
                break;
            }
        }
    }
}

async fn collect(output: &Mutex<Vec<u8>>) -> String {
    String::from_utf8_lossy(&output.lock().await).trim_end().to_string()
}

/// Command line for logs and errors, with secret arguments masked
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut parts = vec![program.to_string()];
    let mut redact_next = false;
    for arg in args {
        if redact_next {
            parts.push("<redacted>".to_string());
            redact_next = false;
            continue;
        }
        redact_next = arg == "--password";
        parts.push(arg.clone());
    }
    parts.join(" ")
}
