//! SSH connectivity: session bootstrap, command execution, key provisioning.

pub mod bootstrap;
pub mod handler;
pub mod keys;
pub mod session;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub use bootstrap::{BootstrapOutcome, SessionBootstrap};
pub use handler::ClientHandler;
pub use session::SshSession;

/// Outcome of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Remote exit code. `-1` if the channel closed without reporting one.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Command execution over an authenticated session.
///
/// Implemented by [`SshSession`]; probes depend on the trait so their
/// classification logic can be exercised against scripted channels.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Execute a single command and capture its exit code, stdout, and
    /// stderr. Output is decoded as UTF-8 with invalid bytes replaced.
    async fn run(&self, command: &str) -> Result<CommandResult>;

    /// Execute commands sequentially in submission order, one result per
    /// command. An empty batch returns an empty vec without any remote
    /// round trip.
    ///
    /// Fail-fast contract: if the session drops mid-batch the remaining
    /// commands are not attempted and the returned
    /// [`Error::CommandExecution`] carries the results collected so far.
    async fn execute(&self, commands: &[&str]) -> Result<Vec<CommandResult>> {
        let mut completed = Vec::with_capacity(commands.len());
        for command in commands {
            match self.run(command).await {
                Ok(result) => completed.push(result),
                Err(e) => {
                    return Err(Error::CommandExecution {
                        total: commands.len(),
                        reason: e.to_string(),
                        completed,
                    });
                }
            }
        }
        Ok(completed)
    }
}
