use thiserror::Error;

use crate::ssh::CommandResult;

#[derive(Error, Debug)]
pub enum Error {
    /// No session could be established for a target. Terminal for that
    /// target: the orchestrator short-circuits to a single failing result.
    #[error("could not establish SSH connection to {target}\n{advice}")]
    Connection { target: String, advice: String },

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("key install failed: {0}")]
    KeyInstall(String),

    /// The transport dropped mid-batch. Remaining commands were not
    /// attempted; `completed` holds the results collected before the drop.
    #[error("command batch aborted after {} of {total} commands: {reason}", completed.len())]
    CommandExecution {
        completed: Vec<CommandResult>,
        total: usize,
        reason: String,
    },

    #[error("file transfer failed: {0}")]
    Transfer(String),

    #[error("SSH error: {0}")]
    Ssh(String),

    #[error("inventory error: {0}")]
    Inventory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
