//! Common test utilities and helpers
#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;

use edge_doctor::ssh::{CommandChannel, CommandResult};
use edge_doctor::{Error, Result};

/// A command channel that records every command and answers from a
/// scripted queue. When the script runs out it answers success with
/// empty output, which suits setup-style command sequences.
pub struct FakeChannel {
    responses: Mutex<Vec<CommandResult>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_all: bool,
}

impl FakeChannel {
    pub fn succeeding() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail_all: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail_all: true,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandChannel for FakeChannel {
    async fn run(&self, command: &str) -> Result<CommandResult> {
        self.calls.lock().unwrap().push(command.to_string());
        if self.fail_all {
            return Err(Error::Ssh("connection reset".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        Ok(if responses.is_empty() {
            CommandResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }
        } else {
            responses.remove(0)
        })
    }
}
