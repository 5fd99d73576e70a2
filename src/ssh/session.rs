use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use russh::{client, ChannelMsg};
use russh_sftp::client::SftpSession;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ssh::handler::ClientHandler;
use crate::ssh::{CommandChannel, CommandResult};

/// Bound on any single network round trip (channel open, message wait,
/// transfer step). Nothing in a diagnostic run may block indefinitely.
pub const NET_TIMEOUT: Duration = Duration::from_secs(10);

/// An authenticated, live SSH session bound to exactly one target.
///
/// The session owns the underlying transport and must be released with
/// [`SshSession::close`] on every exit path. It is never reused across
/// targets.
pub struct SshSession {
    handle: client::Handle<ClientHandler>,
    host: String,
}

impl SshSession {
    pub(crate) fn new(handle: client::Handle<ClientHandler>, host: String) -> Self {
        Self { handle, host }
    }

    /// The `host` the session was opened against, for log context.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Close the session gracefully. Logs and swallows disconnect errors:
    /// by the time we release the transport there is nothing actionable
    /// left to do with them.
    pub async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            warn!(host = %self.host, %e, "SSH disconnect failed");
        }
        debug!(host = %self.host, "session released");
    }

    /// Upload a local file to the remote host over an SFTP sub-channel.
    pub async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let data = tokio::fs::read(local)
            .await
            .map_err(|e| Error::Transfer(format!("cannot read {}: {e}", local.display())))?;

        let sftp = self.sftp().await?;
        let mut file = sftp
            .create(remote)
            .await
            .map_err(|e| Error::Transfer(format!("cannot create remote {remote}: {e}")))?;
        file.write_all(&data)
            .await
            .map_err(|e| Error::Transfer(format!("write to {remote} failed: {e}")))?;
        file.shutdown()
            .await
            .map_err(|e| Error::Transfer(format!("flush of {remote} failed: {e}")))?;

        let _ = sftp.close().await;
        debug!(host = %self.host, remote, bytes = data.len(), "file uploaded");
        Ok(())
    }

    /// Download a remote file to a local path over an SFTP sub-channel.
    pub async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        let sftp = self.sftp().await?;
        let mut file = sftp
            .open(remote)
            .await
            .map_err(|e| Error::Transfer(format!("cannot open remote {remote}: {e}")))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .await
            .map_err(|e| Error::Transfer(format!("read of {remote} failed: {e}")))?;
        let _ = sftp.close().await;

        tokio::fs::write(local, &data)
            .await
            .map_err(|e| Error::Transfer(format!("cannot write {}: {e}", local.display())))?;
        debug!(host = %self.host, remote, bytes = data.len(), "file downloaded");
        Ok(())
    }

    /// Open the SFTP subsystem on a fresh channel of this session.
    async fn sftp(&self) -> Result<SftpSession> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Transfer(format!("failed to open SFTP channel: {e}")))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| Error::Transfer(format!("SFTP subsystem request failed: {e}")))?;
        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::Transfer(format!("SFTP handshake failed: {e}")))
    }
}

#[async_trait]
impl CommandChannel for SshSession {
    async fn run(&self, command: &str) -> Result<CommandResult> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Ssh(format!("failed to open channel: {e}")))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::Ssh(format!("failed to exec command: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        // Read channel messages until Close or the channel returns None.
        // Do NOT break on Eof: ExitStatus often arrives after Eof, and
        // breaking early leaves every command looking like a failure.
        loop {
            match tokio::time::timeout(NET_TIMEOUT, channel.wait()).await {
                Ok(Some(msg)) => match msg {
                    ChannelMsg::Data { data } => {
                        stdout.extend_from_slice(&data);
                    }
                    ChannelMsg::ExtendedData { data, ext } => {
                        if ext == 1 {
                            stderr.extend_from_slice(&data);
                        }
                    }
                    ChannelMsg::ExitStatus { exit_status } => {
                        exit_code = Some(exit_status);
                    }
                    ChannelMsg::Close => break,
                    _ => {}
                },
                Ok(None) => break,
                Err(_) => {
                    return Err(Error::Ssh(format!(
                        "command timed out after {NET_TIMEOUT:?}: {command}"
                    )));
                }
            }
        }

        let result = CommandResult {
            exit_code: exit_code.map_or(-1, |code| code as i32),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };

        debug!(
            host = %self.host,
            command,
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "command completed"
        );

        Ok(result)
    }
}
