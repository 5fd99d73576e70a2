//! Session establishment with credential fallback.
//!
//! Authentication methods are tried in strict priority order, stopping at
//! the first success:
//!
//! 1. key auth, when a key path is configured and the file exists;
//! 2. password auth, immediately followed by key provisioning (generate a
//!    local pair if needed, install it in the remote trust store) so the
//!    next run is password-free — a provisioning failure is a soft
//!    warning, never a connection failure;
//! 3. exhausted: [`Error::Connection`] with operator guidance.
//!
//! A `SessionBootstrap` is constructed per target and shares no state with
//! other targets: each attempt is a function of the target and the local
//! filesystem only. The ordering itself lives in `run_flow`, generic over
//! the `AuthFlow` seam, so the fallback contract is testable without a
//! live server.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::keys::{load_secret_key, PrivateKey, PrivateKeyWithHashAlg};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::inventory::Target;
use crate::ssh::handler::ClientHandler;
use crate::ssh::keys;
use crate::ssh::session::{SshSession, NET_TIMEOUT};

/// Key path used for provisioning when the inventory does not name one.
const DEFAULT_KEY_PATH: &str = "~/.ssh/id_rsa";

/// A ready session plus the bootstrap trail: one human-readable message
/// per step taken (auth method used, provisioning outcome, soft warnings).
pub struct BootstrapOutcome {
    pub session: SshSession,
    pub messages: Vec<String>,
}

impl std::fmt::Debug for BootstrapOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapOutcome")
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

/// The attempt operations the fallback ordering drives. Implemented over
/// a real transport by [`TransportFlow`]; tests script it.
#[async_trait]
trait AuthFlow: Sync {
    type Session: Send;

    async fn key_auth(&self, key_path: &Path) -> Result<Self::Session>;
    async fn password_auth(&self, password: &str) -> Result<Self::Session>;
    async fn provision_key(&self, session: &Self::Session) -> Result<PathBuf>;
}

/// Per-target session bootstrap. See the module docs for the fallback
/// ordering contract.
pub struct SessionBootstrap {
    target: Target,
}

impl SessionBootstrap {
    pub fn new(target: &Target) -> Self {
        Self {
            target: target.clone(),
        }
    }

    /// Run the fallback state machine and return a live session.
    pub async fn connect(&self) -> Result<BootstrapOutcome> {
        let (session, messages) = self.run_flow(&TransportFlow { bootstrap: self }).await?;
        Ok(BootstrapOutcome { session, messages })
    }

    /// The fallback ordering itself, independent of the transport.
    async fn run_flow<F: AuthFlow>(&self, flow: &F) -> Result<(F::Session, Vec<String>)> {
        let mut messages = Vec::new();

        // Step 1: key auth. On success, return immediately — never fall
        // through to the password path.
        if let Some(key_path) = self.existing_key_path() {
            match flow.key_auth(&key_path).await {
                Ok(session) => {
                    info!(host = %self.target.address, key = %key_path.display(), "authenticated with SSH key");
                    messages.push(format!("connected using SSH key {}", key_path.display()));
                    return Ok((session, messages));
                }
                Err(e) => {
                    warn!(host = %self.target.address, %e, "key auth failed, falling back");
                    messages.push(format!("key auth failed: {e}"));
                }
            }
        }

        // Step 2: password auth with key provisioning.
        if let Some(password) = self.target.password.clone() {
            match flow.password_auth(&password).await {
                Ok(session) => {
                    info!(host = %self.target.address, "authenticated with password");
                    messages.push("connected using password".to_string());

                    // Provision a key for the next run. Failures here are
                    // soft: the session is connected either way.
                    match flow.provision_key(&session).await {
                        Ok(pub_path) => {
                            messages.push(format!(
                                "SSH key bootstrapped ({}); the next run will not need a password",
                                pub_path.display()
                            ));
                        }
                        Err(e) => {
                            warn!(host = %self.target.address, %e, "key bootstrap failed (non-fatal)");
                            messages.push(format!("key bootstrap failed: {e}"));
                        }
                    }

                    return Ok((session, messages));
                }
                Err(e) => {
                    warn!(host = %self.target.address, %e, "password auth failed");
                    messages.push(format!("password auth failed: {e}"));
                }
            }
        }

        // Step 3: exhausted. No session was ever opened, so there is
        // nothing to clean up.
        Err(Error::Connection {
            target: format!(
                "{}@{}:{}",
                self.target.username, self.target.address, self.target.port
            ),
            advice: self.connection_advice(&messages),
        })
    }

    /// The configured key path, expanded, but only if the file exists.
    fn existing_key_path(&self) -> Option<PathBuf> {
        let raw = self.target.key_path.as_ref()?;
        let expanded = PathBuf::from(shellexpand::tilde(&raw.to_string_lossy()).into_owned());
        expanded.exists().then_some(expanded)
    }

    /// The key path used for provisioning on the password path.
    fn provision_key_path(&self) -> PathBuf {
        let raw = self
            .target
            .key_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_KEY_PATH.to_string());
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }

    async fn try_key_auth(&self, key_path: &Path) -> Result<SshSession> {
        let key = self.load_private_key(key_path)?;
        let mut handle = self.open_transport().await?;

        let auth = tokio::time::timeout(
            NET_TIMEOUT,
            handle.authenticate_publickey(
                &self.target.username,
                PrivateKeyWithHashAlg::new(Arc::new(key), None),
            ),
        )
        .await
        .map_err(|_| Error::Ssh(format!("key auth timed out after {NET_TIMEOUT:?}")))?
        .map_err(|e| Error::Ssh(format!("key auth error: {e}")))?;

        if !auth.success() {
            return Err(Error::Ssh(format!(
                "server rejected key {}",
                key_path.display()
            )));
        }
        Ok(SshSession::new(handle, self.target.address.clone()))
    }

    async fn try_password_auth(&self, password: &str) -> Result<SshSession> {
        let mut handle = self.open_transport().await?;

        let auth = tokio::time::timeout(
            NET_TIMEOUT,
            handle.authenticate_password(&self.target.username, password),
        )
        .await
        .map_err(|_| Error::Ssh(format!("password auth timed out after {NET_TIMEOUT:?}")))?
        .map_err(|e| Error::Ssh(format!("password auth error: {e}")))?;

        if !auth.success() {
            return Err(Error::Ssh("server rejected password".into()));
        }
        Ok(SshSession::new(handle, self.target.address.clone()))
    }

    /// Load the private key, retrying with the target password as the
    /// passphrase for encrypted keys. `load_secret_key` identifies RSA,
    /// Ed25519, and ECDSA keys from the envelope in one parse.
    fn load_private_key(&self, key_path: &Path) -> Result<PrivateKey> {
        match load_secret_key(key_path, None) {
            Ok(key) => return Ok(key),
            Err(e) => {
                debug!(key = %key_path.display(), %e, "unencrypted load failed");
            }
        }
        let passphrase = self.target.password.as_deref();
        load_secret_key(key_path, passphrase)
            .map_err(|e| Error::Ssh(format!("cannot load key {}: {e}", key_path.display())))
    }

    /// Ensure a local pair exists and install it on the remote host.
    async fn provision_key(&self, session: &SshSession) -> Result<PathBuf> {
        let key_path = self.provision_key_path();
        let pub_path = keys::ensure_key_pair(&key_path)?;
        keys::install_authorized_key(session, &pub_path).await?;
        Ok(pub_path)
    }

    /// Open the TCP transport and complete the SSH handshake. Each auth
    /// attempt gets a fresh transport.
    async fn open_transport(&self) -> Result<client::Handle<ClientHandler>> {
        let addr_str = format!("{}:{}", self.target.address, self.target.port);
        let addr: SocketAddr = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::Ssh(format!("cannot resolve {addr_str}: {e}")))?
            .next()
            .ok_or_else(|| Error::Ssh(format!("no addresses found for {addr_str}")))?;

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(Duration::from_secs(60)),
            keepalive_interval: Some(Duration::from_secs(15)),
            keepalive_max: 3,
            ..Default::default()
        });

        let handle = tokio::time::timeout(
            NET_TIMEOUT,
            client::connect(config, addr, ClientHandler::default()),
        )
        .await
        .map_err(|_| Error::Ssh(format!("connection to {addr} timed out")))?
        .map_err(|e| Error::Ssh(format!("connection to {addr} failed: {e}")))?;

        debug!(host = %self.target.address, %addr, "transport established");
        Ok(handle)
    }

    /// Operator-facing guidance attached to a terminal connection failure.
    fn connection_advice(&self, attempts: &[String]) -> String {
        let mut advice = String::new();
        for attempt in attempts {
            advice.push_str(&format!("  - {attempt}\n"));
        }
        if attempts.is_empty() {
            advice.push_str("  - no key file found and no password configured\n");
        }
        advice.push_str(&format!(
            "what to do:\n\
             \x20 1. verify the host is reachable (ping, VPN status)\n\
             \x20 2. check username and password in the inventory\n\
             \x20 3. ensure SSH is enabled on the remote host\n\
             \x20 4. try manually: ssh {}@{}",
            self.target.username, self.target.address
        ));
        advice
    }
}

/// The real [`AuthFlow`]: every attempt opens a fresh transport and
/// authenticates over it.
struct TransportFlow<'a> {
    bootstrap: &'a SessionBootstrap,
}

#[async_trait]
impl AuthFlow for TransportFlow<'_> {
    type Session = SshSession;

    async fn key_auth(&self, key_path: &Path) -> Result<SshSession> {
        self.bootstrap.try_key_auth(key_path).await
    }

    async fn password_auth(&self, password: &str) -> Result<SshSession> {
        self.bootstrap.try_password_auth(password).await
    }

    async fn provision_key(&self, session: &SshSession) -> Result<PathBuf> {
        self.bootstrap.provision_key(session).await
    }
}
