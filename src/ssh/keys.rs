//! Local key-pair provisioning and remote trust-store installation.
//!
//! Both operations are idempotent: `ensure_key_pair` never touches an
//! existing pair, and `install_authorized_key` guards the remote append so
//! repeated bootstraps leave exactly one matching line in
//! `~/.ssh/authorized_keys`.

use std::fs;
use std::path::{Path, PathBuf};

use russh::keys::ssh_key::private::{Ed25519Keypair, KeypairData, RsaKeypair};
use russh::keys::ssh_key::rand_core::OsRng;
use russh::keys::ssh_key::{LineEnding, PrivateKey};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::ssh::CommandChannel;

/// Comment attached to generated keys so operators can recognise them in
/// `authorized_keys`.
const KEY_COMMENT: &str = "edge-doctor";

const RSA_BITS: usize = 4096;

/// Key algorithm for generated pairs. RSA-4096 is the default for maximum
/// compatibility with older sshd builds; Ed25519 is equivalent strength
/// and much cheaper to generate (tests use it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa4096,
    Ed25519,
}

/// The companion public key path for a private key: `<path>.pub`.
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut name = private_key.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

/// Ensure a key pair exists at `path`, generating an RSA-4096 pair if not.
/// Returns the public key path.
///
/// Idempotent: if both the private key and its `.pub` companion already
/// exist, they are returned untouched — zero writes.
pub fn ensure_key_pair(path: &Path) -> Result<PathBuf> {
    ensure_key_pair_with(path, KeyAlgorithm::Rsa4096)
}

/// [`ensure_key_pair`] with an explicit algorithm.
pub fn ensure_key_pair_with(path: &Path, algorithm: KeyAlgorithm) -> Result<PathBuf> {
    let pub_path = public_key_path(path);
    if path.exists() && pub_path.exists() {
        debug!(key = %path.display(), "key pair already present");
        return Ok(pub_path);
    }

    if let Some(dir) = path.parent() {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(dir)
            .map_err(|e| Error::KeyGeneration(format!("cannot create {}: {e}", dir.display())))?;
    }

    let key = generate_key(algorithm)?;

    let private_pem = key
        .to_openssh(LineEnding::LF)
        .map_err(|e| Error::KeyGeneration(format!("cannot encode private key: {e}")))?;
    write_with_mode(path, private_pem.as_bytes(), 0o600)?;

    let public_line = key
        .public_key()
        .to_openssh()
        .map_err(|e| Error::KeyGeneration(format!("cannot encode public key: {e}")))?;
    write_with_mode(&pub_path, format!("{public_line}\n").as_bytes(), 0o644)?;

    info!(key = %path.display(), ?algorithm, "generated new key pair");
    Ok(pub_path)
}

fn generate_key(algorithm: KeyAlgorithm) -> Result<PrivateKey> {
    let data = match algorithm {
        KeyAlgorithm::Rsa4096 => KeypairData::Rsa(
            RsaKeypair::random(&mut OsRng, RSA_BITS)
                .map_err(|e| Error::KeyGeneration(format!("RSA generation failed: {e}")))?,
        ),
        KeyAlgorithm::Ed25519 => KeypairData::Ed25519(Ed25519Keypair::random(&mut OsRng)),
    };
    PrivateKey::new(data, KEY_COMMENT)
        .map_err(|e| Error::KeyGeneration(format!("cannot assemble key: {e}")))
}

fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    fs::write(path, contents)
        .map_err(|e| Error::KeyGeneration(format!("cannot write {}: {e}", path.display())))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
            Error::KeyGeneration(format!("cannot set mode on {}: {e}", path.display()))
        })?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

/// Commands that prepare the remote trust store with restrictive
/// permissions. Each is safe to re-run.
const TRUST_STORE_SETUP: &[&str] = &[
    "mkdir -p ~/.ssh",
    "chmod 700 ~/.ssh",
    "touch ~/.ssh/authorized_keys",
    "chmod 600 ~/.ssh/authorized_keys",
];

/// The guarded append: a single remote command that only appends the key
/// line when an identical line is not already present. Check and append
/// run in one shell invocation so repeated installs cannot duplicate the
/// entry.
pub(crate) fn guarded_append_command(key_line: &str) -> String {
    format!(
        "grep -qxF '{key_line}' ~/.ssh/authorized_keys || echo '{key_line}' >> ~/.ssh/authorized_keys"
    )
}

/// Install the public key at `pub_key_path` into the remote trust store.
///
/// Idempotent: running this N times yields the same `authorized_keys` as
/// running it once.
pub async fn install_authorized_key(
    channel: &dyn CommandChannel,
    pub_key_path: &Path,
) -> Result<()> {
    let key_line = fs::read_to_string(pub_key_path)
        .map_err(|e| Error::KeyInstall(format!("cannot read {}: {e}", pub_key_path.display())))?
        .trim()
        .to_string();
    if key_line.is_empty() {
        return Err(Error::KeyInstall(format!(
            "{} is empty",
            pub_key_path.display()
        )));
    }
    // The line is embedded in a single-quoted shell word; a quote or an
    // embedded newline would break out of it. No valid OpenSSH public key
    // contains either.
    if key_line.contains('\'') || key_line.contains('\n') {
        return Err(Error::KeyInstall(format!(
            "{} does not look like a public key (contains quote or newline)",
            pub_key_path.display()
        )));
    }

    let results = channel
        .execute(TRUST_STORE_SETUP)
        .await
        .map_err(|e| Error::KeyInstall(format!("trust-store setup failed: {e}")))?;
    if let Some(failed) = results.iter().find(|r| !r.success()) {
        return Err(Error::KeyInstall(format!(
            "trust-store setup failed: {}",
            failed.stderr.trim()
        )));
    }

    let append = channel
        .run(&guarded_append_command(&key_line))
        .await
        .map_err(|e| Error::KeyInstall(format!("key append failed: {e}")))?;
    if !append.success() {
        return Err(Error::KeyInstall(format!(
            "key append failed: {}",
            append.stderr.trim()
        )));
    }

    info!(key = %pub_key_path.display(), "public key installed in remote trust store");
    Ok(())
}
