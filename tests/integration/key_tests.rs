//! Key provisioning on a real filesystem plus trust-store installation
//! through a scripted channel.

use std::fs;

use edge_doctor::ssh::keys::{
    ensure_key_pair_with, install_authorized_key, public_key_path, KeyAlgorithm,
};

use crate::common::FakeChannel;

#[cfg(unix)]
fn mode_of(path: &std::path::Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).unwrap().permissions().mode() & 0o777
}

#[test]
fn generates_a_pair_with_restrictive_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("keys").join("id_edge");

    let pub_path = ensure_key_pair_with(&key_path, KeyAlgorithm::Ed25519).unwrap();

    assert!(key_path.exists());
    assert_eq!(pub_path, public_key_path(&key_path));
    let public_line = fs::read_to_string(&pub_path).unwrap();
    assert!(public_line.starts_with("ssh-ed25519 "));
    assert!(public_line.trim_end().ends_with("edge-doctor"));

    #[cfg(unix)]
    {
        assert_eq!(mode_of(&key_path), 0o600);
        assert_eq!(mode_of(&pub_path), 0o644);
        assert_eq!(mode_of(key_path.parent().unwrap()), 0o700);
    }
}

#[test]
fn existing_pair_is_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("id_edge");

    ensure_key_pair_with(&key_path, KeyAlgorithm::Ed25519).unwrap();
    let private_before = fs::read(&key_path).unwrap();
    let public_before = fs::read(public_key_path(&key_path)).unwrap();

    ensure_key_pair_with(&key_path, KeyAlgorithm::Ed25519).unwrap();

    assert_eq!(fs::read(&key_path).unwrap(), private_before);
    assert_eq!(fs::read(public_key_path(&key_path)).unwrap(), public_before);
}

#[tokio::test]
async fn install_prepares_trust_store_then_appends_once() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("id_edge");
    let pub_path = ensure_key_pair_with(&key_path, KeyAlgorithm::Ed25519).unwrap();

    let channel = FakeChannel::succeeding();
    install_authorized_key(&channel, &pub_path).await.unwrap();

    let calls = channel.calls();
    // Four setup commands then exactly one guarded append.
    assert_eq!(calls.len(), 5);
    assert_eq!(calls[0], "mkdir -p ~/.ssh");
    assert!(calls[1].starts_with("chmod 700"));
    assert!(calls[3].starts_with("chmod 600"));

    let append = &calls[4];
    assert!(append.starts_with("grep -qxF"));
    assert!(append.contains(">> ~/.ssh/authorized_keys"));
    let key_line = fs::read_to_string(&pub_path).unwrap();
    assert!(append.contains(key_line.trim()));
}

#[tokio::test]
async fn install_surfaces_channel_failures() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("id_edge");
    let pub_path = ensure_key_pair_with(&key_path, KeyAlgorithm::Ed25519).unwrap();

    let channel = FakeChannel::failing();
    let err = install_authorized_key(&channel, &pub_path)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("trust-store setup failed"));
}

#[tokio::test]
async fn install_rejects_a_missing_public_key() {
    let channel = FakeChannel::succeeding();
    let err = install_authorized_key(&channel, std::path::Path::new("/nonexistent/key.pub"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cannot read"));
    // The remote must never have been touched.
    assert!(channel.calls().is_empty());
}
