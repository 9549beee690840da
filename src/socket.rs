// ABOUTME: Producer socket lifecycle — stale-socket recovery, permissions, ownership
// ABOUTME: Probes a pre-existing socket path before binding to tell stale from live

//! Binding the producer's Unix domain socket has to handle the file
//! already existing: either a stale leftover from a previous run (safe
//! to remove) or a live peer (another instance is already running, and
//! we must exit).

use crate::errors::{EventStreamError, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tokio::net::{UnixListener, UnixStream};

/// Bind the producer socket at `path`, handling a pre-existing file: if
/// a peer answers, another instance owns it and we must not steal it
/// (`ServerAlreadyRunning`); otherwise the file is stale and is removed
/// before binding.
///
/// # Errors
///
/// Returns [`EventStreamError::ServerAlreadyRunning`] if a live peer
/// answers, or a `BadRequest`-wrapped I/O error for any other failure.
pub async fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        match UnixStream::connect(path).await {
            Ok(_) => {
                tracing::error!(?path, "producer socket is held by a live peer");
                return Err(EventStreamError::ServerAlreadyRunning);
            }
            Err(error) => {
                tracing::info!(?path, %error, "removing stale producer socket");
                std::fs::remove_file(path)?;
            }
        }
    }
    Ok(UnixListener::bind(path)?)
}

/// Apply the configured permission bits to the producer socket file.
///
/// # Errors
///
/// Returns an error if the underlying `chmod` fails.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Apply the configured owner and/or group to the producer socket file,
/// resolving names via the system user/group database.
///
/// # Errors
///
/// Returns an error if `owner`/`group` don't resolve to a known
/// account, or if the underlying `chown` fails.
pub fn set_ownership(path: &Path, owner: Option<&str>, group: Option<&str>) -> Result<()> {
    let uid = owner
        .map(|name| resolve_user(name))
        .transpose()?;
    let gid = group
        .map(|name| resolve_group(name))
        .transpose()?;

    if uid.is_some() || gid.is_some() {
        nix::unistd::chown(path, uid, gid)
            .map_err(|errno| EventStreamError::BadRequest(format!("chown failed: {errno}")))?;
    }
    Ok(())
}

fn resolve_user(name: &str) -> Result<nix::unistd::Uid> {
    nix::unistd::User::from_name(name)
        .map_err(|errno| EventStreamError::BadRequest(format!("user lookup failed: {errno}")))?
        .map(|user| user.uid)
        .ok_or_else(|| EventStreamError::BadRequest(format!("unknown user '{name}'")))
}

fn resolve_group(name: &str) -> Result<nix::unistd::Gid> {
    nix::unistd::Group::from_name(name)
        .map_err(|errno| EventStreamError::BadRequest(format!("group lookup failed: {errno}")))?
        .map(|group| group.gid)
        .ok_or_else(|| EventStreamError::BadRequest(format!("unknown group '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_fresh_socket_when_no_file_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("producer.sock");
        let listener = bind(&path).await.unwrap();
        assert!(path.exists());
        drop(listener);
    }

    #[tokio::test]
    async fn removes_stale_socket_file_and_binds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("producer.sock");
        {
            let listener = UnixListener::bind(&path).unwrap();
            drop(listener); // closes without unlinking; file is now stale
        }
        assert!(path.exists());
        let listener = bind(&path).await.unwrap();
        drop(listener);
    }

    #[tokio::test]
    async fn live_peer_causes_server_already_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("producer.sock");
        let _live = UnixListener::bind(&path).unwrap();

        let result = bind(&path).await;
        assert!(matches!(result, Err(EventStreamError::ServerAlreadyRunning)));
    }

    #[test]
    fn set_mode_applies_requested_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"").unwrap();
        set_mode(&path, 0o0600).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o0600);
    }
}
