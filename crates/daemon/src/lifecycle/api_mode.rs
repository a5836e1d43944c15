// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API-mode provisioning: host port, one-time key, readiness probe.
//!
//! In API mode the agent exposes an HTTP API on a named network instead of
//! using the socket-mount request channel. The supervisor publishes a host
//! port, writes a one-time API key into a temp directory mounted read-only
//! into the container, and polls the health endpoint until the agent is
//! ready or the probe budget is exhausted.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Path of the key file inside its temp directory.
pub(crate) const API_KEY_FILE: &str = "api-key";

/// Container path where the key directory is mounted (read-only).
pub(crate) const API_KEY_MOUNT: &str = "/run/carapace/api";

/// Provisioned per-spawn API-mode material. The temp directory's lifetime
/// is tied to the container's bookkeeping entry; dropping it deletes the
/// key file.
pub(crate) struct ApiProvision {
    pub host_port: u16,
    pub api_key: String,
    pub key_dir: tempfile::TempDir,
}

/// Create the one-time key file for one container.
pub(crate) fn provision(host_port: u16) -> std::io::Result<ApiProvision> {
    let key_dir = tempfile::tempdir()?;
    let api_key = uuid::Uuid::new_v4().simple().to_string();
    let key_path = key_dir.path().join(API_KEY_FILE);
    std::fs::write(&key_path, &api_key)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
        // The directory itself must be traversable by the container user.
        std::fs::set_permissions(key_dir.path(), std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(ApiProvision { host_port, api_key, key_dir })
}

/// Poll the agent's health endpoint until it responds or attempts run out.
pub(crate) async fn poll_health(
    addr: &str,
    api_key: &str,
    interval: Duration,
    attempts: u32,
) -> Result<(), String> {
    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(interval).await;
        }
        if health_check(addr, api_key).await {
            tracing::info!(%addr, attempt, "agent API ready");
            return Ok(());
        }
    }
    Err(format!(
        "agent API at {addr} not ready after {attempts} probes ({}ms apart)",
        interval.as_millis()
    ))
}

async fn health_check(addr: &str, api_key: &str) -> bool {
    let request = format!(
        "GET /healthz HTTP/1.1\r\nHost: localhost\r\nAuthorization: Bearer {api_key}\r\nConnection: close\r\n\r\n"
    );
    let attempt = async {
        let mut stream = TcpStream::connect(addr).await.ok()?;
        stream.write_all(request.as_bytes()).await.ok()?;
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.ok()?;
        let head = String::from_utf8_lossy(&buf[..n]).to_string();
        Some(head.starts_with("HTTP/1.1 200") || head.starts_with("HTTP/1.0 200"))
    };
    match tokio::time::timeout(Duration::from_secs(2), attempt).await {
        Ok(Some(ok)) => ok,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_writes_a_private_key_file() {
        let p = provision(9301).unwrap();
        let key_path = p.key_dir.path().join(API_KEY_FILE);
        let on_disk = std::fs::read_to_string(&key_path).unwrap();
        assert_eq!(on_disk, p.api_key);
        assert_eq!(p.api_key.len(), 32);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&key_path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn dropping_the_provision_removes_the_key() {
        let p = provision(9301).unwrap();
        let dir = p.key_dir.path().to_path_buf();
        drop(p);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn poll_health_succeeds_against_a_stub_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 512];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                .await;
        });

        poll_health(&addr, "key", Duration::from_millis(10), 5).await.unwrap();
    }

    #[tokio::test]
    async fn poll_health_gives_up_when_nothing_listens() {
        // Bind-then-drop guarantees a dead port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = poll_health(&addr, "key", Duration::from_millis(5), 3).await.unwrap_err();
        assert!(err.contains("not ready after 3 probes"));
    }
}
