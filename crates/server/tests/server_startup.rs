//! Startup tests that spawn the real binary.

use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tempfile::{NamedTempFile, TempDir};
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};

const BINARY: &str = env!("CARGO_BIN_EXE_stickerline");

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn command(config_path: &Path) -> Command {
    let mut command = Command::new(BINARY);
    command
        .env("STICKERLINE_CONFIG", config_path)
        .env("RUST_LOG", "error")
        .kill_on_drop(true);
    command
}

/// A running server on a free local port, ffmpeg pointing nowhere so startup
/// never depends on the host.
struct RunningServer {
    port: u16,
    client: Client,
    child: Child,
    _config: NamedTempFile,
    _work_dir: TempDir,
}

impl RunningServer {
    async fn start() -> Self {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let work_dir = TempDir::new().unwrap();
        let config = write_config(&format!(
            r#"
[server]
host = "127.0.0.1"
port = {}

[workspace]
dir = "{}"

[transcoder]
ffmpeg_path = "/nonexistent/ffmpeg"

[remote]
enabled = false
"#,
            port,
            work_dir.path().display()
        ));

        let child = command(config.path()).spawn().expect("Failed to spawn server");
        let server = Self {
            port,
            client: Client::new(),
            child,
            _config: config,
            _work_dir: work_dir,
        };
        assert!(server.wait_ready(40).await, "Server did not start in time");
        server
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}/api/v1{}", self.port, path)
    }

    async fn wait_ready(&self, attempts: u32) -> bool {
        for _ in 0..attempts {
            if self.client.get(self.url("/health")).send().await.is_ok() {
                return true;
            }
            sleep(Duration::from_millis(50)).await;
        }
        false
    }

    async fn get_json(&self, path: &str) -> Value {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        response.json().await.expect("Failed to parse JSON")
    }

    async fn stop(mut self) {
        self.child.kill().await.ok();
    }
}

async fn run_to_exit(config: &str) -> Output {
    let file = write_config(config);
    timeout(Duration::from_secs(5), command(file.path()).output())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command")
}

#[tokio::test]
async fn test_health_and_capabilities() {
    let server = RunningServer::start().await;

    let health = server.get_json("/health").await;
    assert_eq!(health["status"], "ok");

    let capabilities = server.get_json("/capabilities").await;
    assert_eq!(capabilities["local_transcoder"], false);
    assert_eq!(capabilities["remote_fallback"], false);

    server.stop().await;
}

#[tokio::test]
async fn test_config_endpoint_reflects_file() {
    let server = RunningServer::start().await;

    let config = server.get_json("/config").await;
    assert_eq!(config["server"]["port"], server.port);
    assert_eq!(config["remote"]["enabled"], false);
    assert_eq!(config["transcoder"]["ffmpeg_path"], "/nonexistent/ffmpeg");

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let output = run_to_exit("[transcoder]\ncrf_high = 80\n").await;
    assert!(!output.status.success());
}

#[tokio::test]
async fn test_malformed_config_exits_with_error() {
    let output = run_to_exit("[server\nport = ").await;
    assert!(!output.status.success());
}
