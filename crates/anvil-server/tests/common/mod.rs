//! Shared helpers for HTTP integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anvil_core::{CompilerConfig, ToolchainConfig};
use anvil_server::{AppState, ServerConfig, app_state, create_router};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

/// Stand-in for `arduino-cli`, run through `sh`.
const FAKE_CLI: &str = r#"
case "$1" in
  lib)
    case "$3" in
      Broken*) echo "Error installing $3: library not found" >&2; exit 1 ;;
    esac
    echo "Installed $3"
    ;;
  compile)
    board="$3"; sketch="$4"; out="$6"
    case "$board" in
      test:fail) printf "%s" "sketch.ino:3:5: error: 'foo' was not declared in this scope" >&2; exit 1 ;;
      test:empty) echo "Sketch uses 0 bytes"; touch "$out/sketch.elf"; exit 0 ;;
    esac
    name=$(basename "$sketch")
    mkdir -p "$out/$board"
    { printf '%s\n' "$board"; cat "$sketch/$name.ino"; } > "$out/$board/$name.ino.bin"
    ;;
esac
"#;

/// A router wired to a fake toolchain and a private workspace root.
pub struct TestServer {
    pub router: Router,
    pub state: Arc<AppState>,
    tools: TempDir,
    root: TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_api_key(None)
    }

    pub fn with_api_key(api_key: Option<&str>) -> Self {
        let tools = TempDir::new().expect("Failed to create temp dir");
        let root = TempDir::new().expect("Failed to create temp dir");

        let script = tools.path().join("fake-arduino-cli.sh");
        std::fs::write(&script, FAKE_CLI).expect("Failed to write fake toolchain");

        let config = ServerConfig {
            api_key: api_key.map(str::to_string),
            compiler: CompilerConfig {
                workspace_root: root.path().to_path_buf(),
                toolchain: ToolchainConfig {
                    program: "sh".into(),
                    global_args: vec![script.display().to_string()],
                    ..ToolchainConfig::default()
                },
            },
            ..ServerConfig::default()
        };

        let state = app_state(&config);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            tools,
            root,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        self.root.path()
    }

    /// Workspace directories still on disk.
    pub fn leftover_workspaces(&self) -> Vec<PathBuf> {
        let mut left = Vec::new();
        for entry in std::fs::read_dir(self.root.path()).unwrap() {
            let path = entry.unwrap().path();
            if path.file_name().unwrap() == "build" {
                left.extend(std::fs::read_dir(&path).unwrap().map(|e| e.unwrap().path()));
            } else {
                left.push(path);
            }
        }
        left
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_compile(
        &self,
        body: serde_json::Value,
        api_key: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/compile")
            .header("content-type", "application/json");
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        let request = builder
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let response = self.send(request).await;
        let status = response.status();
        (status, json_body(response).await)
    }
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
