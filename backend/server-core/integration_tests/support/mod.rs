//! Fake Factorio installs for integration tests.
//!
//! The fake binary is a shell script: `--version` prints a version banner,
//! anything else records its arguments one per line and runs `body`.

use server_core::config::ManagerConfig;
use server_core::rcon::packet::{
    AUTH_FAILED_ID, Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE, SERVERDATA_RESPONSE_VALUE,
};

use common::RedactedSecret;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

pub const TEST_RCON_PASSWORD: &str = "integration-secret";
pub const RCON_READY_LINE: &str =
    "   0.123 Info RemoteCommandProcessor.cpp:133: Starting RCON interface at IP ADDR:({0.0.0.0:27015})";

const SETTINGS_TEMPLATE: &str = r#"{
  "name": "Integration",
  "max_players": 0
}"#;

pub struct FakeInstall {
    pub dir: TempDir,
    pub config: ManagerConfig,
}

impl FakeInstall {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn args_file(&self) -> PathBuf {
        self.root().join("argv.txt")
    }

    /// Arguments the fake binary was last started with.
    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.args_file())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Lay out an install reporting `version` whose server run executes `body`.
pub fn fake_install(version: &str, body: &str) -> FakeInstall {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let binary = root.join("bin").join("x64").join("factorio");
    fs::create_dir_all(binary.parent().unwrap()).unwrap();
    fs::create_dir_all(root.join("data").join("base")).unwrap();
    fs::create_dir_all(root.join("saves")).unwrap();

    fs::write(
        root.join("data").join("server-settings.example.json"),
        SETTINGS_TEMPLATE,
    )
    .unwrap();
    fs::write(
        root.join("data").join("base").join("info.json"),
        format!(r#"{{"name": "base", "version": "{version}"}}"#),
    )
    .unwrap();

    let script = format!(
        "#!/bin/sh\n\
         if [ \"$1\" = \"--version\" ]; then\n\
           echo \"Version: {version} (build 60000, linux64, headless)\"\n\
           exit 0\n\
         fi\n\
         printf '%s\\n' \"$@\" > \"{args}\"\n\
         {body}\n",
        args = root.join("argv.txt").display(),
    );
    write_executable(&binary, &script);

    let config = ManagerConfig {
        factorio_dir: root.to_path_buf(),
        rcon_password: RedactedSecret::new(TEST_RCON_PASSWORD),
        ..ManagerConfig::default()
    };

    FakeInstall { dir, config }
}

pub fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

/// Wait for the next event matching `predicate`, failing after five seconds.
pub async fn next_event<T, F>(rx: &mut broadcast::Receiver<T>, predicate: F) -> T
where
    T: Clone + std::fmt::Debug,
    F: Fn(&T) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("Timed out waiting for event")
}

/// A minimal RCON server: authenticates with `password` and counts sessions.
pub struct FakeRcon {
    pub port: u16,
    pub accepted: Arc<AtomicUsize>,
}

impl FakeRcon {
    pub async fn start(password: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                tokio::spawn(async move {
                    let Ok(request) = Packet::read_from(&mut socket).await else {
                        return;
                    };
                    assert_eq!(request.kind, SERVERDATA_AUTH);

                    let id = if request.body == password {
                        request.id
                    } else {
                        AUTH_FAILED_ID
                    };
                    // Real servers send an empty value packet first.
                    let _ = Packet::new(request.id, SERVERDATA_RESPONSE_VALUE, "")
                        .write_to(&mut socket)
                        .await;
                    let _ = Packet::new(id, SERVERDATA_AUTH_RESPONSE, "")
                        .write_to(&mut socket)
                        .await;

                    // Hold the session open until the client goes away.
                    let _ = Packet::read_from(&mut socket).await;
                });
            }
        });

        Self { port, accepted }
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// A TCP peer that accepts connections and never says anything.
pub struct SilentPeer {
    pub port: u16,
    task: tokio::task::JoinHandle<()>,
}

impl SilentPeer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        Self { port, task }
    }
}

impl Drop for SilentPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
