//! Local inference engine supervision.
//!
//! Probes for an already-running llama-server before launching the bundled
//! one, waits for it to warm up, and terminates it at shutdown — but only
//! if this supervisor spawned it. An externally managed backend is never
//! touched.

use shared::Config;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Health polls during warm-up: once per second, up to 30 attempts.
const WARMUP_ATTEMPTS: u32 = 30;

/// Where the supervisor is in the engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NotStarted,
    Probing,
    /// A backend already answers on the configured port; we did not spawn
    /// it and will not stop it.
    AlreadyRunning,
    Launching,
    WarmingUp,
    Ready,
    Failed,
}

/// Engine launch parameters, snapshotted from the active config.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub auto_start: bool,
    pub binary: PathBuf,
    pub model_path: String,
    pub port: u16,
    pub context_size: u32,
    pub gpu_layers: u32,
}

impl EngineConfig {
    pub fn from_config(cfg: &Config) -> Self {
        let binary = PathBuf::from("engine").join(if cfg!(windows) {
            "llama-server.exe"
        } else {
            "llama-server"
        });
        Self {
            auto_start: cfg.auto_start_engine,
            binary,
            model_path: cfg.model_path.clone(),
            port: cfg.engine_port,
            context_size: cfg.context_size,
            gpu_layers: cfg.gpu_layers,
        }
    }
}

/// Owns the locally spawned backend's process lifecycle.
pub struct EngineSupervisor {
    child: Option<Child>,
    state: EngineState,
}

impl Default for EngineSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSupervisor {
    pub fn new() -> Self {
        Self {
            child: None,
            state: EngineState::NotStarted,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EngineState::Ready | EngineState::AlreadyRunning)
    }

    /// Drive the startup sequence to `Ready` or `Failed`.
    ///
    /// Runs on a background task; the warm-up loop alone can take 30
    /// seconds. A `Failed` outcome is non-fatal — chat calls simply fail
    /// at the transport layer until a backend appears.
    pub async fn start(&mut self, cfg: &EngineConfig) -> EngineState {
        if !cfg.auto_start {
            debug!("engine auto-start disabled in config");
            self.state = EngineState::NotStarted;
            return self.state;
        }

        self.state = EngineState::Probing;
        if providers::probe_health("127.0.0.1", cfg.port).await {
            info!(port = cfg.port, "llama-server already running, skipping launch");
            self.state = EngineState::AlreadyRunning;
            return self.state;
        }

        self.state = EngineState::Launching;
        info!(binary = %cfg.binary.display(), port = cfg.port, "starting local engine");
        let mut command = Command::new(&cfg.binary);
        command
            .arg("-m")
            .arg(&cfg.model_path)
            .arg("--port")
            .arg(cfg.port.to_string())
            .arg("-c")
            .arg(cfg.context_size.to_string())
            .arg("-ngl")
            .arg(cfg.gpu_layers.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // A self-spawned engine must not outlive the supervisor, even
            // when the supervisor is dropped mid warm-up at process exit.
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        match command.spawn() {
            Ok(child) => {
                info!(pid = child.id(), "local engine launched");
                self.child = Some(child);
            }
            Err(e) => {
                warn!(error = %e, "failed to start local engine");
                self.state = EngineState::Failed;
                return self.state;
            }
        }

        self.state = EngineState::WarmingUp;
        for attempt in 1..=WARMUP_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if providers::probe_health("127.0.0.1", cfg.port).await {
                info!(seconds = attempt, "engine ready");
                self.state = EngineState::Ready;
                return self.state;
            }
        }
        warn!(seconds = WARMUP_ATTEMPTS, "engine did not respond within warm-up window");
        self.state = EngineState::Failed;
        self.state
    }

    /// Terminate the engine if and only if this supervisor spawned it.
    pub async fn stop(&mut self) {
        match self.child.take() {
            Some(mut child) => {
                info!(pid = child.id(), "shutting down local engine");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill local engine");
                }
            }
            None => debug!("engine was externally managed, not killing"),
        }
        self.state = EngineState::NotStarted;
    }
}
