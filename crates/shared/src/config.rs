//! Active configuration and its flat `key=value` persistence.
//!
//! Unknown keys are ignored on load; missing keys keep their defaults.
//! Save is best-effort: failures are logged, never fatal.

use crate::presets::ProviderKind;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub provider: ProviderKind,
    pub host: String,
    pub port: u16,
    pub api_key: String,
    pub model: String,
    pub endpoint_path: String,
    pub use_ssl: bool,

    // Inference
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_size: u32,
    pub gpu_layers: u32,

    // Engine management
    pub auto_start_engine: bool,
    pub model_path: String,
    pub engine_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::LocalLlamaServer,
            host: "127.0.0.1".into(),
            port: 11434,
            api_key: String::new(),
            model: "default".into(),
            endpoint_path: "/v1/chat/completions".into(),
            use_ssl: false,
            temperature: 0.4,
            max_tokens: 1024,
            context_size: 8192,
            gpu_layers: 0,
            auto_start_engine: true,
            model_path: "models/llama3.gguf".into(),
            engine_port: 11434,
        }
    }
}

impl Config {
    /// Overwrite connection fields with the provider's preset defaults.
    /// The model is only replaced when unset, so a hand-picked model
    /// survives switching back and forth.
    pub fn apply_preset(&mut self, kind: ProviderKind) {
        let preset = kind.preset();
        self.provider = kind;
        self.host = preset.default_host.to_string();
        self.port = preset.default_port;
        self.use_ssl = preset.needs_ssl;
        self.endpoint_path = preset.default_endpoint.to_string();
        if self.model.is_empty() {
            self.model = preset.default_model.to_string();
        }
        debug!(provider = %kind, host = %self.host, port = self.port, "applied preset");
    }

    pub fn to_ini(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "provider={}", self.provider.as_str());
        let _ = writeln!(out, "host={}", self.host);
        let _ = writeln!(out, "port={}", self.port);
        let _ = writeln!(out, "api_key={}", self.api_key);
        let _ = writeln!(out, "model={}", self.model);
        let _ = writeln!(out, "endpoint_path={}", self.endpoint_path);
        let _ = writeln!(out, "use_ssl={}", self.use_ssl as u8);
        let _ = writeln!(out, "temperature={}", self.temperature);
        let _ = writeln!(out, "max_tokens={}", self.max_tokens);
        let _ = writeln!(out, "context_size={}", self.context_size);
        let _ = writeln!(out, "gpu_layers={}", self.gpu_layers);
        let _ = writeln!(out, "auto_start_engine={}", self.auto_start_engine as u8);
        let _ = writeln!(out, "model_path={}", self.model_path);
        let _ = writeln!(out, "engine_port={}", self.engine_port);
        out
    }

    pub fn from_ini(text: &str) -> Self {
        let mut cfg = Config::default();
        for line in text.lines() {
            let Some((key, val)) = line.split_once('=') else {
                continue;
            };
            let val = val.trim_end_matches(['\r', '\n', ' ']);
            match key {
                "provider" => {
                    if let Ok(kind) = val.parse() {
                        cfg.provider = kind;
                    }
                }
                "host" => cfg.host = val.to_string(),
                "port" => cfg.port = val.parse().unwrap_or(cfg.port),
                "api_key" => cfg.api_key = val.to_string(),
                "model" => cfg.model = val.to_string(),
                "endpoint_path" => cfg.endpoint_path = val.to_string(),
                "use_ssl" => cfg.use_ssl = val == "1" || val == "true",
                "temperature" => cfg.temperature = val.parse().unwrap_or(cfg.temperature),
                "max_tokens" => cfg.max_tokens = val.parse().unwrap_or(cfg.max_tokens),
                "context_size" => cfg.context_size = val.parse().unwrap_or(cfg.context_size),
                "gpu_layers" => cfg.gpu_layers = val.parse().unwrap_or(cfg.gpu_layers),
                "auto_start_engine" => cfg.auto_start_engine = val == "1" || val == "true",
                "model_path" => cfg.model_path = val.to_string(),
                "engine_port" => cfg.engine_port = val.parse().unwrap_or(cfg.engine_port),
                _ => {} // unknown keys ignored
            }
        }
        cfg
    }

    /// Load from disk; defaults when the file is absent or unreadable.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => {
                let cfg = Self::from_ini(&text);
                debug!(
                    provider = %cfg.provider, host = %cfg.host, port = cfg.port,
                    model = %cfg.model, "config loaded"
                );
                cfg
            }
            Err(_) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
        }
    }

    /// Best-effort save; logs and continues on failure.
    pub fn save(&self, path: &Path) {
        if let Err(e) = fs::write(path, self.to_ini()) {
            warn!(path = %path.display(), error = %e, "could not save config");
        } else {
            debug!(path = %path.display(), "config saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ini_round_trip() {
        let mut cfg = Config::default();
        cfg.apply_preset(ProviderKind::Anthropic);
        cfg.api_key = "sk-test".into();
        cfg.model = "claude-sonnet-4-20250514".into();
        cfg.temperature = 0.7;

        let restored = Config::from_ini(&cfg.to_ini());
        assert_eq!(restored, cfg);
    }

    #[test]
    fn unknown_keys_ignored_and_missing_keys_default() {
        let cfg = Config::from_ini("bogus=1\nmax_tokens=2048\nnot_a_key=hello\n");
        assert_eq!(cfg.max_tokens, 2048);
        assert_eq!(cfg.port, Config::default().port);
        assert_eq!(cfg.model, "default");
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let cfg = Config::from_ini("port=not_a_number\ntemperature=warm\n");
        assert_eq!(cfg.port, Config::default().port);
        assert_eq!(cfg.temperature, Config::default().temperature);
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("nope.ini"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nova_config.ini");
        let mut cfg = Config::default();
        cfg.apply_preset(ProviderKind::OpenRouter);
        cfg.save(&path);
        assert_eq!(Config::load(&path), cfg);
    }
}
