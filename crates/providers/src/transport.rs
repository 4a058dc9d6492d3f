//! HTTP transport with protocol-appropriate auth headers and timeouts.
//!
//! Chat exchanges share one long-timeout client; health probes and
//! pre-flight tests share a short-timeout one. Transport failures are
//! returned as errors for the orchestrator to log — provider-level errors
//! (non-2xx with a body) come back as the body so the error text can be
//! extracted downstream.

use anyhow::{Context, Result};
use reqwest::Client;
use shared::{Config, Protocol, ProviderKind};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

static CHAT_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(180))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

static PROBE_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_millis(1500))
        .timeout(Duration::from_secs(3))
        .build()
        .expect("failed to build probe client")
});

/// Everything needed to address one provider endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub provider: ProviderKind,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub use_ssl: bool,
    pub api_key: String,
    pub model: String,
}

impl Endpoint {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            provider: cfg.provider,
            host: cfg.host.clone(),
            port: cfg.port,
            path: cfg.endpoint_path.clone(),
            use_ssl: cfg.use_ssl,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        }
    }

    fn url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        let base = format!("{}://{}:{}{}", scheme, self.host, self.port, self.path);
        // Gemini addresses the model in the path and passes the key as a
        // query parameter rather than a header alone.
        if self.provider.protocol() == Protocol::Gemini {
            format!("{}{}:generateContent?key={}", base, self.model, self.api_key)
        } else {
            base
        }
    }
}

/// POST a prebuilt JSON body and return the raw response body.
///
/// Non-2xx responses still return `Ok` with the body; the caller extracts
/// the provider-reported error from it. `Err` means the exchange itself
/// failed (refused, DNS, timeout).
pub async fn send(endpoint: &Endpoint, body: String) -> Result<String> {
    let url = endpoint.url();
    debug!(
        host = %endpoint.host, port = endpoint.port, path = %endpoint.path,
        bytes = body.len(), "provider request"
    );

    let mut req = CHAT_HTTP
        .post(&url)
        .header("Content-Type", "application/json");

    match endpoint.provider.protocol() {
        Protocol::Anthropic => {
            req = req
                .header("x-api-key", &endpoint.api_key)
                .header("anthropic-version", "2023-06-01");
        }
        Protocol::Gemini => {
            req = req.header("x-goog-api-key", &endpoint.api_key);
        }
        Protocol::OpenAiCompat => {
            if !endpoint.api_key.is_empty() {
                req = req.header(
                    "Authorization",
                    format!("Bearer {}", endpoint.api_key),
                );
            }
        }
    }

    // OpenRouter asks callers to identify themselves.
    if endpoint.provider == ProviderKind::OpenRouter {
        req = req
            .header("HTTP-Referer", "https://github.com/nova-desktop/nova")
            .header("X-Title", "Nova Desktop");
    }

    let resp = req
        .body(body)
        .send()
        .await
        .with_context(|| format!("request to {}:{} failed", endpoint.host, endpoint.port))?;

    let status = resp.status();
    let text = resp.text().await.context("reading response body")?;
    debug!(status = %status, bytes = text.len(), "provider response");
    Ok(text)
}

/// Short-timeout GET against a local backend's health endpoint.
pub async fn probe_health(host: &str, port: u16) -> bool {
    probe_get(&format!("http://{host}:{port}/health")).await
}

/// Generic reachability probe for OpenAI-compatible local backends.
pub async fn probe_models(host: &str, port: u16) -> bool {
    probe_get(&format!("http://{host}:{port}/v1/models")).await
}

async fn probe_get(url: &str) -> bool {
    match PROBE_HTTP.get(url).send().await {
        Ok(resp) => {
            let ok = resp.status().is_success();
            let body = resp.text().await.unwrap_or_default();
            ok && !body.trim().is_empty()
        }
        Err(_) => false,
    }
}

/// Pre-flight check used by settings: cloud providers get a minimal chat
/// exchange, local backends a reachability probe.
pub async fn test_connection(cfg: &Config) -> bool {
    if cfg.use_ssl {
        let body = crate::adapter::build_request(
            cfg.provider.protocol(),
            &cfg.model,
            cfg.temperature,
            cfg.max_tokens,
            "You are a test.",
            "Say OK.",
            &[],
        );
        match send(&Endpoint::from_config(cfg), body).await {
            Ok(resp) => !resp.is_empty() && !resp.contains("error"),
            Err(_) => false,
        }
    } else {
        probe_models(&cfg.host, cfg.port).await || probe_health(&cfg.host, cfg.port).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_url_carries_model_and_key() {
        let mut cfg = Config::default();
        cfg.apply_preset(ProviderKind::Gemini);
        cfg.model = "gemini-2.5-flash".into();
        cfg.api_key = "k123".into();
        let url = Endpoint::from_config(&cfg).url();
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com:443/v1beta/models/gemini-2.5-flash:generateContent?key=k123"
        );
    }

    #[test]
    fn local_url_is_plain_http() {
        let cfg = Config::default();
        let url = Endpoint::from_config(&cfg).url();
        assert_eq!(url, "http://127.0.0.1:11434/v1/chat/completions");
    }

    #[tokio::test]
    async fn probe_closed_port_is_false() {
        // Nothing listens here; the probe must fail fast, not hang.
        assert!(!probe_health("127.0.0.1", 1).await);
        assert!(!probe_models("127.0.0.1", 1).await);
    }
}
