//! Provider identities and their immutable connection presets.
//!
//! Every provider maps to exactly one protocol family; the family decides
//! the request JSON shape and the auth headers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire format a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// `/v1/chat/completions` — llama-server, Ollama, LM Studio, OpenAI,
    /// Groq, Mistral, Together, OpenRouter and most other providers.
    OpenAiCompat,
    /// `/v1/messages` — Anthropic.
    Anthropic,
    /// `/v1beta/models/{model}:generateContent` — Google.
    Gemini,
}

/// A supported backend, local or cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    LocalLlamaServer,
    LocalOllama,
    LocalLmStudio,
    LocalCustom,
    OpenAi,
    Anthropic,
    Gemini,
    Groq,
    Mistral,
    Together,
    OpenRouter,
    CloudCustom,
}

/// Immutable connection defaults for a provider.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub display_name: &'static str,
    pub default_host: &'static str,
    pub default_port: u16,
    pub needs_ssl: bool,
    pub needs_key: bool,
    pub protocol: Protocol,
    pub default_endpoint: &'static str,
    pub default_model: &'static str,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 12] = [
        ProviderKind::LocalLlamaServer,
        ProviderKind::LocalOllama,
        ProviderKind::LocalLmStudio,
        ProviderKind::LocalCustom,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Groq,
        ProviderKind::Mistral,
        ProviderKind::Together,
        ProviderKind::OpenRouter,
        ProviderKind::CloudCustom,
    ];

    pub fn preset(self) -> &'static Preset {
        match self {
            ProviderKind::LocalLlamaServer => &Preset {
                display_name: "Local - llama-server",
                default_host: "127.0.0.1",
                default_port: 8080,
                needs_ssl: false,
                needs_key: false,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/v1/chat/completions",
                default_model: "",
            },
            ProviderKind::LocalOllama => &Preset {
                display_name: "Local - Ollama",
                default_host: "127.0.0.1",
                default_port: 11434,
                needs_ssl: false,
                needs_key: false,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/v1/chat/completions",
                default_model: "",
            },
            ProviderKind::LocalLmStudio => &Preset {
                display_name: "Local - LM Studio",
                default_host: "127.0.0.1",
                default_port: 1234,
                needs_ssl: false,
                needs_key: false,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/v1/chat/completions",
                default_model: "",
            },
            ProviderKind::LocalCustom => &Preset {
                display_name: "Local - Custom",
                default_host: "127.0.0.1",
                default_port: 8080,
                needs_ssl: false,
                needs_key: false,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/v1/chat/completions",
                default_model: "",
            },
            ProviderKind::OpenAi => &Preset {
                display_name: "OpenAI",
                default_host: "api.openai.com",
                default_port: 443,
                needs_ssl: true,
                needs_key: true,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/v1/chat/completions",
                default_model: "gpt-4o",
            },
            ProviderKind::Anthropic => &Preset {
                display_name: "Anthropic (Claude)",
                default_host: "api.anthropic.com",
                default_port: 443,
                needs_ssl: true,
                needs_key: true,
                protocol: Protocol::Anthropic,
                default_endpoint: "/v1/messages",
                default_model: "claude-sonnet-4-20250514",
            },
            ProviderKind::Gemini => &Preset {
                display_name: "Google Gemini",
                default_host: "generativelanguage.googleapis.com",
                default_port: 443,
                needs_ssl: true,
                needs_key: true,
                protocol: Protocol::Gemini,
                default_endpoint: "/v1beta/models/",
                default_model: "gemini-2.5-flash",
            },
            ProviderKind::Groq => &Preset {
                display_name: "Groq",
                default_host: "api.groq.com",
                default_port: 443,
                needs_ssl: true,
                needs_key: true,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/openai/v1/chat/completions",
                default_model: "llama-3.3-70b-versatile",
            },
            ProviderKind::Mistral => &Preset {
                display_name: "Mistral AI",
                default_host: "api.mistral.ai",
                default_port: 443,
                needs_ssl: true,
                needs_key: true,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/v1/chat/completions",
                default_model: "mistral-large-latest",
            },
            ProviderKind::Together => &Preset {
                display_name: "Together AI",
                default_host: "api.together.xyz",
                default_port: 443,
                needs_ssl: true,
                needs_key: true,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/v1/chat/completions",
                default_model: "meta-llama/Llama-3-70b-chat-hf",
            },
            ProviderKind::OpenRouter => &Preset {
                display_name: "OpenRouter",
                default_host: "openrouter.ai",
                default_port: 443,
                needs_ssl: true,
                needs_key: true,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/api/v1/chat/completions",
                default_model: "meta-llama/llama-3.1-8b-instruct",
            },
            ProviderKind::CloudCustom => &Preset {
                display_name: "Cloud - Custom",
                default_host: "",
                default_port: 443,
                needs_ssl: true,
                needs_key: true,
                protocol: Protocol::OpenAiCompat,
                default_endpoint: "/v1/chat/completions",
                default_model: "",
            },
        }
    }

    pub fn protocol(self) -> Protocol {
        self.preset().protocol
    }

    /// Stable name used in the config file.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::LocalLlamaServer => "local_llama_server",
            ProviderKind::LocalOllama => "local_ollama",
            ProviderKind::LocalLmStudio => "local_lm_studio",
            ProviderKind::LocalCustom => "local_custom",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Groq => "groq",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Together => "together",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::CloudCustom => "cloud_custom",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.preset().display_name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    /// Accepts the stable name, or a numeric index for config files written
    /// by older builds (same ordering as `ProviderKind::ALL`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(idx) = s.parse::<usize>() {
            return Self::ALL
                .get(idx)
                .copied()
                .ok_or_else(|| UnknownProvider(s.to_string()));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provider_has_one_protocol() {
        // Total, non-overlapping mapping: preset() never panics and the
        // protocol is fixed per identity.
        for kind in ProviderKind::ALL {
            let p = kind.preset();
            assert_eq!(p.protocol, kind.protocol());
        }
        assert_eq!(ProviderKind::Anthropic.protocol(), Protocol::Anthropic);
        assert_eq!(ProviderKind::Gemini.protocol(), Protocol::Gemini);
        assert_eq!(
            ProviderKind::LocalOllama.protocol(),
            Protocol::OpenAiCompat
        );
    }

    #[test]
    fn name_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn numeric_index_accepted() {
        assert_eq!(
            "5".parse::<ProviderKind>().unwrap(),
            ProviderKind::Anthropic
        );
        assert!("99".parse::<ProviderKind>().is_err());
        assert!("nonesuch".parse::<ProviderKind>().is_err());
    }
}
