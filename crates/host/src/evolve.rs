//! Personality evolution: a periodic, self-serialized background rewrite
//! of the personality text via a secondary model call.

use crate::personality;
use providers::{build_request, parse_response, send, Endpoint};
use shared::Config;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, info};

/// Every Nth completed exchange triggers an attempt.
const EVOLVE_INTERVAL: u32 = 5;

/// Rewrites at or below this length are discarded.
const MIN_PERSONALITY_LEN: usize = 50;

/// Recent-exchange snippet fed to the updater.
const EXCHANGE_SNIPPET_CHARS: usize = 1500;

/// Reduced token budget for the rewrite call.
const EVOLVE_MAX_TOKENS: u32 = 256;

const UPDATER_PROMPT: &str = "You are a personality updater. Given the current \
personality and a recent exchange, output ONLY the updated personality text. \
Keep it concise, warm, and encouraging. Do not add commentary.";

/// Exchange counter plus the process-wide in-progress guard.
#[derive(Debug, Default)]
pub struct Evolution {
    counter: AtomicU32,
    running: AtomicBool,
}

impl Evolution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed exchange and decide whether this one evolves.
    ///
    /// Returns true only when the interval hits, the provider is local,
    /// no chat is in flight, and no other attempt holds the guard. A true
    /// return takes the guard; the caller must call [`finish`].
    ///
    /// [`finish`]: Evolution::finish
    pub fn try_begin(&self, cloud_provider: bool, chat_busy: bool) -> bool {
        let count = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count % EVOLVE_INTERVAL != 0 {
            return false;
        }
        if cloud_provider {
            debug!("evolution skipped (cloud provider)");
            return false;
        }
        if chat_busy {
            debug!("evolution skipped (chat in flight)");
            return false;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("evolution skipped (already running)");
            return false;
        }
        info!(exchange = count, "personality evolution started");
        true
    }

    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// One rewrite attempt. The caller holds the guard; failures and short
/// replies are silently discarded.
pub async fn evolve_once(cfg: Config, personality_path: PathBuf, exchange: String) {
    let current = personality::load(&personality_path);
    let snippet: String = exchange.chars().take(EXCHANGE_SNIPPET_CHARS).collect();
    let user = format!("Current Personality:\n{current}\n\nRecent exchange:\n{snippet}");

    let protocol = cfg.provider.protocol();
    let body = build_request(
        protocol,
        &cfg.model,
        cfg.temperature,
        EVOLVE_MAX_TOKENS,
        UPDATER_PROMPT,
        &user,
        &[],
    );

    let raw = match send(&Endpoint::from_config(&cfg), body).await {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "evolution request failed");
            return;
        }
    };

    let updated = parse_response(protocol, &raw);
    if updated.len() > MIN_PERSONALITY_LEN {
        personality::save(&personality_path, &updated);
        info!(chars = updated.len(), "personality evolved");
    } else {
        debug!(chars = updated.len(), "evolution result discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_on_every_fifth_exchange() {
        let ev = Evolution::new();
        for _ in 0..4 {
            assert!(!ev.try_begin(false, false));
        }
        assert!(ev.try_begin(false, false));
        ev.finish();
    }

    #[test]
    fn guard_admits_exactly_one() {
        let ev = Evolution::new();
        for _ in 0..4 {
            ev.try_begin(false, false);
        }
        assert!(ev.try_begin(false, false)); // holds the guard
        for _ in 0..4 {
            ev.try_begin(false, false);
        }
        // Tenth exchange: interval hits again but the guard is taken.
        assert!(!ev.try_begin(false, false));
        ev.finish();
        for _ in 0..4 {
            ev.try_begin(false, false);
        }
        assert!(ev.try_begin(false, false));
        ev.finish();
    }

    #[test]
    fn skips_cloud_and_busy() {
        let ev = Evolution::new();
        for _ in 0..4 {
            ev.try_begin(false, false);
        }
        assert!(!ev.try_begin(true, false));
        for _ in 0..4 {
            ev.try_begin(false, false);
        }
        assert!(!ev.try_begin(false, true));
    }
}
