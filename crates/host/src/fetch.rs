//! Keyword-triggered web context: one-line weather, world headlines, and
//! Wikipedia summaries, injected into the system prompt before a chat
//! exchange. Failures degrade to no context, never to an error.

use reqwest::Client;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

static FETCH_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(15))
        .user_agent("curl")
        .build()
        .expect("failed to build fetch client")
});

/// GET a URL; empty string on any failure.
pub async fn fetch_url(url: &str) -> String {
    match FETCH_HTTP.get(url).send().await {
        Ok(resp) => resp.text().await.unwrap_or_default(),
        Err(e) => {
            debug!(url, error = %e, "fetch failed");
            String::new()
        }
    }
}

fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// One-line weather; empty location lets wttr.in geolocate.
pub async fn fetch_weather(location: &str) -> String {
    fetch_url(&format!(
        "https://wttr.in/{}?format=3",
        url_encode(location)
    ))
    .await
}

/// First five world headlines from the BBC feed.
pub async fn fetch_news() -> String {
    let rss = fetch_url("https://feeds.bbci.co.uk/news/world/rss.xml").await;
    parse_rss_titles(&rss, 5)
        .into_iter()
        .map(|t| format!("* {t}\n"))
        .collect()
}

/// Item titles from an RSS body, skipping the feed's own "BBC" title.
fn parse_rss_titles(rss: &str, limit: usize) -> Vec<String> {
    let mut titles = Vec::new();
    let mut rest = rss;
    while titles.len() < limit {
        let Some(start) = rest.find("<title>") else {
            break;
        };
        rest = &rest[start + 7..];
        let Some(end) = rest.find("</title>") else {
            break;
        };
        let title = &rest[..end];
        if !title.contains("BBC") {
            titles.push(title.to_string());
        }
        rest = &rest[end..];
    }
    titles
}

/// Wikipedia REST summary `extract` for a short query.
pub async fn fetch_wiki(query: &str) -> String {
    let raw = fetch_url(&format!(
        "https://en.wikipedia.org/api/rest_v1/page/summary/{}",
        url_encode(query)
    ))
    .await;
    serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|v| v.get("extract").and_then(Value::as_str).map(String::from))
        .unwrap_or_default()
}

/// Pick a fetcher from keywords in the user text; `None` when no keyword
/// matches or the fetch came back empty.
pub async fn analyze_and_fetch(user_text: &str) -> Option<String> {
    let lower = user_text.to_lowercase();
    let context = if lower.contains("weather") {
        let report = fetch_weather("").await;
        (!report.is_empty()).then(|| format!("Weather: {report}"))
    } else if lower.contains("news") {
        let headlines = fetch_news().await;
        (!headlines.is_empty()).then(|| format!("World News:\n{headlines}"))
    } else if (lower.contains("who is") || lower.contains("what is")) && user_text.len() < 60 {
        let summary = fetch_wiki(user_text).await;
        (!summary.is_empty()).then(|| format!("Wiki: {summary}"))
    } else {
        None
    };
    if let Some(c) = &context {
        debug!(chars = c.len(), "web context injected");
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rss_titles_skip_feed_name() {
        let rss = "<rss><channel><title>BBC News</title>\
                   <item><title>First story</title></item>\
                   <item><title>Second story</title></item></channel></rss>";
        assert_eq!(
            parse_rss_titles(rss, 5),
            vec!["First story", "Second story"]
        );
        assert_eq!(parse_rss_titles(rss, 1).len(), 1);
    }

    #[test]
    fn encoding_covers_spaces_and_symbols() {
        assert_eq!(url_encode("New York"), "New%20York");
        assert_eq!(url_encode("a.b-c_d~e"), "a.b-c_d~e");
    }
}
