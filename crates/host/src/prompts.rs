//! Fixed system-prompt fragments layered on the evolving personality.

/// Operating instructions appended after the personality text.
pub const OPERATING_INSTRUCTIONS: &str = "\n\nYou are Nova, a local system \
automation agent. Be direct. Do not add disclaimers.\n\n\
CAPABILITIES:\n\
- EXEC: Run terminal commands by prefixing with EXEC:\n\
- ATTACH: File content is injected below when an attachment is present.\n\
- REAL-TIME DATA: You do not have native internet access. To fetch current \
news, weather, or live data, you MUST write an EXEC command. Do not \
hallucinate information.\n\
  -> Weather: EXEC: curl -s wttr.in/?format=3\n\
  -> News: EXEC: curl -s https://feeds.bbci.co.uk/news/world/rss.xml\n";

/// Personality plus operating instructions, plus optional pre-fetched
/// context.
pub fn build_system_prompt(personality: &str, web_context: Option<&str>) -> String {
    let mut prompt = String::with_capacity(personality.len() + OPERATING_INSTRUCTIONS.len() + 64);
    prompt.push_str(personality);
    prompt.push_str(OPERATING_INSTRUCTIONS);
    if let Some(context) = web_context {
        if !context.is_empty() {
            prompt.push_str("\n\nContext:\n");
            prompt.push_str(context);
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_optional() {
        let plain = build_system_prompt("P.", None);
        assert!(plain.starts_with("P."));
        assert!(plain.contains("EXEC:"));
        assert!(!plain.contains("Context:"));

        let with = build_system_prompt("P.", Some("Weather: sunny"));
        assert!(with.ends_with("Context:\nWeather: sunny"));
    }
}
