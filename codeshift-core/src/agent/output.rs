//! Parsing raw agent output into JSON

use serde_json::Value;

/// What an agent's raw text turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    /// Nothing left after removing code fences and whitespace
    Empty,
    /// A JSON document
    Json(Value),
    /// Text that is not JSON; carries the parse error
    Malformed(String),
}

/// Remove Markdown code fences wrapping a response
///
/// Handles a leading ```` ``` ```` or ```` ```json ```` line and a trailing
/// ```` ``` ````. Text without fences is returned trimmed.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (e.g. "json") up to the end of the fence line
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }

    let text = text.trim_end();
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Parse agent output after stripping code fences
pub fn parse_output(raw: &str) -> ParsedOutput {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return ParsedOutput::Empty;
    }
    match serde_json::from_str(text) {
        Ok(value) => ParsedOutput::Json(value),
        Err(e) => ParsedOutput::Malformed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_json_fence() {
        let raw = "```json\n{\"relatorio\": \"R\"}\n```\n";
        assert_eq!(strip_code_fences(raw), "{\"relatorio\": \"R\"}");
    }

    #[test]
    fn test_strip_bare_fence() {
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_empty_outputs() {
        assert_eq!(parse_output(""), ParsedOutput::Empty);
        assert_eq!(parse_output("   \n"), ParsedOutput::Empty);
        assert_eq!(parse_output("```json\n```"), ParsedOutput::Empty);
        assert_eq!(parse_output("``````"), ParsedOutput::Empty);
    }

    #[test]
    fn test_parse_json() {
        assert_eq!(
            parse_output("```json\n{\"conjunto_de_mudancas\": []}\n```"),
            ParsedOutput::Json(json!({"conjunto_de_mudancas": []}))
        );
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            parse_output("Here is your report: {oops"),
            ParsedOutput::Malformed(_)
        ));
    }
}
