//! Best-effort recovery of structured data from free model text.

use serde::de::DeserializeOwned;

/// Remove markdown code-fence markers anywhere in the text and trim.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// The slice from the first `{` to the last `}` inclusive, or the whole
/// fence-stripped text when no ordered brace pair exists.
pub fn json_object_candidate(text: &str) -> String {
    let cleaned = strip_code_fences(text);
    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => cleaned[start..=end].to_string(),
        _ => cleaned,
    }
}

/// Parse the outermost JSON object out of a response that may be wrapped
/// in prose or code fences.
pub fn parse_embedded_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(&json_object_candidate(text))
}
