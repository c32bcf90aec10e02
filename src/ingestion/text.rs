/// Decodes UTF-8, dropping invalid byte sequences. Characters that were valid in the input,
/// U+FFFD included, are kept.
pub fn extract_plain_text(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Pretty-prints a JSON document. When the bytes are not valid JSON the raw text is returned
/// together with the parse error so the caller can report it.
pub fn extract_json_text(bytes: &[u8]) -> (String, Option<String>) {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => (pretty, None),
            Err(e) => (extract_plain_text(bytes), Some(e.to_string())),
        },
        Err(e) => (extract_plain_text(bytes), Some(e.to_string())),
    }
}
