use serde::de::DeserializeOwned;

/// Deserialize one value per line. Lines that don't parse are dropped
/// without aborting the rest.
pub fn parse_jsonl<T: DeserializeOwned>(text: &str) -> Vec<T> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping unparseable JSON line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Entry {
        url: String,
        #[serde(default)]
        status: Option<u16>,
    }

    #[test]
    fn test_bad_line_does_not_abort() {
        let text = r#"{"url":"http://a","status":200}
not json at all
{"url":"http://b"}
{"status":404}
"#;
        let entries: Vec<Entry> = parse_jsonl(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "http://a");
        assert_eq!(entries[0].status, Some(200));
        assert_eq!(entries[1].status, None);
    }
}
