use serde::{Deserialize, Serialize};

/// Base for source links derived from passage titles
pub const WIKI_URL_PREFIX: &str = "https://en.wikipedia.org/wiki/";

/// Immutable unit of evidence with its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    pub id: u64,
    pub title: String,
    pub text: String,
    pub url: String,
    pub embedding: Vec<f32>,
}

/// Raw ingestion record, one per logical evidence unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassageRecord {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl PassageRecord {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            url: None,
        }
    }

    /// Clean title and text and resolve the source link.
    ///
    /// Returns `None` when either title or text is empty after cleaning.
    pub fn normalized(&self) -> Option<(String, String, String)> {
        let title = clean_text(&self.title);
        let text = clean_text(&self.text);
        if title.is_empty() || text.is_empty() {
            return None;
        }
        let url = match self.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => url_for_title(&title),
        };
        Some((title, text, url))
    }
}

/// Collapse every whitespace run to a single space and trim
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical source link for a title: spaces become underscores
pub fn url_for_title(title: &str) -> String {
    format!("{}{}", WIKI_URL_PREFIX, title.trim().replace(' ', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_for_title() {
        assert_eq!(
            url_for_title("Eiffel Tower"),
            "https://en.wikipedia.org/wiki/Eiffel_Tower"
        );
        assert_eq!(url_for_title("Paris"), "https://en.wikipedia.org/wiki/Paris");
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  The \t Eiffel\n\nTower  "), "The Eiffel Tower");
        assert_eq!(clean_text(" \n\t "), "");
    }

    #[test]
    fn test_record_derives_url_when_missing() {
        let record = PassageRecord::new("Eiffel  Tower", " The Eiffel Tower is in Paris. ");
        let (title, text, url) = record.normalized().unwrap();
        assert_eq!(title, "Eiffel Tower");
        assert_eq!(text, "The Eiffel Tower is in Paris.");
        assert_eq!(url, "https://en.wikipedia.org/wiki/Eiffel_Tower");
    }

    #[test]
    fn test_record_keeps_explicit_url() {
        let record = PassageRecord {
            title: "Paris".to_string(),
            text: "Capital of France.".to_string(),
            url: Some("https://example.org/paris".to_string()),
        };
        assert_eq!(record.normalized().unwrap().2, "https://example.org/paris");
    }

    #[test]
    fn test_record_rejects_blank_text() {
        assert!(PassageRecord::new("Paris", "   ").normalized().is_none());
        assert!(PassageRecord::new("  ", "text").normalized().is_none());
    }

    #[test]
    fn test_record_deserializes_without_url() {
        let record: PassageRecord =
            serde_json::from_str(r#"{"title":"Paris","text":"Capital of France."}"#).unwrap();
        assert_eq!(record.url, None);
    }
}
