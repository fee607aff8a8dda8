use serde::{Deserialize, Serialize};

/// A painting to acquire an image for.
///
/// The display name is the painting's identity within a batch; it also
/// names the saved image file. The plaque text is the label read off the
/// museum plaque and is carried through to the outcome unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Painting {
    pub name: String,
    #[serde(default)]
    pub plaque_text: String,
    /// Candidate page URLs in search-rank order, or the upstream failure sentinel.
    #[serde(rename = "urls")]
    pub candidates: CandidateUrls,
}

/// Candidate page URLs produced by the upstream search stage.
///
/// Upstream emits either a list of URLs or a plain string (e.g.
/// `"Unsuccessful search"`) when the search itself failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CandidateUrls {
    Found(Vec<String>),
    SearchFailed(String),
}

impl Default for CandidateUrls {
    fn default() -> Self {
        CandidateUrls::Found(Vec::new())
    }
}

impl Painting {
    pub fn new(name: impl Into<String>, plaque_text: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            name: name.into(),
            plaque_text: plaque_text.into(),
            candidates: CandidateUrls::Found(urls),
        }
    }

    /// The candidate URLs, or `None` when upstream produced nothing usable
    /// (search failure sentinel or an empty list).
    pub fn usable_urls(&self) -> Option<&[String]> {
        match &self.candidates {
            CandidateUrls::Found(urls) if !urls.is_empty() => Some(urls),
            _ => None,
        }
    }
}

/// Load paintings from a JSON array file.
pub fn load_paintings(path: &str) -> anyhow::Result<Vec<Painting>> {
    use anyhow::Context;

    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse paintings in {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_url_list() {
        let json = r#"{
            "name": "Mona Lisa",
            "plaque_text": "Leonardo da Vinci, Mona Lisa, 1503",
            "urls": ["https://en.wikipedia.org/wiki/Mona_Lisa", "https://example.com/x"]
        }"#;
        let painting: Painting = serde_json::from_str(json).unwrap();
        assert_eq!(painting.name, "Mona Lisa");
        assert_eq!(painting.usable_urls().unwrap().len(), 2);
    }

    #[test]
    fn test_deserialize_search_sentinel() {
        let json = r#"{"name": "Untitled", "urls": "Unsuccessful search"}"#;
        let painting: Painting = serde_json::from_str(json).unwrap();
        assert_eq!(
            painting.candidates,
            CandidateUrls::SearchFailed("Unsuccessful search".into())
        );
        assert!(painting.usable_urls().is_none());
        assert_eq!(painting.plaque_text, "");
    }

    #[test]
    fn test_empty_list_is_not_usable() {
        let painting = Painting::new("Nothing", "plaque", vec![]);
        assert!(painting.usable_urls().is_none());
    }
}
