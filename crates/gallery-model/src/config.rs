use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Location label used when no candidate URL matches a known institution.
pub const UNKNOWN_LOCATION: &str = "Unknown location";

/// Immutable configuration for one scrape run.
///
/// Every field has a default, so a partial JSON file only needs to name
/// the options it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Substring identifying the trusted encyclopedic source (tried first).
    pub trusted_domain: String,
    /// Ordered domain-substring → institution table. Order matters: the
    /// first matching entry names the location.
    pub known_institutions: Vec<KnownInstitution>,
    /// Phrases that mark a page as a captcha / bot wall (case-insensitive).
    pub captcha_phrases: Vec<String>,
    /// Whole-word keywords identifying a consent button (case-insensitive).
    pub consent_keywords: Vec<String>,
    pub timeouts: Timeouts,
    /// Directory that saved images are written to.
    pub output_dir: String,
    /// Number of paintings dispatched concurrently per group.
    pub group_size: usize,
    pub headless: bool,
    pub user_agent: String,
}

/// A known institution recognized by a substring of its domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnownInstitution {
    pub keyword: String,
    pub name: String,
}

/// Bounds for every network-bound step, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timeouts {
    pub page_load_ms: u64,
    pub image_wait_ms: u64,
    pub settle_ms: u64,
    pub download_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load_ms: 10_000,
            image_wait_ms: 10_000,
            settle_ms: 2_000,
            download_ms: 10_000,
        }
    }
}

impl Timeouts {
    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn image_wait(&self) -> Duration {
        Duration::from_millis(self.image_wait_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn download(&self) -> Duration {
        Duration::from_millis(self.download_ms)
    }
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const DEFAULT_INSTITUTIONS: &[(&str, &str)] = &[
    ("mfa", "Museum of Fine Arts Boston"),
    ("artic", "The Art Institute of Chicago"),
    ("belvedere", "Austrian Gallery Belvedere"),
    ("metmuseum", "The Metropolitan Museum of Art"),
    ("nga", "The National Gallery of Art"),
    ("sfmoma", "San Francisco Museum of Modern Art (SFMOMA)"),
    ("guggenheim", "The Guggenheim Museum"),
    ("philamuseum", "The Philadelphia Museum of Art"),
    ("albertina", "Albertina Museum Wien"),
    ("harvardartmuseums", "The Harvard Art Museums"),
    ("leopoldmuseum", "The Leopold Museum"),
    ("museodelnovecento", "The Museo del Novecento"),
    ("moma", "Museum of Modern Art (MoMA)"),
    ("galleriaborghese", "The Galleria Borghese"),
    ("doriapamphilj", "Galleria Doria Pamphilji"),
    ("famsf", "The Fine Arts Museums of San Francisco"),
    ("noma", "The New Orleans Museum of Art (NOMA)"),
    ("sjmusart", "The San José Museum of Art"),
    ("bampfa", "Berkeley Art Museum and Pacific Film Archive (BAMPFA)"),
    ("si", "Smithsonian Museums"),
];

const DEFAULT_CAPTCHA_PHRASES: &[&str] = &[
    "captcha",
    "not a robot",
    "cloudflare",
    "verify you are human",
    "checking your browser",
    "sicherheitsüberprüfung",
    "bestätigen sie, dass sie ein mensch sind",
    "verifica di sicurezza",
    "verifica che tu sia un essere umano",
    "verifica browser",
    "non sono un robot",
];

const DEFAULT_CONSENT_KEYWORDS: &[&str] = &[
    "accept",
    "allow",
    "akzeptieren",
    "consent",
    "zustimmen",
    "agree",
    "einwilligen",
    "accetta",
    "consenti",
    "acconsenti",
    "ho capito",
];

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            trusted_domain: "wikipedia".to_string(),
            known_institutions: DEFAULT_INSTITUTIONS
                .iter()
                .map(|(keyword, name)| KnownInstitution {
                    keyword: keyword.to_string(),
                    name: name.to_string(),
                })
                .collect(),
            captcha_phrases: DEFAULT_CAPTCHA_PHRASES.iter().map(|s| s.to_string()).collect(),
            consent_keywords: DEFAULT_CONSENT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            timeouts: Timeouts::default(),
            output_dir: "extracted_images".to_string(),
            group_size: 3,
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScrapeConfig {
    /// Load a configuration file, filling unspecified options with defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse config {path}"))
    }

    /// Whether `url` belongs to the trusted encyclopedic source.
    pub fn is_trusted(&self, url: &str) -> bool {
        !self.trusted_domain.is_empty() && url.contains(&self.trusted_domain)
    }

    /// The first known institution whose keyword occurs in `url`.
    pub fn institution_for(&self, url: &str) -> Option<&KnownInstitution> {
        self.known_institutions
            .iter()
            .find(|inst| !inst.keyword.is_empty() && url.contains(&inst.keyword))
    }

    /// Infer a location label from a candidate list: the institution of the
    /// first URL (in list order) that matches the known-institution table.
    pub fn infer_location(&self, urls: &[String]) -> String {
        urls.iter()
            .find_map(|url| self.institution_for(url))
            .map(|inst| inst.name.clone())
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "group_size": 5, "timeouts": { "settle_ms": 0 } }"#;
        let config: ScrapeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.group_size, 5);
        assert_eq!(config.timeouts.settle_ms, 0);
        assert_eq!(config.timeouts.page_load_ms, 10_000);
        assert_eq!(config.trusted_domain, "wikipedia");
        assert_eq!(config.known_institutions.len(), 20);
    }

    #[test]
    fn test_infer_location_uses_first_matching_url() {
        let config = ScrapeConfig::default();
        let urls = vec![
            "https://en.wikipedia.org/wiki/The_Kiss".to_string(),
            "https://www.belvedere.at/en/kiss".to_string(),
            "https://www.metmuseum.org/art/collection".to_string(),
        ];
        assert_eq!(config.infer_location(&urls), "Austrian Gallery Belvedere");
    }

    #[test]
    fn test_infer_location_unknown() {
        let config = ScrapeConfig::default();
        let urls = vec!["https://example.com/painting".to_string()];
        assert_eq!(config.infer_location(&urls), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_table_order_decides_between_keywords() {
        // "sfmoma" also contains "moma"; the earlier table entry wins.
        let config = ScrapeConfig::default();
        let inst = config.institution_for("https://www.sfmoma.org/artwork/1").unwrap();
        assert_eq!(inst.keyword, "sfmoma");
    }

    #[test]
    fn test_is_trusted() {
        let config = ScrapeConfig::default();
        assert!(config.is_trusted("https://de.wikipedia.org/wiki/Der_Kuss"));
        assert!(!config.is_trusted("https://www.belvedere.at/"));
    }
}
