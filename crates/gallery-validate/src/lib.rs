use anyhow::{Context, Result};
use gallery_model::{load_paintings, Painting, ScrapeConfig};
use reqwest::Url;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("painting #{0} has an empty name")]
    EmptyName(usize),

    #[error("duplicate painting name: {0}")]
    DuplicateName(String),

    #[error("painting '{painting}' has a candidate that is not an absolute http(s) URL: {url}")]
    MalformedUrl { painting: String, url: String },

    #[error("group_size must be at least 1")]
    ZeroGroupSize,

    #[error("config list '{0}' is empty")]
    EmptyList(&'static str),

    #[error("trusted_domain is empty")]
    EmptyTrustedDomain,

    #[error("known institution '{0}' has an empty keyword")]
    EmptyInstitutionKeyword(String),
}

impl ValidationError {
    /// Warnings are reported but do not stop a scrape.
    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationError::MalformedUrl { .. })
    }
}

/// Validate a painting input file against `config`.
///
/// Logs every finding and fails if any of them is an error rather than a
/// warning.
pub fn validate(paintings_path: &str, config: &ScrapeConfig) -> Result<()> {
    let paintings = load_paintings(paintings_path)
        .with_context(|| format!("Failed to load {paintings_path}"))?;

    let mut findings = validate_paintings(&paintings);
    findings.extend(validate_config(config));
    report(&findings)?;

    tracing::info!(paintings = paintings.len(), "Input is valid");
    Ok(())
}

/// Log `findings` and bail if any is error-level.
pub fn report(findings: &[ValidationError]) -> Result<()> {
    let mut errors = 0;
    for finding in findings {
        if finding.is_warning() {
            tracing::warn!("{finding}");
        } else {
            tracing::error!("{finding}");
            errors += 1;
        }
    }
    if errors > 0 {
        anyhow::bail!("Validation failed with {errors} error(s)");
    }
    Ok(())
}

/// Check painting names and candidate URLs.
pub fn validate_paintings(paintings: &[Painting]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, painting) in paintings.iter().enumerate() {
        if painting.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName(i));
        } else if !seen.insert(painting.name.as_str()) {
            errors.push(ValidationError::DuplicateName(painting.name.clone()));
        }

        for url in painting.usable_urls().unwrap_or_default() {
            if !is_web_url(url) {
                errors.push(ValidationError::MalformedUrl {
                    painting: painting.name.clone(),
                    url: url.clone(),
                });
            }
        }
    }

    errors
}

/// Check the settings the dispatcher relies on.
pub fn validate_config(config: &ScrapeConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.group_size == 0 {
        errors.push(ValidationError::ZeroGroupSize);
    }
    if config.trusted_domain.trim().is_empty() {
        errors.push(ValidationError::EmptyTrustedDomain);
    }
    if config.captcha_phrases.iter().all(|p| p.trim().is_empty()) {
        errors.push(ValidationError::EmptyList("captcha_phrases"));
    }
    if config.consent_keywords.iter().all(|k| k.trim().is_empty()) {
        errors.push(ValidationError::EmptyList("consent_keywords"));
    }
    for institution in &config.known_institutions {
        if institution.keyword.trim().is_empty() {
            errors.push(ValidationError::EmptyInstitutionKeyword(institution.name.clone()));
        }
    }

    errors
}

fn is_web_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}
