//! Choosing which URL of an `<img>` to download.
//!
//! Order of preference: the responsive source list by declared
//! width/density (highest first), then `src`, then any other attribute
//! value, for sites that stash the real URL in a lazy-load attribute.

use crate::browser::ImageElement;
use crate::retrieval::{DownloadResult, ImageFetcher};
use std::collections::HashSet;

/// One prospective image source on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageCandidate {
    /// A responsive-list entry with the numeric part of its descriptor.
    Weighted { url: String, weight: f64 },
    Plain(String),
}

impl ImageCandidate {
    pub fn url(&self) -> &str {
        match self {
            ImageCandidate::Weighted { url, .. } => url,
            ImageCandidate::Plain(url) => url,
        }
    }
}

/// A `srcset` value split into tokens and URL/descriptor pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSrcset {
    pub tokens: Vec<String>,
    pub pairs: Vec<(String, f64)>,
}

impl ParsedSrcset {
    pub fn parse(srcset: &str) -> Self {
        let tokens: Vec<String> = srcset
            .split_whitespace()
            .map(|t| t.trim_end_matches(',').to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let mut pairs = Vec::new();
        let mut i = 0;
        while i + 1 < tokens.len() {
            match descriptor_weight(&tokens[i + 1]) {
                Some(weight) => {
                    pairs.push((tokens[i].clone(), weight));
                    i += 2;
                }
                None => i += 1,
            }
        }

        Self { tokens, pairs }
    }

    /// At least half the tokens ended up in a pair.
    pub fn is_confident(&self) -> bool {
        self.pairs.len() * 2 >= self.tokens.len()
    }

    /// Candidates to try, best first.
    ///
    /// A well-formed list yields its pairs by weight, descending (stable, so
    /// equal weights keep list order). A malformed one yields every token
    /// that looks like a URL path, last token first.
    pub fn candidates(&self) -> Vec<ImageCandidate> {
        if self.is_confident() {
            let mut pairs = self.pairs.clone();
            pairs.sort_by(|(_, a), (_, b)| b.total_cmp(a));
            pairs
                .into_iter()
                .map(|(url, weight)| ImageCandidate::Weighted { url, weight })
                .collect()
        } else {
            self.tokens
                .iter()
                .rev()
                .filter(|t| t.contains('/'))
                .map(|t| ImageCandidate::Plain(t.clone()))
                .collect()
        }
    }
}

/// Numeric value of a `400w` / `2x` / `1.5x` descriptor.
fn descriptor_weight(descriptor: &str) -> Option<f64> {
    let value = descriptor
        .strip_suffix('w')
        .or_else(|| descriptor.strip_suffix('x'))?;
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse::<f64>().ok().or_else(|| {
        let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse::<f64>().ok()
    })
}

/// Every source worth trying for `img`, in attempt order, without repeats.
pub fn candidate_plan(img: &ImageElement) -> Vec<ImageCandidate> {
    let mut plan = Vec::new();

    if let Some(srcset) = img.attribute("srcset").filter(|s| !s.trim().is_empty()) {
        plan.extend(ParsedSrcset::parse(srcset).candidates());
    }
    if let Some(src) = img.attribute("src") {
        plan.push(ImageCandidate::Plain(src.to_string()));
    }
    plan.extend(
        img.attributes
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case("src") && !name.eq_ignore_ascii_case("srcset")
            })
            .map(|(_, value)| ImageCandidate::Plain(value.clone())),
    );

    let mut seen = HashSet::new();
    plan.retain(|c| {
        let url = c.url().trim();
        !url.is_empty() && seen.insert(url.to_string())
    });
    plan
}

/// Download the best available source of `img`, or `None` once every
/// candidate has failed.
pub async fn resolve(
    img: &ImageElement,
    base_url: &str,
    fetcher: &dyn ImageFetcher,
) -> Option<DownloadResult> {
    for candidate in candidate_plan(img) {
        match fetcher.fetch(candidate.url(), base_url).await {
            Ok(download) => return Some(download),
            Err(e) => {
                tracing::debug!(url = %candidate.url(), error = %e, "Image candidate rejected");
            }
        }
    }
    None
}
