use crate::normalize::image_file_name;
use anyhow::{Context, Result};
use gallery_model::{OutcomeRecord, ResultTable, Terminal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Write a painting's image into `output_dir` as `{display name}{extension}`.
///
/// Creates the directory if it doesn't exist; an existing file for the same
/// painting is overwritten.
pub async fn save_image(
    output_dir: &str,
    display_name: &str,
    bytes: &[u8],
    extension: &str,
) -> std::io::Result<PathBuf> {
    let dir = Path::new(output_dir);
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(image_file_name(display_name, extension));
    tokio::fs::write(&path, bytes).await?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Saved image");
    Ok(path)
}

/// Serialized form of a finished batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub records: BTreeMap<String, OutcomeRecord>,
}

impl BatchReport {
    pub fn from_table(table: &ResultTable) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            records: table.snapshot(),
        }
    }

    pub fn count(&self, terminal: Terminal) -> usize {
        self.records.values().filter(|r| r.terminal == terminal).count()
    }

    /// Generate a summary.md for the batch.
    pub fn summary_md(&self) -> String {
        let mut md = format!(
            "# Acquisition summary\n\n\
             - **Generated:** {}\n\
             - **Paintings:** {}\n\
             - **Images saved:** {}\n\
             - **Exhausted:** {}\n\
             - **No candidates:** {}\n\
             - **Aborted:** {}\n",
            self.generated_at,
            self.records.len(),
            self.count(Terminal::Success),
            self.count(Terminal::Exhausted),
            self.count(Terminal::NoCandidates),
            self.count(Terminal::Aborted),
        );

        let missing: Vec<&String> = self
            .records
            .iter()
            .filter(|(_, r)| r.terminal != Terminal::Success)
            .map(|(name, _)| name)
            .collect();
        if !missing.is_empty() {
            md.push_str("\n## Without image\n\n");
            for name in missing {
                md.push_str(&format!("- {name}\n"));
            }
        }
        md
    }
}

/// Write `results.json` and `summary.md` for a batch into `dir`.
pub fn write_report(report: &BatchReport, dir: &str) -> Result<()> {
    let dir = Path::new(dir);
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let json = serde_json::to_string_pretty(report)?;
    let results = dir.join("results.json");
    fs::write(&results, &json)?;
    tracing::info!(path = %results.display(), records = report.records.len(), "Wrote results");

    let summary = dir.join("summary.md");
    fs::write(&summary, report.summary_md())?;
    tracing::info!(path = %summary.display(), "Wrote summary");

    Ok(())
}
