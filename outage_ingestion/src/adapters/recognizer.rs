use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

/// Result of running optical recognition over one schedule image.
#[derive(Debug, Clone)]
pub struct RecognizedText {
    pub text: String,
    /// Mean word confidence in `[0.0, 1.0]`.
    pub confidence: f32,
}

/// Seam between the document-image adapter and the recognition engine. The
/// engine is non-deterministic in accuracy, so implementations report a
/// confidence score alongside the text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> anyhow::Result<RecognizedText>;
}

/// Production recognizer shelling out to the `tesseract` binary with tsv
/// output, which carries per-word confidences.
pub struct TesseractCli {
    languages: String,
}

impl TesseractCli {
    /// `languages` in tesseract notation, e.g. `"ukr+eng"`.
    pub fn new(languages: impl Into<String>) -> Self {
        Self {
            languages: languages.into(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn recognize(&self, image: &[u8]) -> anyhow::Result<RecognizedText> {
        let path = std::env::temp_dir().join(format!("schedule-{}.png", Uuid::new_v4()));
        tokio::fs::write(&path, image)
            .await
            .with_context(|| format!("Failed to write image to {}", path.display()))?;

        let output = Command::new("tesseract")
            .arg(&path)
            .arg("stdout")
            .args(["-l", &self.languages, "tsv"])
            .output()
            .await;

        // Best effort; a stale temp file is harmless.
        let _ = tokio::fs::remove_file(&path).await;

        let output = output.context("Failed to invoke tesseract")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tesseract exited with {}: {stderr}", output.status);
        }

        let tsv = String::from_utf8(output.stdout).context("tesseract produced invalid utf-8")?;
        let recognized = parse_tsv(&tsv)?;
        debug!(
            confidence = recognized.confidence,
            chars = recognized.text.len(),
            "recognition finished"
        );
        Ok(recognized)
    }
}

/// Reconstructs line-oriented text from tesseract tsv rows (level 5 = word)
/// and averages their confidences.
fn parse_tsv(tsv: &str) -> anyhow::Result<RecognizedText> {
    let mut text = String::new();
    let mut confidences = Vec::new();
    let mut current_line: Option<(&str, &str, &str)> = None;

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 || fields[0] != "5" {
            continue;
        }
        let line_key = (fields[1], fields[2], fields[4]);
        let word = fields[11].trim();
        if word.is_empty() {
            continue;
        }
        if let Ok(confidence) = fields[10].parse::<f32>() {
            if confidence >= 0.0 {
                confidences.push(confidence);
            }
        }
        if current_line.is_some() && current_line != Some(line_key) {
            text.push('\n');
        } else if !text.is_empty() {
            text.push(' ');
        }
        current_line = Some(line_key);
        text.push_str(word);
    }

    if text.is_empty() {
        bail!("tesseract recognized no text");
    }
    let confidence = confidences.iter().sum::<f32>() / confidences.len().max(1) as f32 / 100.0;
    Ok(RecognizedText { text, confidence })
}
