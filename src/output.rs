//! Result types returned by the conversion entry points.

use serde::Serialize;
use std::path::PathBuf;

/// One persisted page image.
#[derive(Debug, Clone, Serialize)]
pub struct PageOutput {
    /// 1-indexed source page.
    pub page_num: usize,
    pub file_name: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

/// Timing and size figures for one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    pub page_count: usize,
    pub total_bytes: u64,
    pub render_duration_ms: u64,
    pub normalize_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything produced for one document.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    /// Pages in source order.
    pub pages: Vec<PageOutput>,
    /// ZIP bundling all pages, when requested.
    pub archive: Option<PathBuf>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Produced file names, in page order.
    pub fn file_names(&self) -> Vec<String> {
        self.pages.iter().map(|p| p.file_name.clone()).collect()
    }
}

/// Outcome of one document in a batch run.
#[derive(Debug, Serialize)]
pub struct DocumentOutcome {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    #[serde(flatten)]
    pub result: DocumentResult,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentResult {
    Converted { pages: usize },
    Failed { error: String },
}

/// Summary of a batch run over a folder.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentOutcome>,
}

impl BatchReport {
    pub fn converted(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.result, DocumentResult::Converted { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.converted()
    }

    pub fn total_pages(&self) -> usize {
        self.documents
            .iter()
            .map(|d| match d.result {
                DocumentResult::Converted { pages } => pages,
                DocumentResult::Failed { .. } => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_report_counts() {
        let report = BatchReport {
            documents: vec![
                DocumentOutcome {
                    source: "a.pdf".into(),
                    output_dir: "out/a".into(),
                    result: DocumentResult::Converted { pages: 3 },
                },
                DocumentOutcome {
                    source: "b.pdf".into(),
                    output_dir: "out/b".into(),
                    result: DocumentResult::Failed {
                        error: "corrupt".into(),
                    },
                },
            ],
        };
        assert_eq!(report.converted(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_pages(), 3);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["documents"][1]["status"], "failed");
        assert_eq!(json["documents"][0]["pages"], 3);
    }
}
