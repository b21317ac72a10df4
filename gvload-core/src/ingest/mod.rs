//! Ingestion layer for exported pages
//!
//! Walks an export directory, classifies every page and collects the
//! recognized documents for reconciliation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  Export pages   │ ──► │     Ingestor     │ ──► │  Vec<Document>   │
//! │ (Calls/*.html)  │     │                  │     │  + IngestResult  │
//! └─────────────────┘     └──────────────────┘     └──────────────────┘
//!                               │
//!                               ▼
//!                    ┌──────────────────────┐
//!                    │  decode_page         │
//!                    │  HtmlDocument        │
//!                    │  classify_document   │
//!                    └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gvload_core::ingest::Ingestor;
//!
//! let ingestor = Ingestor::new("Takeout/Voice/Calls", vec!["15550001111".into()]);
//! let result = ingestor.ingest_all()?;
//! println!("{} documents from {} files", result.documents.len(), result.files_processed);
//! ```

use crate::error::Result;
use crate::extract::{classify_document, decode_page, DocumentContext, HtmlDocument};
use crate::types::{flatten_documents, Document, Record};
use std::path::{Path, PathBuf};

/// Default page extension
pub const DEFAULT_EXTENSION: &str = "html";

/// Default interval, in files, between progress log lines
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

/// Result of ingesting a whole export directory.
#[derive(Debug, Default)]
pub struct IngestResult {
    /// Recognized documents, in file order
    pub documents: Vec<Document>,
    /// Number of files read and classified (recognized or not)
    pub files_processed: usize,
    /// Files that matched no record kind
    pub unrecognized: Vec<PathBuf>,
    /// Errors encountered (file path → error message)
    pub errors: Vec<(PathBuf, String)>,
    /// Conversations with more than two parties
    pub multi_party: usize,
}

impl IngestResult {
    /// Count of recognized documents of each kind: (conversations, calls, audio)
    pub fn kind_counts(&self) -> (usize, usize, usize) {
        self.documents
            .iter()
            .fold((0, 0, 0), |(texts, calls, audio), doc| match doc {
                Document::Conversation(_) => (texts + 1, calls, audio),
                Document::Call(_) => (texts, calls + 1, audio),
                Document::Audio(_) => (texts, calls, audio + 1),
            })
    }

    /// Explode into persisted records.
    pub fn into_records(self) -> Vec<Record> {
        flatten_documents(self.documents)
    }
}

/// Reads and classifies the pages of one export directory.
pub struct Ingestor {
    root: PathBuf,
    extension: String,
    progress_every: usize,
    context: DocumentContext,
}

impl Ingestor {
    /// Create an ingestor for `root`, owned by the account with `my_numbers`.
    pub fn new(root: impl Into<PathBuf>, my_numbers: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            progress_every: DEFAULT_PROGRESS_EVERY,
            context: DocumentContext::new(my_numbers),
        }
    }

    /// Only read files with this extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Log progress after every `n` files (0 disables).
    pub fn with_progress_every(mut self, n: usize) -> Self {
        self.progress_every = n;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discover page files directly inside the export directory.
    pub fn discover_files(&self) -> Result<Vec<PathBuf>> {
        let escaped = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = format!("{}/*.{}", escaped, self.extension);

        let mut files: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable directory entry");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        tracing::info!(
            root = %self.root.display(),
            count = files.len(),
            "Discovered export pages"
        );
        Ok(files)
    }

    /// Read and classify one page.
    ///
    /// `Ok(None)` means the page is not a record of any known kind.
    pub fn ingest_file(&self, path: &Path) -> Result<Option<Document>> {
        let bytes = std::fs::read(path)?;
        let doc = HtmlDocument::parse(&decode_page(&bytes));
        let root = doc.root();
        let ctx = self.context.for_page(&root);
        classify_document(&root, &ctx)
    }

    /// Ingest every discovered page.
    pub fn ingest_all(&self) -> Result<IngestResult> {
        self.ingest_all_with_progress(|_, _, _| {})
    }

    /// Ingest every discovered page with progress callback.
    ///
    /// The callback receives `(current_file_index, total_files, file_path)`
    /// before each file is processed. A file that fails to read or parse is
    /// recorded in [`IngestResult::errors`] and the batch continues.
    pub fn ingest_all_with_progress<F>(&self, mut on_progress: F) -> Result<IngestResult>
    where
        F: FnMut(usize, usize, &Path),
    {
        let files = self.discover_files()?;
        let total = files.len();
        let mut result = IngestResult::default();

        for (i, path) in files.iter().enumerate() {
            on_progress(i, total, path);

            match self.ingest_file(path) {
                Ok(Some(document)) => {
                    if let Document::Conversation(c) = &document {
                        if c.multi_party {
                            result.multi_party += 1;
                            tracing::warn!(path = %path.display(), "Multi-party conversation");
                        }
                    }
                    tracing::debug!(
                        path = %path.display(),
                        kind = document.kind(),
                        "Recognized page"
                    );
                    result.documents.push(document);
                }
                Ok(None) => {
                    tracing::info!(path = %path.display(), "Unrecognized page");
                    result.unrecognized.push(path.clone());
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse page");
                    result.errors.push((path.clone(), e.to_string()));
                    continue;
                }
            }

            result.files_processed += 1;
            if self.progress_every > 0 && result.files_processed % self.progress_every == 0 {
                tracing::info!(files_processed = result.files_processed, "Processed files");
            }
        }

        let (conversations, calls, audio) = result.kind_counts();
        tracing::info!(
            files_processed = result.files_processed,
            conversations,
            calls,
            audio,
            unrecognized = result.unrecognized.len(),
            errors = result.errors.len(),
            "Ingest complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallType;
    use std::fs;
    use tempfile::TempDir;

    const CALL_PAGE: &str = r##"<html><head><title>Placed call</title></head><body>
        <div class="haudio">
          <div class="contributor vcard"><a class="tel" href="tel:+15553334444"><span class="fn">Bob</span></a></div>
          <abbr class="published" title="2012-01-02T10:00:00.000-05:00">Jan 2</abbr>
          <abbr class="duration" title="PT1M5S">(00:01:05)</abbr>
          <div class="tags"><a rel="tag" href="http://www.google.com/voice#placed">Placed</a></div>
        </div></body></html>"##;

    const TEXT_PAGE: &str = r#"<html><head><title>Bob</title></head><body>
        <div class="hChatLog hfeed">
          <div class="message">
            <abbr class="dt" title="2012-01-02T10:00:00.000Z">10:00</abbr>
            <cite class="sender vcard"><a class="tel" href="tel:+15553334444"><span class="fn">Bob</span></a></cite>
            <q>hi there</q>
          </div>
        </div></body></html>"#;

    const BAD_DATE_PAGE: &str = r##"<html><body><div class="haudio">
          <div class="contributor vcard"><a class="tel" href="tel:+1"><span class="fn">B</span></a></div>
          <abbr class="published" title="sometime">x</abbr>
        </div></body></html>"##;

    fn export_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Bob - Placed - 2012.html"), CALL_PAGE).unwrap();
        fs::write(dir.path().join("Bob - Text - 2012.html"), TEXT_PAGE).unwrap();
        fs::write(dir.path().join("index.html"), "<html><body>Index</body></html>").unwrap();
        fs::write(dir.path().join("broken.html"), BAD_DATE_PAGE).unwrap();
        fs::write(dir.path().join("notes.txt"), CALL_PAGE).unwrap();
        dir
    }

    fn ingestor(dir: &TempDir) -> Ingestor {
        Ingestor::new(dir.path(), vec!["15550001111".to_string()])
    }

    #[test]
    fn test_discover_only_matching_extension() {
        let dir = export_dir();
        let files = ingestor(&dir).discover_files().unwrap();
        assert_eq!(files.len(), 4);
        assert!(files.iter().all(|f| f.extension().unwrap() == "html"));
    }

    #[test]
    fn test_ingest_all_tallies() {
        let dir = export_dir();
        let mut seen = Vec::new();
        let result = ingestor(&dir)
            .ingest_all_with_progress(|i, total, _| seen.push((i, total)))
            .unwrap();

        assert_eq!(seen.len(), 4);
        assert_eq!(seen[3], (3, 4));
        assert_eq!(result.files_processed, 3);
        assert_eq!(result.kind_counts(), (1, 1, 0));
        assert_eq!(result.unrecognized.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].0.ends_with("broken.html"));
        assert_eq!(result.multi_party, 0);
    }

    #[test]
    fn test_ingest_file_call() {
        let dir = export_dir();
        let path = dir.path().join("Bob - Placed - 2012.html");
        match ingestor(&dir).ingest_file(&path).unwrap() {
            Some(Document::Call(call)) => {
                assert_eq!(call.calltype, Some(CallType::Placed));
                assert_eq!(call.duration.map(|d| d.num_seconds()), Some(65));
                assert_eq!(call.base.contact.phonenumber.as_deref(), Some("15553334444"));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_into_records_flattens() {
        let dir = export_dir();
        let records = ingestor(&dir).ingest_all().unwrap().into_records();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Record::Call(_)));
        assert!(matches!(records[1], Record::Text(_)));
    }

    #[test]
    fn test_custom_extension() {
        let dir = export_dir();
        let result = ingestor(&dir).with_extension("txt").ingest_all().unwrap();
        assert_eq!(result.kind_counts(), (0, 1, 0));
    }
}
