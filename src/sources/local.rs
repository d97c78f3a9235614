//! Knowledge-base directory loader.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::SourceError;
use crate::models::{Config, Document, meta};
use crate::services::category::CategoryClassifier;
use crate::utils::file::{calculate_checksum, is_text_file, read_file_content};

/// Loads one [`Document`] per text file under a root directory.
#[derive(Debug)]
pub struct KnowledgeBaseLoader {
    root: PathBuf,
    exclude_patterns: Vec<Pattern>,
    max_file_size: u64,
    classifier: CategoryClassifier,
}

impl KnowledgeBaseLoader {
    pub fn new(
        root: PathBuf,
        exclude_patterns: &[String],
        max_file_size: u64,
        classifier: CategoryClassifier,
    ) -> Self {
        let exclude_patterns = exclude_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            root,
            exclude_patterns,
            max_file_size,
            classifier,
        }
    }

    /// Loader for `root`, or the configured knowledge-base path.
    pub fn from_config(config: &Config, root: Option<PathBuf>) -> Self {
        Self::new(
            root.unwrap_or_else(|| config.indexing.knowledge_base_path.clone()),
            &config.indexing.exclude_patterns,
            config.indexing.max_file_size,
            CategoryClassifier::from_config(&config.categories),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Indexable files in walk order (sorted by name within each directory).
    pub fn collect_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        if !self.root.exists() {
            return Err(SourceError::NotFound(self.root.display().to_string()));
        }
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| SourceError::Walk(e.to_string()))?;
            let path = entry.path();

            if !entry.file_type().is_file() || self.is_excluded(path) {
                continue;
            }
            if is_text_file(path) {
                files.push(path.to_path_buf());
            } else {
                debug!(path = %path.display(), "skipping non-text file");
            }
        }

        Ok(files)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.exclude_patterns.iter().any(|p| p.matches(&path_str))
    }

    /// Path relative to the root with `/` separators; the file name when the
    /// root is the file itself.
    fn document_id(&self, path: &Path, filename: &str) -> String {
        match path.strip_prefix(&self.root) {
            Ok(relative) if !relative.as_os_str().is_empty() => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            _ => filename.to_string(),
        }
    }

    pub fn read_document(&self, path: &Path) -> Result<Document, SourceError> {
        let content = read_file_content(path, self.max_file_size)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let category = self.classifier.classify(&filename).to_string();
        let checksum = calculate_checksum(&content);

        Ok(Document::new(self.document_id(path, &filename), content)
            .with_metadata(meta::FILENAME, filename)
            .with_metadata(meta::PATH, path.display().to_string())
            .with_metadata(meta::CATEGORY, category)
            .with_metadata(meta::CHECKSUM, checksum))
    }

    /// Load every readable, non-blank file. Unreadable files are logged and
    /// skipped.
    pub fn load(&self) -> Result<Vec<Document>, SourceError> {
        let files = self.collect_files()?;
        let mut documents = Vec::with_capacity(files.len());

        for path in &files {
            match self.read_document(path) {
                Ok(doc) if doc.text.trim().is_empty() => {
                    debug!(path = %path.display(), "skipping empty file");
                }
                Ok(doc) => documents.push(doc),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
            }
        }

        info!(
            root = %self.root.display(),
            files = files.len(),
            documents = documents.len(),
            "loaded knowledge base"
        );
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::models::Chunk;

    fn loader(root: &Path) -> KnowledgeBaseLoader {
        KnowledgeBaseLoader::new(
            root.to_path_buf(),
            &["**/drafts/**".to_string()],
            1024,
            CategoryClassifier::default(),
        )
    }

    #[test]
    fn test_load_sets_metadata() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("wheat_guide.md"), "Drill winter wheat in October.").unwrap();

        let docs = loader(dir.path()).load().unwrap();
        assert_eq!(docs.len(), 1);

        let doc = &docs[0];
        assert_eq!(doc.id, "wheat_guide.md");
        assert_eq!(doc.metadata[meta::FILENAME], "wheat_guide.md");
        assert_eq!(doc.metadata[meta::CATEGORY], "wheat_cultivation");
        assert_eq!(doc.metadata[meta::CHECKSUM], calculate_checksum("Drill winter wheat in October."));
    }

    #[test]
    fn test_skips_excluded_binary_large_and_empty() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("drafts/old_barley.md"), "draft").unwrap();
        fs::write(dir.path().join("photo.png"), [0u8, 1, 2]).unwrap();
        fs::write(dir.path().join("huge.txt"), "x".repeat(2048)).unwrap();
        fs::write(dir.path().join("blank.txt"), "   \n").unwrap();
        fs::write(dir.path().join("oats.txt"), "Oats prefer cool, moist conditions.").unwrap();

        let docs = loader(dir.path()).load().unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["oats.txt"]);
    }

    #[test]
    fn test_same_file_name_in_sibling_folders() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("barley")).unwrap();
        fs::create_dir(dir.path().join("wheat")).unwrap();
        fs::write(dir.path().join("barley/guide.md"), "Barley tolerates drier soils.").unwrap();
        fs::write(dir.path().join("wheat/guide.md"), "Wheat needs a firm seedbed.").unwrap();

        let docs = loader(dir.path()).load().unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["barley/guide.md", "wheat/guide.md"]);
        assert!(docs.iter().all(|d| d.metadata[meta::FILENAME] == "guide.md"));

        let first = Chunk::from_document(&docs[0], docs[0].text.clone(), 0);
        let second = Chunk::from_document(&docs[1], docs[1].text.clone(), 0);
        assert_ne!(first.id, second.id);
        assert_eq!(first.citation(), "guide.md");
    }

    #[test]
    fn test_single_file_root_uses_file_name() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("maize.md");
        fs::write(&file, "Maize likes warm soil.").unwrap();

        let docs = loader(&file).load().unwrap();
        assert_eq!(docs[0].id, "maize.md");
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = loader(&dir.path().join("absent")).load().unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }
}
