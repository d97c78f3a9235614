//! File helpers for loading the knowledge base.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// SHA-256 hex digest of `content`.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}

/// Whether `path` looks like a plain-text document worth indexing.
///
/// Known document extensions are accepted outright, known binary formats are
/// rejected, anything else is sniffed for NUL bytes in its first 512 bytes.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if is_binary_extension(&ext) {
            return false;
        }
        if is_text_extension(&ext) {
            return true;
        }
    }

    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut buffer = [0u8; 512];
    let mut reader = std::io::BufReader::new(file);
    match reader.read(&mut buffer) {
        Ok(0) => true,
        Ok(n) => !buffer[..n].contains(&0),
        Err(_) => false,
    }
}

/// Read a UTF-8 file, refusing anything above `max_size` bytes.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read_to_string(path)
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "exe"
            | "dll"
            | "so"
            | "dylib"
            | "png"
            | "jpg"
            | "jpeg"
            | "gif"
            | "bmp"
            | "tif"
            | "tiff"
            | "webp"
            | "ico"
            | "mp3"
            | "mp4"
            | "mov"
            | "wav"
            | "zip"
            | "tar"
            | "gz"
            | "7z"
            | "pdf"
            | "doc"
            | "docx"
            | "xls"
            | "xlsx"
            | "ppt"
            | "pptx"
            | "db"
            | "sqlite"
            | "sqlite3"
            | "bin"
    )
}

fn is_text_extension(ext: &str) -> bool {
    matches!(
        ext,
        "txt"
            | "md"
            | "markdown"
            | "rst"
            | "adoc"
            | "org"
            | "csv"
            | "tsv"
            | "json"
            | "jsonl"
            | "yaml"
            | "yml"
            | "xml"
            | "html"
            | "htm"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_calculate_checksum() {
        let checksum = calculate_checksum("hello world");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, calculate_checksum("hello world"));
    }

    #[test]
    fn test_extension_classification() {
        assert!(is_text_file(&PathBuf::from("wheat_disease_guide.md")));
        assert!(is_text_file(&PathBuf::from("nutrients.txt")));
        assert!(!is_text_file(&PathBuf::from("field.png")));
        assert!(!is_text_file(&PathBuf::from("rb209.pdf")));
    }

    #[test]
    fn test_sniffs_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.field");
        std::fs::write(&text, "plain words").unwrap();
        assert!(is_text_file(&text));

        let binary = dir.path().join("blob.field");
        let mut f = std::fs::File::create(&binary).unwrap();
        f.write_all(&[0x89, 0x00, 0x01]).unwrap();
        assert!(!is_text_file(&binary));
    }

    #[test]
    fn test_read_file_content_enforces_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(64)).unwrap();

        assert!(read_file_content(&path, 10).is_err());
        assert_eq!(read_file_content(&path, 64).unwrap().len(), 64);
    }
}
