use crate::error::{EtlError, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One source file that parsed (possibly after repair).
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file_name: String,
    pub path: PathBuf,
    pub payload: Value,
}

/// Reads a directory of JSON record files and yields them one at a time.
pub struct Extractor {
    dir: PathBuf,
    file_pattern: Option<String>,
    max_files: Option<usize>,
}

impl Extractor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_pattern: None,
            max_files: None,
        }
    }

    /// Restrict to file names containing the given substring.
    pub fn with_pattern(mut self, pattern: Option<String>) -> Self {
        self.file_pattern = pattern;
        self
    }

    /// Cap the number of files processed, applied after listing in
    /// directory enumeration order.
    pub fn with_max_files(mut self, max_files: Option<usize>) -> Self {
        self.max_files = max_files;
        self
    }

    /// Lists matching files and returns a lazy single-pass stream over them.
    /// A missing directory is fatal; individual unparsable files are not.
    pub fn scan(&self) -> Result<RecordStream> {
        if !self.dir.is_dir() {
            return Err(EtlError::DataDirMissing(self.dir.clone()));
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(pattern) = &self.file_pattern {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if !name.contains(pattern.as_str()) {
                    continue;
                }
            }
            files.push(path);
        }

        if let Some(cap) = self.max_files {
            files.truncate(cap);
        }

        debug!("Matched {} files in {}", files.len(), self.dir.display());
        let total = files.len();
        Ok(RecordStream {
            files: files.into_iter(),
            total,
        })
    }
}

/// Finite, single-pass stream of parsed source files. Files that fail to
/// parse even after the repair attempt are skipped with a warning rather
/// than surfaced as stream errors.
pub struct RecordStream {
    files: std::vec::IntoIter<PathBuf>,
    total: usize,
}

impl RecordStream {
    /// Number of files matched at listing time, before any parse attempt.
    pub fn total_matched(&self) -> usize {
        self.total
    }
}

impl Iterator for RecordStream {
    type Item = SourceFile;

    fn next(&mut self) -> Option<SourceFile> {
        for path in self.files.by_ref() {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", path.display(), e);
                    continue;
                }
            };

            match parse_lenient(&content) {
                Some(payload) => {
                    return Some(SourceFile {
                        file_name,
                        path,
                        payload,
                    })
                }
                None => {
                    warn!("Skipping unparsable JSON file {}", path.display());
                }
            }
        }
        None
    }
}

/// Strict parse first; on failure applies one repair heuristic: content that
/// trails off after an array close (`...]` with no final `}`) gets a closing
/// brace appended and one retry.
fn parse_lenient(content: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(content) {
        return Some(value);
    }
    let trimmed = content.trim_end();
    if trimmed.ends_with(']') && !trimmed.ends_with('}') {
        let repaired = format!("{}}}", trimmed);
        return serde_json::from_str(&repaired).ok();
    }
    None
}
