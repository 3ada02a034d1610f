use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{Category, DocMetadata, NewDocument};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

/// Result of walking a directory: how many files were read and the chunks they produced.
#[derive(Debug, Default)]
pub struct ImportBatch {
    pub files: usize,
    pub documents: Vec<NewDocument>,
}

/// Turns a directory of `.txt` notes into documents ready for `add`.
///
/// Category comes from the first directory under the root when it names a
/// known category (`backup/rman.txt`), otherwise `custom`. Topic is the file stem.
#[derive(Default)]
pub struct DocumentImporter {
    chunking_config: ChunkingConfig,
}

impl DocumentImporter {
    pub fn new() -> Self { Self::default() }

    pub fn with_chunking(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }

    pub fn collect(&self, data_dir: &Path) -> Result<ImportBatch> {
        let files = self.list_txt_files(data_dir);
        if files.is_empty() {
            tracing::info!("No .txt files found under {}", data_dir.display());
            return Ok(ImportBatch::default());
        }
        let mut docs = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::info!("Importing file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let content = self.read_file_content(file_path)?;
            let metadata = self.metadata_for(file_path, data_dir);
            let chunks = self.chunk_content(&content);
            let total = chunks.len();
            for (chunk_index, chunk) in chunks.into_iter().enumerate() {
                let mut md = metadata.clone();
                if total > 1 {
                    md.extra.insert("chunk_index".into(), chunk_index.to_string());
                    md.extra.insert("total_chunks".into(), total.to_string());
                }
                docs.push(NewDocument::new(chunk, md)?);
            }
        }
        tracing::info!("Collected {} files into {} documents", files.len(), docs.len());
        Ok(ImportBatch { files: files.len(), documents: docs })
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path).with_context(|| format!("reading {}", file_path.display()))?).to_string()),
        }
    }

    fn metadata_for(&self, file_path: &Path, data_dir: &Path) -> DocMetadata {
        let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        let category = relative_path
            .components()
            .next()
            .filter(|_| relative_path.components().count() > 1)
            .and_then(|c| c.as_os_str().to_str())
            .and_then(|c| c.parse::<Category>().ok())
            .unwrap_or(Category::Custom);
        let topic = file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "imported".to_string());
        let mut md = DocMetadata::new(category, topic);
        md.source = file_path.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "import".to_string());
        md
    }

    /// Paragraph chunks; paragraphs over `max_tokens` are split into overlapping windows.
    pub fn chunk_content(&self, content: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim(); if paragraph.is_empty() { continue; }
            if self.count_tokens(paragraph) <= self.chunking_config.max_tokens { chunks.push(paragraph.to_string()); }
            else { chunks.extend(self.split_paragraph_with_overlap(paragraph)); }
        }
        chunks
    }

    fn count_tokens(&self, text: &str) -> usize { let word_count = text.split_whitespace().count(); (word_count as f32 / 0.75) as usize }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = ((self.chunking_config.max_tokens as f32 * 0.75) as usize).max(1);
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new(); let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }
}
