//! Plain-text corpus loader used to seed the indexes during development.
//!
//! Paragraph splitting only; semantic chunking belongs to the ingestion
//! pipeline.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{DocId, DocumentChunk};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Paragraphs with more words than this are split into windows.
    pub max_words: usize,
    pub words_per_window: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_words: 300, words_per_window: 300, overlap_percent: 0.2 }
    }
}

#[derive(Default)]
pub struct CorpusLoader {
    chunking_config: ChunkingConfig,
}

impl CorpusLoader {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    /// Load every `.txt` file under `data_dir`, assigning sequential doc ids
    /// starting at 1 in sorted path order.
    pub fn load_directory(&self, data_dir: &Path) -> Result<Vec<DocumentChunk>> {
        self.load_directory_limited(data_dir, usize::MAX)
    }

    pub fn load_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<DocumentChunk>> {
        let mut files = self.list_txt_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited corpus to first files");
        }
        let mut all_chunks = Vec::new();
        let mut next_id: DocId = 1;
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), index = file_index + 1, total = files.len(), "loading file");
            let content = self.read_file_content(file_path)?;
            let chunks = self.chunk_content(&content, file_path, &mut next_id);
            all_chunks.extend(chunks);
        }
        info!(files = files.len(), chunks = all_chunks.len(), "corpus loaded");
        Ok(all_chunks)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn chunk_content(&self, content: &str, file_path: &Path, next_id: &mut DocId) -> Vec<DocumentChunk> {
        let source_path = file_path.to_string_lossy().to_string();
        let mut pieces = Vec::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() { continue; }
            if paragraph.split_whitespace().count() <= self.chunking_config.max_words {
                pieces.push(paragraph.to_string());
            } else {
                pieces.extend(self.split_paragraph_with_overlap(paragraph));
            }
        }
        let total_chunks = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| {
                let doc_id = *next_id;
                *next_id += 1;
                DocumentChunk { doc_id, source_path: source_path.clone(), content, chunk_index, total_chunks }
            })
            .collect()
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = self.chunking_config.words_per_window.max(1);
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
            .collect();
        txt_files.sort();
        txt_files
    }
}
