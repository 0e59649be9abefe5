use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::chunking::SizeChunker;
use crate::error::{Error, Result};
use crate::traits::Chunker;
use crate::types::{Chunk, Document};

/// Turns a directory of `.txt` files into documents and chunks.
pub struct DataProcessor {
    chunker: Box<dyn Chunker>,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self { chunker: Box::new(SizeChunker::default()) }
    }
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_chunker(chunker: Box<dyn Chunker>) -> Self { Self { chunker } }

    /// One document per `.txt` file, sorted by path. The id is the path relative
    /// to `data_dir`; the relative parent directory is kept as `category`.
    pub fn load_documents(&self, data_dir: &Path) -> Result<Vec<Document>> {
        self.load_documents_limited(data_dir, usize::MAX)
    }

    pub fn load_documents_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Document>> {
        let mut files = self.list_txt_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited input files");
        }
        let mut docs = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(n = file_index + 1, total = files.len(), path = %file_path.display(), "reading file");
            let content = self.read_file_content(file_path)?;
            let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
            let doc = Document::with_id(relative.to_string_lossy(), content)
                .with_meta("doc_path", file_path.to_string_lossy())
                .with_meta("category", self.get_facet_from_path(relative));
            docs.push(doc);
        }
        Ok(docs)
    }

    /// Chunks of every `.txt` file under `data_dir`, in file order.
    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> {
        let docs = self.load_documents(data_dir)?;
        let chunks: Vec<Chunk> = docs.iter().flat_map(|d| self.chunk_document(d)).collect();
        info!(files = docs.len(), chunks = chunks.len(), "processed directory");
        Ok(chunks)
    }

    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.chunker.chunk(&doc.id, &doc.content)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        let bytes = fs::read(file_path)
            .map_err(|e| Error::InvalidInput(format!("cannot read {}: {e}", file_path.display())))?;
        Ok(match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    fn get_facet_from_path(&self, relative_path: &Path) -> String {
        match relative_path.parent().and_then(|p| p.to_str()) {
            Some(facet) if !facet.is_empty() => facet.to_string(),
            _ => "misc".to_string(),
        }
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort();
        txt_files
    }
}
