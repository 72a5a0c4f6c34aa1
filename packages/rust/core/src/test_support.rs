//! Deterministic in-process collaborators for pipeline tests.

use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use pdfrag_loader::PageLoader;
use pdfrag_providers::{ChatModel, Embedder, Prompt};
use pdfrag_shared::{Page, PdfRagError, Result};
use uuid::Uuid;

pub fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pdfrag-{label}-{}", Uuid::now_v7()))
}

/// Bag-of-words embedder: each lowercase word bumps one hashed dimension.
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimensions: 64 }
    }
}

impl HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimensions];
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % self.dimensions as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

/// Chat model replaying canned replies and keeping every prompt it saw.
pub struct RecordingChat {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl RecordingChat {
    pub fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PdfRagError::Provider("no canned reply left".into()))
    }
}

/// Page loader returning fixed pages, or failing, without reading the file.
pub struct FakeLoader {
    pub pages: Vec<Page>,
    fail: bool,
}

impl FakeLoader {
    pub fn three_pages() -> Self {
        let texts = [
            "Acme Corp annual report. Revenue reached 4.2 million dollars.",
            "The company hired forty engineers and opened a Berlin office.",
            "Outlook: the board expects steady growth and a new product line.",
        ];
        Self {
            pages: texts
                .iter()
                .enumerate()
                .map(|(number, text)| Page {
                    number,
                    text: text.to_string(),
                })
                .collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            pages: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl PageLoader for FakeLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Page>> {
        if self.fail {
            return Err(PdfRagError::parse(format!(
                "not a PDF: {}",
                path.display()
            )));
        }
        Ok(self.pages.clone())
    }
}
