///! Runs a document reader on tokio's blocking pool
///!
///! The reader sits behind a mutex so only one task uses it at a time.
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{reader_for, BookFormat, Content, DocumentReader, DocumentSummary};
use crate::utils::error::{DocumentError, Result};

#[derive(Clone)]
pub struct DocumentWorker {
    reader: Arc<Mutex<Box<dyn DocumentReader>>>,
}

impl DocumentWorker {
    pub fn new(reader: Box<dyn DocumentReader>) -> Self {
        Self {
            reader: Arc::new(Mutex::new(reader)),
        }
    }

    /// Worker for a declared format, `None` for [`BookFormat::Unknown`]
    pub fn for_format(format: BookFormat) -> Option<Self> {
        reader_for(format).map(Self::new)
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn DocumentReader) -> Result<T> + Send + 'static,
    {
        let reader = Arc::clone(&self.reader);

        tokio::task::spawn_blocking(move || {
            // A panic inside a reader call leaves the reader usable
            let mut guard = reader.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut **guard)
        })
        .await
        .map_err(|e| {
            DocumentError::Io(std::io::Error::other(format!(
                "Document task failed: {}",
                e
            )))
        })?
    }

    pub async fn open(&self, path: impl Into<PathBuf>) -> Result<DocumentSummary> {
        let path = path.into();
        self.run(move |reader| reader.open(&path)).await
    }

    pub async fn unit_count(&self) -> Result<usize> {
        self.run(|reader| reader.unit_count()).await
    }

    pub async fn fetch(&self, index: usize) -> Result<Content> {
        self.run(move |reader| reader.fetch(index)).await
    }

    pub async fn close(&self) {
        // close cannot fail; only a lost task could error here
        if let Err(e) = self.run(|reader| {
            reader.close();
            Ok(())
        })
        .await
        {
            tracing::warn!("Close failed: {}", e);
        }
    }

    pub async fn is_open(&self) -> bool {
        self.run(|reader| Ok(reader.is_open())).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::comic::tests::sample_cbz;
    use crate::document::epub::tests::{sample_epub, CHAP1};

    #[tokio::test]
    async fn test_open_fetch_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_epub(dir.path());

        let worker = DocumentWorker::for_format(BookFormat::Epub).unwrap();
        assert_eq!(worker.open(&path).await.unwrap().unit_count, 2);
        assert_eq!(worker.unit_count().await.unwrap(), 2);
        assert_eq!(worker.fetch(0).await.unwrap().as_markup(), Some(CHAP1));

        worker.close().await;
        worker.close().await;
        assert!(!worker.is_open().await);
        assert!(matches!(worker.fetch(0).await, Err(DocumentError::NotOpen)));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_cbz(dir.path());

        let worker = DocumentWorker::for_format(BookFormat::Cbz).unwrap();
        worker.open(path).await.unwrap();

        let a = worker.clone();
        let b = worker.clone();
        let (first, last) = tokio::join!(a.fetch(0), b.fetch(2));
        assert_eq!(first.unwrap().as_image().unwrap().width(), 1);
        assert_eq!(last.unwrap().as_image().unwrap().width(), 10);
    }

    #[test]
    fn test_unknown_format_has_no_worker() {
        assert!(DocumentWorker::for_format(BookFormat::Unknown).is_none());
    }
}
