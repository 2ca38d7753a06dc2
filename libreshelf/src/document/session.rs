///! Reading session: one open document plus the reader's position in it
use std::path::Path;

use super::{reader_for, BookFormat, Content, DocumentReader, DocumentSummary};
use crate::utils::error::{DocumentError, Result};

pub struct ReadingSession {
    reader: Box<dyn DocumentReader>,
    summary: DocumentSummary,
    current: usize,
}

impl ReadingSession {
    /// Open `path` with the reader for its declared format
    pub fn open(format: BookFormat, path: &Path) -> Result<Self> {
        let reader = reader_for(format).ok_or_else(|| {
            DocumentError::UnsupportedFormat(format!("No reader for {:?}", path))
        })?;
        Self::with_reader(reader, path)
    }

    /// Open `path` with a caller-supplied reader
    pub fn with_reader(mut reader: Box<dyn DocumentReader>, path: &Path) -> Result<Self> {
        let summary = reader.open(path)?;
        Ok(Self {
            reader,
            summary,
            current: 0,
        })
    }

    pub fn summary(&self) -> &DocumentSummary {
        &self.summary
    }

    pub fn unit_count(&self) -> usize {
        self.summary.unit_count
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Move to `index`, clamped into the document. Returns the new position.
    pub fn go_to(&mut self, index: usize) -> usize {
        self.current = index.min(self.unit_count().saturating_sub(1));
        self.current
    }

    /// Step forward; `false` at the last unit
    pub fn next(&mut self) -> bool {
        if self.current + 1 < self.unit_count() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Step back; `false` at the first unit
    pub fn previous(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    /// Fraction read, counting the current unit; 0 for an empty document
    pub fn progress(&self) -> f32 {
        match self.unit_count() {
            0 => 0.0,
            count => (self.current + 1) as f32 / count as f32,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.unit_count() > 0 && self.current + 1 == self.unit_count()
    }

    pub fn current_content(&self) -> Result<Content> {
        self.reader.fetch(self.current)
    }

    /// Release the document
    pub fn close(mut self) {
        self.reader.close();
    }
}
