//! JSON-lines event feed.
//!
//! One [`EventEnvelope`] per line. Blank lines and lines starting with `#`
//! are skipped.

use circles_projection::EventEnvelope;
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to read event feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed event on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub struct EventFeed<R> {
    lines: Lines<R>,
    line: usize,
}

impl EventFeed<BufReader<File>> {
    pub async fn open(path: &Path) -> Result<Self, FeedError> {
        let file = File::open(path).await?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> EventFeed<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    /// Next envelope, or `None` at end of input.
    pub async fn next_event(&mut self) -> Result<Option<EventEnvelope>, FeedError> {
        while let Some(raw) = self.lines.next_line().await? {
            self.line += 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let envelope = serde_json::from_str(trimmed).map_err(|source| FeedError::Parse {
                line: self.line,
                source,
            })?;
            return Ok(Some(envelope));
        }
        Ok(None)
    }

    /// Lines consumed so far.
    pub fn line(&self) -> usize {
        self.line
    }
}
