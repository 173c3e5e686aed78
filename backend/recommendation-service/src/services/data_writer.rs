//! Interaction dataset writer.
//!
//! Output is one `user_id,item_id` record per line, the format read back by
//! [`crate::services::recommender::loader`].

use crate::error::{AppError, Result};
use crate::models::{ItemId, UserId};
use crate::services::id_migrator::ensure_parent_dir;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const FIELD_DELIMITER: char = ',';

/// Sink for normalized interactions.
///
/// Lifecycle per rebuild: `reset` once, `write` any number of times, then
/// `close` on every exit path.
pub trait InteractionWriter: Send {
    /// Acquire the output, truncating whatever a previous pass left behind.
    fn reset(&mut self) -> Result<()>;

    fn write(&mut self, user_id: UserId, item_id: ItemId) -> Result<()>;

    /// Flush buffered records and release the output.
    fn close(&mut self) -> Result<()>;

    /// Records written since the last `reset`.
    fn written(&self) -> usize;
}

/// File-backed writer for the delimited dataset.
pub struct FileInteractionWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    written: usize,
}

impl FileInteractionWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            out: None,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InteractionWriter for FileInteractionWriter {
    fn reset(&mut self) -> Result<()> {
        // Release any handle left open by an interrupted pass first.
        if self.out.is_some() {
            self.close()?;
        }

        ensure_parent_dir(&self.path)?;
        let file = File::create(&self.path)?;
        self.out = Some(BufWriter::new(file));
        self.written = 0;

        debug!(path = %self.path.display(), "Interaction data file reset");
        Ok(())
    }

    fn write(&mut self, user_id: UserId, item_id: ItemId) -> Result<()> {
        let out = self.out.as_mut().ok_or_else(|| {
            AppError::StoreIo(format!(
                "interaction writer for {} used before reset",
                self.path.display()
            ))
        })?;

        writeln!(out, "{}{}{}", user_id, FIELD_DELIMITER, item_id)?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };

        out.flush()?;
        out.get_ref().sync_all()?;

        debug!(
            path = %self.path.display(),
            records = self.written,
            "Interaction data file closed"
        );
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}

impl Drop for FileInteractionWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(
                path = %self.path.display(),
                error = %err,
                "Failed to flush interaction data file on drop"
            );
        }
    }
}
