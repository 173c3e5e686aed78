use crate::db::PurchaseSource;
use crate::error::{AppError, Result};
use crate::services::data_writer::InteractionWriter;
use crate::services::id_migrator::IdMigrator;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

/// Counters for one extraction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub purchases: usize,
    pub new_users: usize,
}

/// Pulls raw purchases, normalizes user keys through the id migrator and
/// forwards the interactions to a writer.
pub struct InteractionExtractor {
    migrator: Arc<IdMigrator>,
}

impl InteractionExtractor {
    pub fn new(migrator: Arc<IdMigrator>) -> Self {
        Self { migrator }
    }

    /// Run one full pass: reset the writer, copy every row, then close the
    /// writer and flush new id allocations whether or not the copy succeeded.
    pub async fn extract(
        &self,
        source: &dyn PurchaseSource,
        writer: &mut dyn InteractionWriter,
    ) -> Result<ExtractionStats> {
        writer.reset()?;
        let users_before = self.migrator.len();

        let copied = self.copy_rows(source, writer).await;
        let closed = writer.close();
        let flushed = self.migrator.flush();

        let purchases = match copied {
            Ok(purchases) => purchases,
            Err(err) => {
                warn!(
                    written = writer.written(),
                    error = %err,
                    "Purchase extraction aborted"
                );
                return Err(err);
            }
        };
        closed?;
        flushed?;

        let stats = ExtractionStats {
            purchases,
            new_users: self.migrator.len().saturating_sub(users_before),
        };

        info!(
            purchases = stats.purchases,
            new_users = stats.new_users,
            "Retrieved purchases"
        );

        Ok(stats)
    }

    async fn copy_rows(
        &self,
        source: &dyn PurchaseSource,
        writer: &mut dyn InteractionWriter,
    ) -> Result<usize> {
        let mut rows = source.purchases();
        let mut count = 0usize;

        while let Some(row) = rows.next().await {
            let record = row.map_err(|err| match err {
                AppError::Extraction(_) => err,
                other => AppError::Extraction(other.to_string()),
            })?;

            let user_id = self.migrator.id_for(&record.user_key, true)?;
            writer.write(user_id, record.item_id)?;
            count += 1;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryPurchaseSource;
    use crate::models::{ItemId, PurchaseRecord, UserId};
    use crate::services::data_writer::FileInteractionWriter;
    use futures::stream::{self, BoxStream};
    use std::fs;
    use tempfile::TempDir;

    /// Writer that records calls in memory.
    #[derive(Default)]
    struct RecordingWriter {
        records: Vec<(UserId, ItemId)>,
        resets: usize,
        closes: usize,
    }

    impl InteractionWriter for RecordingWriter {
        fn reset(&mut self) -> Result<()> {
            self.records.clear();
            self.resets += 1;
            Ok(())
        }

        fn write(&mut self, user_id: UserId, item_id: ItemId) -> Result<()> {
            self.records.push((user_id, item_id));
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closes += 1;
            Ok(())
        }

        fn written(&self) -> usize {
            self.records.len()
        }
    }

    /// Yields some rows and then fails, like a dropped database connection.
    struct FlakySource;

    impl PurchaseSource for FlakySource {
        fn purchases(&self) -> BoxStream<'_, Result<PurchaseRecord>> {
            Box::pin(stream::iter(vec![
                Ok(PurchaseRecord::new("alice", 1)),
                Ok(PurchaseRecord::new("bob", 2)),
                Err(AppError::StoreIo("connection reset".to_string())),
            ]))
        }
    }

    fn migrator(dir: &TempDir) -> Arc<IdMigrator> {
        Arc::new(IdMigrator::open(dir.path().join("ids.jsonl")).unwrap())
    }

    #[tokio::test]
    async fn test_extract_normalizes_user_keys() {
        let dir = TempDir::new().unwrap();
        let migrator = migrator(&dir);
        let extractor = InteractionExtractor::new(migrator.clone());
        let source = InMemoryPurchaseSource::new(vec![
            PurchaseRecord::new("alice", 10),
            PurchaseRecord::new("bob", 10),
            PurchaseRecord::new("alice", 11),
        ]);
        let mut writer = RecordingWriter::default();

        let stats = extractor.extract(&source, &mut writer).await.unwrap();

        assert_eq!(stats, ExtractionStats { purchases: 3, new_users: 2 });
        let alice = migrator.to_id("alice").unwrap();
        let bob = migrator.to_id("bob").unwrap();
        assert_eq!(writer.records, vec![(alice, 10), (bob, 10), (alice, 11)]);
        assert_eq!((writer.resets, writer.closes), (1, 1));
        assert_eq!(migrator.pending(), 0);
    }

    #[tokio::test]
    async fn test_ids_are_stable_across_passes() {
        let dir = TempDir::new().unwrap();
        let migrator = migrator(&dir);
        let extractor = InteractionExtractor::new(migrator.clone());
        let source = InMemoryPurchaseSource::new(vec![PurchaseRecord::new("alice", 1)]);
        let mut writer = RecordingWriter::default();

        extractor.extract(&source, &mut writer).await.unwrap();
        let first = writer.records.clone();

        source.push(PurchaseRecord::new("bob", 2));
        let stats = extractor.extract(&source, &mut writer).await.unwrap();

        assert_eq!(stats.new_users, 1);
        assert_eq!(writer.records[0], first[0]);
    }

    #[tokio::test]
    async fn test_source_failure_still_closes_and_flushes() {
        let dir = TempDir::new().unwrap();
        let migrator = migrator(&dir);
        let extractor = InteractionExtractor::new(migrator.clone());
        let data_path = dir.path().join("data.csv");
        let mut writer = FileInteractionWriter::new(&data_path);

        let err = extractor
            .extract(&FlakySource, &mut writer)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Extraction(_)));
        // Partial output was flushed to disk and the writer released.
        assert_eq!(fs::read_to_string(&data_path).unwrap().lines().count(), 2);
        // Allocated ids were persisted.
        assert_eq!(migrator.pending(), 0);
        let reloaded = IdMigrator::open(dir.path().join("ids.jsonl")).unwrap();
        assert_eq!(reloaded.len(), 2);
    }
}
