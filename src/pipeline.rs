/// Pipeline Module
///
/// Drives one dataset through the ETL stages: Discover → Extract → Load,
/// one transaction per file, with progress reporting and run statistics.
use crate::db::statements::StatementCatalog;
use crate::db::warehouse::Warehouse;
use crate::error::EtlError;
use crate::etl::{
    discover::FileDiscovery,
    extract::{Extracted, Extractor},
    load,
};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::{Duration, Instant};

/// Statistics for one dataset run
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    pub dataset: &'static str,
    pub files_found: usize,
    pub files_processed: usize,
    pub statements_executed: usize,
    pub lookups_hit: usize,
    pub lookups_missed: usize,
    pub elapsed_time: Duration,
}

impl LoadStats {
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.files_processed as f64 / secs
        }
    }

    pub fn lookup_hit_rate(&self) -> f64 {
        let total = self.lookups_hit + self.lookups_missed;
        if total == 0 {
            0.0
        } else {
            (self.lookups_hit as f64 / total as f64) * 100.0
        }
    }
}

/// Loads every data file below a root through an extractor
///
/// The first failing file is rolled back and aborts the run; files committed
/// before it stay loaded.
pub struct BatchLoader<'a, W: Warehouse> {
    warehouse: &'a mut W,
    catalog: &'a StatementCatalog,
    discovery: FileDiscovery,
}

impl<'a, W: Warehouse> BatchLoader<'a, W> {
    pub fn new(warehouse: &'a mut W, catalog: &'a StatementCatalog, discovery: FileDiscovery) -> Self {
        Self { warehouse, catalog, discovery }
    }

    pub async fn run<E: Extractor>(&mut self, root: &Path, extractor: &E) -> Result<LoadStats> {
        let start_time = Instant::now();
        let mut stats = LoadStats { dataset: extractor.dataset(), ..Default::default() };

        let files = self
            .discovery
            .discover(root)
            .with_context(|| format!("Failed to discover files in {}", root.display()))?;
        stats.files_found = files.len();

        tracing::info!("Loading {} ({} files from {})", stats.dataset, files.len(), root.display());
        println!("{} files found in {}", files.len(), root.display());

        for (index, path) in files.iter().enumerate() {
            self.load_file(path, extractor, &mut stats)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?;

            stats.files_processed += 1;
            println!("{}/{} files processed.", index + 1, files.len());
        }

        stats.elapsed_time = start_time.elapsed();
        tracing::info!("Finished {} in {:.2}s", stats.dataset, stats.elapsed_time.as_secs_f64());

        Ok(stats)
    }

    /// One file, one transaction: commit on success, roll back on any error
    async fn load_file<E: Extractor>(&mut self, path: &Path, extractor: &E, stats: &mut LoadStats) -> Result<()> {
        self.warehouse.begin().await.context("Failed to open transaction")?;

        match self.extract_and_execute(path, extractor).await {
            Ok((extracted, executed)) => {
                self.warehouse.commit().await.context("Failed to commit file")?;

                stats.statements_executed += executed;
                stats.lookups_hit += extracted.lookups_hit;
                stats.lookups_missed += extracted.lookups_missed;
                tracing::debug!("Committed {} statements from {}", executed, path.display());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Rolling back {}: {}", path.display(), e);
                if let Err(rollback_err) = self.warehouse.rollback().await {
                    tracing::error!("Rollback failed for {}: {}", path.display(), rollback_err);
                }
                Err(e.into())
            }
        }
    }

    async fn extract_and_execute<E: Extractor>(
        &mut self,
        path: &Path,
        extractor: &E,
    ) -> Result<(Extracted, usize), EtlError> {
        let extracted = extractor.extract(path, &mut *self.warehouse, self.catalog).await?;
        let executed = load::execute_invocations(&mut *self.warehouse, self.catalog, &extracted.invocations).await?;

        Ok((extracted, executed))
    }
}

/// Print the summary for one dataset run
pub fn print_stats(stats: &LoadStats) {
    println!("\n📊 {} statistics:", stats.dataset);
    println!("   ⏱️  Total time: {:.2}s", stats.elapsed_time.as_secs_f64());
    println!("   📁 Files: {} found, {} processed", stats.files_found, stats.files_processed);
    println!("   💾 Statements executed: {}", stats.statements_executed);
    if stats.lookups_hit + stats.lookups_missed > 0 {
        println!(
            "   🔗 Song lookups: {} matched, {} unmatched ({:.1}% hit rate)",
            stats.lookups_hit,
            stats.lookups_missed,
            stats.lookup_hit_rate()
        );
    }
    println!("   ⚡ Speed: {:.2} files/sec", stats.files_per_second());
}
