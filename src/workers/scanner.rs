use super::cleanup::prune_missing;
use crate::infrastructure::library::scanner::LibraryScanner;
use crate::infrastructure::library::Upsert;
use crate::modules::jobs::model::ScanKind;
use crate::modules::jobs::registry::JobTicket;
use crate::modules::jobs::runner::Job;
use crate::modules::jobs::service::JobService;
use crate::state::AppState;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Progress is published every this many processed files.
const PROGRESS_EVERY: usize = 50;

pub struct ScanJob {
    state: AppState,
    kind: ScanKind,
    chain_thumbnails: AtomicBool,
}

impl ScanJob {
    pub fn new(state: AppState, kind: ScanKind) -> Self {
        Self {
            state,
            kind,
            chain_thumbnails: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Job for ScanJob {
    async fn run(&self, ticket: &JobTicket) -> Result<String> {
        let kind = self.kind;
        ticket.report(kind.describe("Loading existing library records..."), 0, 0).await;
        let known = self.state.library.known_paths().await?;
        debug!("Loaded {} existing records", known.len());

        let scanner = LibraryScanner::new(self.state.config.library_dir.clone());
        let discovered = tokio::task::spawn_blocking(move || scanner.discover()).await?;
        let total = discovered.len() as u64;
        ticket.report(kind.describe(&format!("Found {total} files.")), 0, total).await;

        let (mut added, mut updated, mut skipped) = (0usize, 0usize, 0usize);
        let mut found = HashSet::with_capacity(discovered.len());

        for (i, video) in discovered.iter().enumerate() {
            found.insert(video.video_path.clone());

            if kind == ScanKind::New && known.contains(&video.video_path) {
                skipped += 1;
            } else {
                match self.state.library.upsert(video).await {
                    Ok(Upsert::Added) => added += 1,
                    Ok(Upsert::Updated) => updated += 1,
                    Err(e) => warn!("Failed to record {}: {:#}", video.video_path, e),
                }
            }

            if (i + 1) % PROGRESS_EVERY == 0 {
                ticket
                    .report(kind.describe(&format!("Scanning... {added} new.")), (i + 1) as u64, total)
                    .await;
            }
        }

        let mut removed = 0;
        if kind == ScanKind::Full {
            ticket.report(kind.describe("Pruning deleted videos..."), total, total).await;
            removed = prune_missing(&self.state, &found).await?;
        }

        info!(
            "Scan finished. Added: {}, Updated: {}, Skipped: {}, Removed: {}",
            added, updated, skipped, removed
        );

        if self.state.config.auto_chain_thumbnails && added + updated > 0 {
            self.chain_thumbnails.store(true, Ordering::SeqCst);
        }

        Ok(format!(
            "Scan complete. Added {added}, updated {updated}, removed {removed}."
        ))
    }

    async fn after_finish(&self) {
        if !self.chain_thumbnails.load(Ordering::SeqCst) {
            return;
        }
        match JobService::start_thumbnails(self.state.clone()).await {
            Ok(_) => info!("Chained thumbnail generation after scan"),
            Err(e) => debug!("Thumbnail chain skipped: {}", e),
        }
    }
}
