//! Matching pipeline orchestration.
//!
//! When a report is created or its content changes, the pipeline runs:
//! embed (overwriting any cached embedding, so edits and late image uploads
//! take effect), register with the matcher's index, query for top-K
//! candidates, record deduplicated matches, and fan out notifications for
//! each newly recorded pairing. The matcher keeps its index in memory,
//! so a restarted service answers "unknown item" for reports it indexed
//! before; the pipeline repairs that once per run by re-registering every
//! unacknowledged cached embedding and retrying the query.
//!
//! Matching is best-effort: an upstream failure degrades the run to zero
//! matches with the failure recorded on the report, never an error that
//! would block the report itself.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use refind_core::{
    defaults, EmbeddingCache, Error, FindOutcome, Item, ItemImage, ItemKind, ItemMatch,
    ItemStore, MatchCandidate, MatchStore, MatcherBackend, NewEmbedding, NewMatch, Result,
    UserRef,
};

use crate::notify::NotificationDispatcher;

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Candidates requested per find query.
    pub top_k: u32,
    /// Confidence threshold (0.0–1.0) for the batch sweep.
    pub threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            top_k: defaults::MATCH_TOP_K,
            threshold: defaults::MATCH_THRESHOLD,
        }
    }
}

impl MatchingConfig {
    /// Create from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let top_k = std::env::var("MATCH_TOP_K")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::MATCH_TOP_K);
        let threshold = std::env::var("MATCH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::MATCH_THRESHOLD);
        Self { top_k, threshold }
    }
}

/// Outcome of one matching run. `failure` is set when the pipeline degraded
/// to partial or zero results; the report itself is never blocked.
#[derive(Debug)]
pub struct MatchingReport {
    /// Matches recorded (or re-found) for the item, new and pre-existing.
    pub matches: Vec<ItemMatch>,
    pub failure: Option<String>,
}

/// Drives the embed → register → find → record → notify pipeline.
pub struct MatchingOrchestrator {
    items: Arc<dyn ItemStore>,
    embeddings: Arc<dyn EmbeddingCache>,
    matches: Arc<dyn MatchStore>,
    matcher: Arc<dyn MatcherBackend>,
    dispatcher: NotificationDispatcher,
    config: MatchingConfig,
}

impl MatchingOrchestrator {
    pub fn new(
        items: Arc<dyn ItemStore>,
        embeddings: Arc<dyn EmbeddingCache>,
        matches: Arc<dyn MatchStore>,
        matcher: Arc<dyn MatcherBackend>,
        dispatcher: NotificationDispatcher,
        config: MatchingConfig,
    ) -> Self {
        Self {
            items,
            embeddings,
            matches,
            matcher,
            dispatcher,
            config,
        }
    }

    /// Run the full matching pipeline for a newly created or re-edited
    /// report. Upstream failures are swallowed into the report's `failure`
    /// field.
    pub async fn process_new_item(
        &self,
        item_id: Uuid,
        image: Option<ItemImage>,
    ) -> MatchingReport {
        let start = Instant::now();
        match self.run_pipeline(item_id, image).await {
            Ok(matches) => {
                info!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    op = "process_new_item",
                    item_id = %item_id,
                    match_count = matches.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Matching pipeline complete"
                );
                MatchingReport {
                    matches,
                    failure: None,
                }
            }
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    op = "process_new_item",
                    item_id = %item_id,
                    error_msg = %e,
                    "Matching pipeline failed, report proceeds without matches"
                );
                MatchingReport {
                    matches: Vec::new(),
                    failure: Some(e.to_string()),
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        item_id: Uuid,
        image: Option<ItemImage>,
    ) -> Result<Vec<ItemMatch>> {
        let item = self.items.get(item_id).await?;
        self.embed_and_register(&item, image.as_ref()).await?;

        let candidates = match self.matcher.find_matches(item_id, self.config.top_k).await? {
            FindOutcome::Matches(c) => c,
            FindOutcome::IndexMiss => {
                // The matcher lost its index (restart or cold cache). Push
                // the unacknowledged cache entries back and retry exactly
                // once.
                self.sweep_unregistered().await?;
                match self.matcher.find_matches(item_id, self.config.top_k).await? {
                    FindOutcome::Matches(c) => c,
                    FindOutcome::IndexMiss => {
                        warn!(
                            subsystem = "jobs",
                            component = "orchestrator",
                            item_id = %item_id,
                            "Item still unknown to matcher after re-registration"
                        );
                        Vec::new()
                    }
                }
            }
        };

        self.record_candidates(&candidates).await
    }

    /// Embed the item and overwrite any cached embedding (the title,
    /// description, or image may have changed since the last run), then
    /// push the fresh embedding to the matcher's index.
    async fn embed_and_register(&self, item: &Item, image: Option<&ItemImage>) -> Result<()> {
        let computed = self.matcher.embed_item(item, image).await?;
        self.embeddings
            .upsert(NewEmbedding {
                item_id: item.id,
                text_embedding: computed.text_embedding,
                image_embedding: computed.image_embedding,
                has_image: computed.has_image,
            })
            .await?;
        let embedding = self
            .embeddings
            .get_for_item(item.id)
            .await?
            .ok_or_else(|| Error::Internal(format!("embedding vanished for item {}", item.id)))?;

        // Registration failure is tolerated: the row stays unregistered
        // and the next self-heal or batch sweep picks it up.
        match self.matcher.register_item(item, &embedding).await {
            Ok(()) => self.embeddings.mark_registered(item.id).await?,
            Err(e) => warn!(
                subsystem = "jobs",
                component = "orchestrator",
                item_id = %item.id,
                error_msg = %e,
                "Registration failed, continuing without index entry"
            ),
        }
        Ok(())
    }

    /// Register every cached embedding the matcher has not yet
    /// acknowledged. Items deleted since embedding are skipped; individual
    /// registration failures leave the row unregistered for the next
    /// sweep. Returns the number of items registered.
    async fn sweep_unregistered(&self) -> Result<usize> {
        let start = Instant::now();
        let mut count = 0usize;
        for embedding in self.embeddings.list_unregistered().await? {
            let Some(item) = self.items.find(embedding.item_id).await? else {
                continue;
            };
            match self.matcher.register_item(&item, &embedding).await {
                Ok(()) => {
                    self.embeddings.mark_registered(item.id).await?;
                    count += 1;
                }
                Err(e) => warn!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    item_id = %item.id,
                    error_msg = %e,
                    "Registration failed during sweep"
                ),
            }
        }
        info!(
            subsystem = "jobs",
            component = "orchestrator",
            op = "sweep_unregistered",
            count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Registered pending embeddings with matcher index"
        );
        Ok(count)
    }

    /// Record candidates as matches, deduplicating on the item pair, and
    /// notify both owners of each pair recorded for the first time. A bad
    /// candidate never sinks the rest of the batch.
    async fn record_candidates(&self, candidates: &[MatchCandidate]) -> Result<Vec<ItemMatch>> {
        let mut recorded = Vec::new();
        for candidate in candidates {
            match self.record_one(candidate).await {
                Ok(Some((m, _created))) => recorded.push(m),
                Ok(None) => {}
                Err(e) => warn!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    lost_item_id = %candidate.lost_item_id,
                    found_item_id = %candidate.found_item_id,
                    error_msg = %e,
                    "Skipping candidate that failed to record"
                ),
            }
        }
        Ok(recorded)
    }

    async fn record_one(
        &self,
        candidate: &MatchCandidate,
    ) -> Result<Option<(ItemMatch, bool)>> {
        // The matcher's index can reference items deleted on our side.
        let Some(lost_item) = self.items.find(candidate.lost_item_id).await? else {
            debug!(
                subsystem = "jobs",
                component = "orchestrator",
                lost_item_id = %candidate.lost_item_id,
                "Dropping candidate: lost item no longer exists"
            );
            return Ok(None);
        };
        let Some(found_item) = self.items.find(candidate.found_item_id).await? else {
            debug!(
                subsystem = "jobs",
                component = "orchestrator",
                found_item_id = %candidate.found_item_id,
                "Dropping candidate: found item no longer exists"
            );
            return Ok(None);
        };

        let (m, created) = self
            .matches
            .create_or_existing(NewMatch {
                lost_item_id: lost_item.id,
                found_item_id: found_item.id,
                lost_user_id: lost_item.owner_id,
                found_user_id: found_item.owner_id,
                confidence_score: candidate.confidence_score,
                image_similarity: candidate.image_similarity,
                text_similarity: candidate.text_similarity,
                category_match: candidate.category_match,
                match_level: candidate.match_level,
            })
            .await?;

        if created {
            // Notification failure must not roll back the recorded match.
            if let Err(e) = self
                .dispatcher
                .notify_match_found(&m, &lost_item, &found_item)
                .await
            {
                warn!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    match_id = %m.id,
                    error_msg = %e,
                    "Failed to dispatch match notifications"
                );
            }
        }
        Ok(Some((m, created)))
    }

    /// Stored matches for an item, queried by its side of the pairing.
    pub async fn get_matches_for_item(&self, item_id: Uuid) -> Result<Vec<ItemMatch>> {
        let item = self.items.get(item_id).await?;
        match item.kind {
            ItemKind::Lost => self.matches.list_for_lost_item(item_id).await,
            ItemKind::Found => self.matches.list_for_found_item(item_id).await,
        }
    }

    /// All matches involving the user, descending confidence.
    pub async fn get_matches_for_user(&self, user_id: Uuid) -> Result<Vec<ItemMatch>> {
        self.matches.list_for_user(user_id).await
    }

    /// Matches awaiting the user's confirm/dismiss decision.
    pub async fn get_pending_matches_for_user(&self, user_id: Uuid) -> Result<Vec<ItemMatch>> {
        self.matches.list_pending_for_user(user_id).await
    }

    /// Count of matches awaiting the user's decision.
    pub async fn count_pending_matches(&self, user_id: Uuid) -> Result<i64> {
        self.matches.count_pending_for_user(user_id).await
    }

    /// Confirm a match on behalf of `user`. Only an owner of either side
    /// may confirm; the other party is notified.
    pub async fn confirm_match(&self, match_id: Uuid, user: &UserRef) -> Result<ItemMatch> {
        let m = self.matches.get(match_id).await?;
        if !m.involves_user(user.id) {
            return Err(Error::NotAuthorized(
                "user does not own either side of this match".to_string(),
            ));
        }

        let confirmed = self.matches.confirm(match_id, Utc::now()).await?;
        if let Err(e) = self
            .dispatcher
            .notify_match_confirmed(&confirmed, user.id)
            .await
        {
            warn!(
                subsystem = "jobs",
                component = "orchestrator",
                match_id = %match_id,
                error_msg = %e,
                "Failed to dispatch confirmation notification"
            );
        }

        info!(
            subsystem = "jobs",
            component = "orchestrator",
            op = "confirm_match",
            match_id = %match_id,
            user_id = %user.id,
            "Match confirmed"
        );
        Ok(confirmed)
    }

    /// Dismiss a match on behalf of `user`. Only an owner of either side
    /// may dismiss.
    pub async fn dismiss_match(&self, match_id: Uuid, user: &UserRef) -> Result<ItemMatch> {
        let m = self.matches.get(match_id).await?;
        if !m.involves_user(user.id) {
            return Err(Error::NotAuthorized(
                "user does not own either side of this match".to_string(),
            ));
        }
        self.matches.dismiss(match_id).await
    }

    /// Sweep the matcher for all pairs above the configured threshold and
    /// record the new ones. Returns the number of newly recorded matches.
    pub async fn run_batch_matching(&self) -> Result<usize> {
        let start = Instant::now();
        self.sweep_unregistered().await?;
        let candidates = self.matcher.all_matches(self.config.threshold).await?;

        let mut created_count = 0usize;
        for candidate in &candidates {
            match self.record_one(candidate).await {
                Ok(Some((_, true))) => created_count += 1,
                Ok(Some((_, false))) | Ok(None) => {}
                Err(e) => warn!(
                    subsystem = "jobs",
                    component = "orchestrator",
                    lost_item_id = %candidate.lost_item_id,
                    found_item_id = %candidate.found_item_id,
                    error_msg = %e,
                    "Skipping batch candidate that failed to record"
                ),
            }
        }

        info!(
            subsystem = "jobs",
            component = "orchestrator",
            op = "run_batch_matching",
            candidate_count = candidates.len(),
            match_count = created_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch matching sweep complete"
        );
        Ok(created_count)
    }
}
