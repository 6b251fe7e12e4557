//! In-memory store and matcher doubles for orchestrator tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use refind_core::{
    Category, ComputedEmbeddings, EmbeddingCache, Error, FindOutcome, Item, ItemEmbedding,
    ItemImage, ItemKind, ItemMatch, ItemStore, MatchCandidate, MatchLevel, MatchStore,
    MatcherBackend, NewEmbedding, NewItem, NewMatch, NewNotification, Notification,
    NotificationStore, Result, UpdateItem,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn new_item(kind: ItemKind, title: &str, owner_id: Option<Uuid>) -> NewItem {
    NewItem {
        kind,
        title: title.to_string(),
        description: Some(format!("{title} description")),
        category: Category::Electronics,
        reported_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        location: "Central station".to_string(),
        reporter_name: "Reporter".to_string(),
        reporter_email: "reporter@example.com".to_string(),
        reporter_phone: "+1-555-0100".to_string(),
        owner_id,
        image_url: None,
    }
}

pub fn candidate(lost: Uuid, found: Uuid, confidence: f64) -> MatchCandidate {
    MatchCandidate {
        lost_item_id: lost,
        found_item_id: found,
        confidence_score: confidence,
        image_similarity: confidence,
        text_similarity: confidence,
        category_match: 100.0,
        match_level: if confidence >= 80.0 {
            MatchLevel::High
        } else {
            MatchLevel::Medium
        },
    }
}

// =============================================================================
// ITEM STORE
// =============================================================================

#[derive(Default)]
pub struct InMemoryItemStore {
    rows: Mutex<HashMap<Uuid, Item>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn insert(&self, req: NewItem) -> Result<Uuid> {
        let id = refind_core::new_v7();
        let now = Utc::now();
        let item = Item {
            id,
            kind: req.kind,
            title: req.title,
            description: req.description,
            category: req.category,
            reported_on: req.reported_on,
            location: req.location,
            reporter_name: req.reporter_name,
            reporter_email: req.reporter_email,
            reporter_phone: req.reporter_phone,
            owner_id: req.owner_id,
            image_url: req.image_url,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(id, item);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Item> {
        self.find(id).await?.ok_or(Error::ItemNotFound(id))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Item>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Item>> {
        let mut items: Vec<Item> = self.rows.lock().unwrap().values().cloned().collect();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(items)
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Item>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|i| i.owner_id == Some(user_id))
            .collect())
    }

    async fn update(&self, id: Uuid, req: UpdateItem) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let item = rows.get_mut(&id).ok_or(Error::ItemNotFound(id))?;
        if let Some(title) = req.title {
            item.title = title;
        }
        if let Some(description) = req.description {
            item.description = Some(description);
        }
        if let Some(category) = req.category {
            item.category = category;
        }
        if let Some(location) = req.location {
            item.location = location;
        }
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn count_by_kind(&self, kind: ItemKind) -> Result<i64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.kind == kind)
            .count() as i64)
    }

    async fn delete_cascade(&self, id: Uuid) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::ItemNotFound(id))
    }
}

// =============================================================================
// EMBEDDING CACHE
// =============================================================================

#[derive(Default)]
pub struct InMemoryEmbeddingCache {
    rows: Mutex<HashMap<Uuid, ItemEmbedding>>,
}

impl InMemoryEmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cache entry the matcher has not yet acknowledged.
    pub async fn seed_unregistered(&self, item_id: Uuid) {
        self.upsert(NewEmbedding {
            item_id,
            text_embedding: "[0.1,0.2,0.3]".to_string(),
            image_embedding: None,
            has_image: false,
        })
        .await
        .unwrap();
    }

    /// Seed a cache entry that the matcher has already acknowledged.
    pub async fn seed_registered(&self, item_id: Uuid) {
        self.seed_unregistered(item_id).await;
        self.mark_registered(item_id).await.unwrap();
    }
}

#[async_trait]
impl EmbeddingCache for InMemoryEmbeddingCache {
    async fn upsert(&self, req: NewEmbedding) -> Result<()> {
        let now = Utc::now();
        self.rows.lock().unwrap().insert(
            req.item_id,
            ItemEmbedding {
                item_id: req.item_id,
                text_embedding: req.text_embedding,
                image_embedding: req.image_embedding,
                has_image: req.has_image,
                registered: false,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn get_for_item(&self, item_id: Uuid) -> Result<Option<ItemEmbedding>> {
        Ok(self.rows.lock().unwrap().get(&item_id).cloned())
    }

    async fn list_unregistered(&self) -> Result<Vec<ItemEmbedding>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|e| !e.registered)
            .cloned()
            .collect())
    }

    async fn mark_registered(&self, item_id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&item_id)
            .ok_or_else(|| Error::NotFound(format!("no embedding cached for item {item_id}")))?;
        row.registered = true;
        row.updated_at = Utc::now();
        Ok(())
    }
}

// =============================================================================
// MATCH STORE
// =============================================================================

#[derive(Default)]
pub struct InMemoryMatchStore {
    rows: Mutex<Vec<ItemMatch>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn create_or_existing(&self, req: NewMatch) -> Result<(ItemMatch, bool)> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows
            .iter()
            .find(|m| m.lost_item_id == req.lost_item_id && m.found_item_id == req.found_item_id)
        {
            return Ok((existing.clone(), false));
        }
        let m = ItemMatch {
            id: refind_core::new_v7(),
            lost_item_id: req.lost_item_id,
            found_item_id: req.found_item_id,
            lost_user_id: req.lost_user_id,
            found_user_id: req.found_user_id,
            confidence_score: req.confidence_score,
            image_similarity: req.image_similarity,
            text_similarity: req.text_similarity,
            category_match: req.category_match,
            match_level: req.match_level,
            confirmed: false,
            dismissed: false,
            created_at: Utc::now(),
            confirmed_at: None,
        };
        rows.push(m.clone());
        Ok((m, true))
    }

    async fn find_by_pair(
        &self,
        lost_item_id: Uuid,
        found_item_id: Uuid,
    ) -> Result<Option<ItemMatch>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.lost_item_id == lost_item_id && m.found_item_id == found_item_id)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<ItemMatch> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(Error::MatchNotFound(id))
    }

    async fn list_for_lost_item(&self, item_id: Uuid) -> Result<Vec<ItemMatch>> {
        Ok(self.sorted(|m| m.lost_item_id == item_id))
    }

    async fn list_for_found_item(&self, item_id: Uuid) -> Result<Vec<ItemMatch>> {
        Ok(self.sorted(|m| m.found_item_id == item_id))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ItemMatch>> {
        Ok(self.sorted(|m| m.involves_user(user_id)))
    }

    async fn list_pending_for_user(&self, user_id: Uuid) -> Result<Vec<ItemMatch>> {
        Ok(self.sorted(|m| m.involves_user(user_id) && m.is_pending()))
    }

    async fn count_pending_for_user(&self, user_id: Uuid) -> Result<i64> {
        Ok(self.sorted(|m| m.involves_user(user_id) && m.is_pending()).len() as i64)
    }

    async fn confirm(&self, id: Uuid, at: DateTime<Utc>) -> Result<ItemMatch> {
        let mut rows = self.rows.lock().unwrap();
        let m = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(Error::MatchNotFound(id))?;
        m.confirmed = true;
        m.confirmed_at = Some(at);
        Ok(m.clone())
    }

    async fn dismiss(&self, id: Uuid) -> Result<ItemMatch> {
        let mut rows = self.rows.lock().unwrap();
        let m = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(Error::MatchNotFound(id))?;
        m.dismissed = true;
        Ok(m.clone())
    }
}

impl InMemoryMatchStore {
    fn sorted(&self, pred: impl Fn(&ItemMatch) -> bool) -> Vec<ItemMatch> {
        let mut out: Vec<ItemMatch> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| pred(m))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }
}

// =============================================================================
// NOTIFICATION STORE
// =============================================================================

#[derive(Default)]
pub struct InMemoryNotificationStore {
    rows: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift a notification's creation time, for retention tests.
    pub fn backdate(&self, id: Uuid, created_at: DateTime<Utc>) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(n) = rows.iter_mut().find(|n| n.id == id) {
            n.created_at = created_at;
        }
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, req: NewNotification) -> Result<Uuid> {
        let id = refind_core::new_v7();
        self.rows.lock().unwrap().push(Notification {
            id,
            user_id: req.user_id,
            title: req.title,
            message: req.message,
            kind: req.kind,
            match_id: req.match_id,
            item_id: req.item_id,
            read: false,
            created_at: Utc::now(),
            read_at: None,
        });
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Notification> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or(Error::NotificationNotFound(id))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let mut out: Vec<Notification> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn list_unread_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        Ok(self
            .list_for_user(user_id)
            .await?
            .into_iter()
            .filter(|n| !n.read)
            .collect())
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64> {
        Ok(self.list_unread_for_user(user_id).await?.len() as i64)
    }

    async fn mark_read(&self, id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let n = rows
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(Error::NotificationNotFound(id))?;
        n.read = true;
        n.read_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut updated = 0u64;
        for n in rows.iter_mut().filter(|n| n.user_id == user_id && !n.read) {
            n.read = true;
            n.read_at = Some(Utc::now());
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|n| n.id != id);
        if rows.len() == before {
            return Err(Error::NotificationNotFound(id));
        }
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|n| !(n.read && n.created_at < cutoff));
        Ok((before - rows.len()) as u64)
    }
}

// =============================================================================
// SCRIPTED MATCHER
// =============================================================================

/// Scripted response for one `find_matches` call.
pub enum FindScript {
    Found(Vec<MatchCandidate>),
    IndexMiss,
    Fail(String),
}

/// Matcher double with a per-call find script and call logs.
#[derive(Default)]
pub struct ScriptedMatcher {
    find_script: Mutex<VecDeque<FindScript>>,
    all_results: Mutex<Vec<MatchCandidate>>,
    pub embed_calls: AtomicUsize,
    pub find_calls: AtomicUsize,
    pub register_log: Mutex<Vec<Uuid>>,
}

impl ScriptedMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_find(&self, step: FindScript) {
        self.find_script.lock().unwrap().push_back(step);
    }

    pub fn set_all_matches(&self, candidates: Vec<MatchCandidate>) {
        *self.all_results.lock().unwrap() = candidates;
    }

    pub fn registered_items(&self) -> Vec<Uuid> {
        self.register_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl MatcherBackend for ScriptedMatcher {
    async fn embed_item(
        &self,
        _item: &Item,
        image: Option<&ItemImage>,
    ) -> Result<ComputedEmbeddings> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ComputedEmbeddings {
            text_embedding: "[0.5,0.5]".to_string(),
            image_embedding: image.map(|_| "[0.9,0.1]".to_string()),
            has_image: image.is_some(),
        })
    }

    async fn register_item(&self, item: &Item, _embedding: &ItemEmbedding) -> Result<()> {
        self.register_log.lock().unwrap().push(item.id);
        Ok(())
    }

    async fn find_matches(&self, _item_id: Uuid, _top_k: u32) -> Result<FindOutcome> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        match self.find_script.lock().unwrap().pop_front() {
            Some(FindScript::Found(c)) => Ok(FindOutcome::Matches(c)),
            Some(FindScript::IndexMiss) => Ok(FindOutcome::IndexMiss),
            Some(FindScript::Fail(msg)) => Err(Error::Upstream(msg)),
            None => Ok(FindOutcome::Matches(Vec::new())),
        }
    }

    async fn all_matches(&self, _threshold: f64) -> Result<Vec<MatchCandidate>> {
        Ok(self.all_results.lock().unwrap().clone())
    }
}
