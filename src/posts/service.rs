// Service layer - sequences validation, storage and fanout for every write.
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::DynClock;
use crate::config::BoardConfig;
use crate::error::{AppError, AppResult};
use crate::live::{BroadcastHub, LiveEventKind, LivePayload};
use crate::posts::domain::{
    validate_pin, ClaimSecret, DayKey, EditAccess, Identity, Origin, Post, PostError, PostId,
    PostText,
};
use crate::posts::repository::{DynPostRepository, UpdateGuard};
use crate::render;

#[derive(Clone)]
pub struct PostService {
    repo: DynPostRepository,
    hub: Arc<BroadcastHub>,
    clock: DynClock,
    board: BoardConfig,
}

impl PostService {
    pub fn new(
        repo: DynPostRepository,
        hub: Arc<BroadcastHub>,
        clock: DynClock,
        board: BoardConfig,
    ) -> Self {
        Self {
            repo,
            hub,
            clock,
            board,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> DayKey {
        DayKey::today(self.now())
    }

    /// Resolve a caller-supplied day against the retention window.
    pub fn resolve_day(&self, requested: Option<&str>) -> DayKey {
        DayKey::resolve(requested, self.now(), self.board.retention_days)
    }

    /// Days a viewer can browse, today first.
    pub fn browsable_days(&self) -> Vec<DayKey> {
        let today = self.today().date();
        (0..=self.board.retention_days)
            .map(|back| DayKey::from_date(today - chrono::Duration::days(i64::from(back))))
            .collect()
    }

    pub async fn create(
        &self,
        topic: &str,
        body: &str,
        identity: Identity,
        day: Option<&str>,
    ) -> AppResult<Post> {
        let text = PostText::for_create(topic, body)?;
        let now = self.now();
        let day_key = DayKey::resolve(day, now, self.board.retention_days);
        let post = Post::create(text, identity, day_key, now);

        self.repo.insert(&post).await?;
        tracing::info!(
            "Post {} created for {} by {}",
            post.id,
            post.day_key,
            if post.origin_identity.is_agent() { "agent" } else { "visitor" }
        );

        self.announce(LiveEventKind::NewPost, &post);
        Ok(post)
    }

    /// Open edit. Only unclaimed posts.
    pub async fn edit(&self, id: &PostId, topic: &str, body: &str) -> AppResult<Post> {
        let text = PostText::for_edit(topic, body)?;
        let current = self.load(id).await?;
        let next = current.edit(EditAccess::Open, text, self.now())?;

        let stored = match self.repo.update_text(&next, UpdateGuard::Unclaimed).await? {
            Some(post) => post,
            None => return Err(self.explain_miss(id).await),
        };
        tracing::info!("Post {} edited (edit #{})", stored.id, stored.edit_count);

        self.announce(LiveEventKind::EditPost, &stored);
        Ok(stored)
    }

    /// A claimed post is a conflict whatever PIN comes with the request.
    pub async fn claim(&self, id: &PostId, pin: &str) -> AppResult<Post> {
        let current = self.load(id).await?;
        current.ensure_claimable()?;
        validate_pin(pin)?;

        let secret = self.hash_pin(pin).await?;
        let now = self.now();
        let next = current.claim(secret, now)?;
        let secret = next.require_claim()?;

        let stored = match self.repo.set_claim(id, secret, now).await? {
            Some(post) => post,
            None => return Err(self.explain_miss(id).await),
        };
        tracing::info!("Post {} claimed", stored.id);

        self.announce(LiveEventKind::EditPost, &stored);
        Ok(stored)
    }

    /// Edit a claimed post after checking its PIN.
    pub async fn claimed_edit(
        &self,
        id: &PostId,
        pin: &str,
        topic: &str,
        body: &str,
    ) -> AppResult<Post> {
        let text = PostText::for_edit(topic, body)?;
        let current = self.load(id).await?;
        let secret = current.require_claim()?.clone();
        if pin.trim().is_empty() {
            return Err(AppError::Conflict(
                "A PIN is required to edit a claimed post".into(),
            ));
        }

        if !self.verify_pin(secret.clone(), pin).await? {
            tracing::warn!("Rejected PIN for post {}", id);
            return Err(PostError::Unauthorized.into());
        }

        let next = current.edit(EditAccess::PinVerified, text, self.now())?;
        let stored = match self
            .repo
            .update_text(&next, UpdateGuard::ClaimedWith(secret))
            .await?
        {
            Some(post) => post,
            None => return Err(AppError::NotFound),
        };
        tracing::info!(
            "Claimed post {} edited (edit #{})",
            stored.id,
            stored.edit_count
        );

        self.announce(LiveEventKind::EditPost, &stored);
        Ok(stored)
    }

    pub async fn reveal_origin(&self, id: &PostId) -> AppResult<Origin> {
        Ok(self.load(id).await?.origin())
    }

    pub async fn get(&self, id: &PostId) -> AppResult<Post> {
        self.load(id).await
    }

    /// Newest first, capped at the configured feed size.
    pub async fn feed(&self, day: &DayKey) -> AppResult<Vec<Post>> {
        Ok(self.repo.list_for_day(day, self.board.feed_limit).await?)
    }

    pub async fn random_unclaimed(&self) -> AppResult<Option<Post>> {
        Ok(self.repo.random_unclaimed().await?)
    }

    /// (total, agent-authored) post counts for a day.
    pub async fn day_counts(&self, day: &DayKey) -> AppResult<(u64, u64)> {
        let total = self.repo.count_for_day(day).await?;
        let agent = self.repo.count_agent_for_day(day).await?;
        Ok((total, agent))
    }

    /// Delete posts whose day has left the retention window.
    pub async fn purge_expired(&self) -> AppResult<u64> {
        let cutoff = DayKey::retention_cutoff(self.now(), self.board.retention_days);
        let deleted = self.repo.purge_before(&cutoff).await?;
        if deleted > 0 {
            tracing::info!("Archived {} posts from before {}", deleted, cutoff);
        }
        Ok(deleted)
    }

    async fn load(&self, id: &PostId) -> AppResult<Post> {
        self.repo
            .get(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// A guarded write matched nothing. Work out why from the current row.
    async fn explain_miss(&self, id: &PostId) -> AppError {
        match self.repo.get(id).await {
            Ok(None) => AppError::NotFound,
            Ok(Some(post)) if post.is_claimed() => {
                AppError::Conflict("This post has already been claimed".into())
            }
            Ok(Some(_)) => AppError::Conflict("This post changed underneath you, try again".into()),
            Err(e) => e.into(),
        }
    }

    async fn hash_pin(&self, pin: &str) -> AppResult<ClaimSecret> {
        let pin = pin.to_string();
        let cost = self.board.pin_hash_cost;
        let secret = tokio::task::spawn_blocking(move || ClaimSecret::hash(&pin, cost))
            .await
            .map_err(|e| AppError::Internal(format!("PIN hashing task failed: {}", e)))??;
        Ok(secret)
    }

    async fn verify_pin(&self, secret: ClaimSecret, pin: &str) -> AppResult<bool> {
        let pin = pin.to_string();
        tokio::task::spawn_blocking(move || secret.verify(&pin))
            .await
            .map_err(|e| AppError::Internal(format!("PIN check task failed: {}", e)))
    }

    /// Fan a committed write out to live viewers. Rendering problems are
    /// logged; the write itself already succeeded.
    fn announce(&self, kind: LiveEventKind, post: &Post) {
        match render::render_card(post, self.now()) {
            Ok(html) => {
                let delivered = self.hub.publish(
                    kind,
                    LivePayload {
                        html,
                        day: post.day_key.to_string(),
                    },
                );
                tracing::debug!("{} for {} reached {} viewers", kind.as_str(), post.id, delivered);
            }
            Err(e) => tracing::error!("Failed to render post {} for broadcast: {}", post.id, e),
        }
    }
}
