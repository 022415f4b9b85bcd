//! In-memory registry of posts being composed through the Discord wizard.
//!
//! Drafts live only for the lifetime of the process. Each draft is keyed by a
//! [`DraftId`] unique to one composition attempt, so concurrent wizards never
//! touch the same entry. Entries idle for longer than the configured TTL are
//! evicted by [`run_sweeper`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::models::{now_millis, Category, CategoryDetail, PaymentType, Submitter};

pub const UNTITLED: &str = "Untitled Post";
pub const NO_DESCRIPTION: &str = "No description provided";
pub const NOT_SET: &str = "Not set";

static DRAFT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Identifier of one composition attempt: `{submitter}-{unix_millis}-{seq}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftId(String);

impl DraftId {
    pub fn generate(submitter_id: &str) -> Self {
        let seq = DRAFT_SEQ.fetch_add(1, Ordering::Relaxed);
        DraftId(format!("{submitter_id}-{}-{seq}", now_millis()))
    }

    /// Rebuild an id carried in a component payload.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| DraftId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Working state of a post that has not been submitted yet.
///
/// Both conditional fields are retained while composing so that switching
/// category back and forth keeps what the user typed; only the field of the
/// active category is shown, edited, and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    /// Digits-only amount; `None` until the edit form has been submitted.
    pub payment: Option<String>,
    pub payment_type: Option<PaymentType>,
    pub category: Category,
    pub past_work: Option<String>,
    pub reference: Option<String>,
    pub submitter: Submitter,
}

impl Draft {
    pub fn new(submitter: Submitter) -> Self {
        Draft {
            title: UNTITLED.to_string(),
            description: NO_DESCRIPTION.to_string(),
            payment: None,
            payment_type: None,
            category: Category::Hiring,
            past_work: None,
            reference: None,
            submitter,
        }
    }

    /// Value of the conditional field that the current category surfaces.
    pub fn conditional_value(&self) -> Option<&str> {
        match self.category {
            Category::Hiring => self.reference.as_deref(),
            Category::ForHire => self.past_work.as_deref(),
        }
    }

    pub fn set_conditional_value(&mut self, value: Option<String>) {
        let value = value.filter(|v| !v.trim().is_empty());
        match self.category {
            Category::Hiring => self.reference = value,
            Category::ForHire => self.past_work = value,
        }
    }

    /// The category detail a submission of this draft would persist.
    pub fn detail(&self) -> CategoryDetail {
        match self.category {
            Category::Hiring => CategoryDetail::Hiring {
                reference: self.reference.clone(),
            },
            Category::ForHire => CategoryDetail::ForHire {
                past_work: self.past_work.clone().unwrap_or_default(),
            },
        }
    }
}

struct Entry {
    draft: Draft,
    touched: Instant,
}

#[derive(Default)]
pub struct DraftRegistry {
    entries: DashMap<DraftId, Entry>,
}

impl DraftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, id: DraftId, draft: Draft) {
        self.entries.insert(
            id,
            Entry {
                draft,
                touched: Instant::now(),
            },
        );
    }

    pub fn get(&self, id: &DraftId) -> Option<Draft> {
        self.entries.get(id).map(|e| e.draft.clone())
    }

    /// Mutate a draft in place, refreshing its idle timer.
    ///
    /// Returns `None` without calling `f` when the draft is gone.
    pub fn update<R>(&self, id: &DraftId, f: impl FnOnce(&mut Draft) -> R) -> Option<R> {
        let mut entry = self.entries.get_mut(id)?;
        entry.touched = Instant::now();
        Some(f(&mut entry.draft))
    }

    pub fn remove(&self, id: &DraftId) -> Option<Draft> {
        self.entries.remove(id).map(|(_, e)| e.draft)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict drafts idle for longer than `ttl`. Returns how many were dropped.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        self.sweep_expired_at(Instant::now(), ttl)
    }

    fn sweep_expired_at(&self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.touched) <= ttl);
        before.saturating_sub(self.entries.len())
    }
}

/// Periodically evict abandoned drafts until `shutdown` fires.
pub async fn run_sweeper(
    registry: Arc<DraftRegistry>,
    ttl: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!(ttl_secs = ttl.as_secs(), "Draft sweeper starting");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let evicted = registry.sweep_expired(ttl);
        if evicted > 0 {
            info!(evicted, remaining = registry.len(), "Evicted abandoned drafts");
        } else {
            debug!(remaining = registry.len(), "No drafts to evict");
        }
    }

    debug!("Draft sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitter() -> Submitter {
        Submitter {
            id: "1234".into(),
            username: "maker".into(),
            avatar: None,
        }
    }

    #[test]
    fn ids_never_collide_for_the_same_user() {
        let a = DraftId::generate("1234");
        let b = DraftId::generate("1234");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("1234-"));
        assert_eq!(DraftId::parse(a.as_str()), Some(a));
    }

    #[test]
    fn parse_rejects_separator_and_empty_payloads() {
        assert!(DraftId::parse("").is_none());
        assert!(DraftId::parse("12:34").is_none());
        assert!(DraftId::parse("12 34").is_none());
    }

    #[test]
    fn new_draft_uses_placeholders() {
        let draft = Draft::new(submitter());
        assert_eq!(draft.title, UNTITLED);
        assert_eq!(draft.description, NO_DESCRIPTION);
        assert_eq!(draft.payment, None);
        assert_eq!(draft.payment_type, None);
        assert_eq!(draft.category, Category::Hiring);
    }

    #[test]
    fn switching_category_keeps_inactive_field() {
        let mut draft = Draft::new(submitter());
        draft.set_conditional_value(Some("see thread".into()));
        draft.category = Category::ForHire;
        assert_eq!(draft.conditional_value(), None);
        draft.set_conditional_value(Some("http://portfolio.example".into()));

        draft.category = Category::Hiring;
        assert_eq!(draft.conditional_value(), Some("see thread"));
        assert_eq!(
            draft.detail(),
            CategoryDetail::Hiring {
                reference: Some("see thread".into())
            }
        );

        draft.category = Category::ForHire;
        assert_eq!(
            draft.detail(),
            CategoryDetail::ForHire {
                past_work: "http://portfolio.example".into()
            }
        );
    }

    #[test]
    fn blank_conditional_value_clears_the_field() {
        let mut draft = Draft::new(submitter());
        draft.set_conditional_value(Some("ref".into()));
        draft.set_conditional_value(Some("   ".into()));
        assert_eq!(draft.reference, None);
    }

    #[test]
    fn update_and_remove_on_missing_ids_are_noops() {
        let registry = DraftRegistry::new();
        let id = DraftId::generate("1");
        assert!(registry.update(&id, |d| d.title.clear()).is_none());
        assert!(registry.remove(&id).is_none());

        registry.put(id.clone(), Draft::new(submitter()));
        registry.update(&id, |d| d.title = "Rig".into());
        assert_eq!(registry.get(&id).unwrap().title, "Rig");
        assert!(registry.remove(&id).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn sweep_evicts_only_idle_entries() {
        let registry = DraftRegistry::new();
        let stale = DraftId::generate("1");
        let fresh = DraftId::generate("2");
        registry.put(stale.clone(), Draft::new(submitter()));
        registry.put(fresh.clone(), Draft::new(submitter()));

        let ttl = Duration::from_secs(60);
        assert_eq!(registry.sweep_expired_at(Instant::now(), ttl), 0);

        let later = Instant::now() + Duration::from_secs(61);
        registry.entries.get_mut(&fresh).unwrap().touched = later;
        assert_eq!(registry.sweep_expired_at(later, ttl), 1);
        assert!(registry.get(&stale).is_none());
        assert!(registry.get(&fresh).is_some());
    }

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let registry = Arc::new(DraftRegistry::new());
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_sweeper(
            registry,
            Duration::from_secs(1),
            Duration::from_millis(10),
            token.clone(),
        ));
        token.cancel();
        handle.await.unwrap();
    }
}
