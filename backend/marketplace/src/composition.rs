//! The post wizard: turns a user's draft into a pending post.
//!
//! ```text
//! start ──► composing ──(category | payment type | edit | repost)──► composing
//!               └──submit──► submitted (draft removed, post handed to review)
//! ```
//!
//! Operations against a draft id that is no longer registered return `None`
//! and change nothing. A stale button press after submission or a restart
//! is expected and is not treated as an error.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db;
use crate::drafts::{Draft, DraftId, DraftRegistry, NOT_SET};
use crate::errors::{MarketError, Result};
use crate::models::{Category, CategoryDetail, NewPost, PaymentType, Post, Submitter};
use crate::review::ReviewWorkflow;

/// Transport-neutral snapshot of a draft, rendered as the wizard preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub title: String,
    pub description: String,
    /// Digits-only amount, or "Not set".
    pub payment: String,
    /// `USD` / `Robux`, or "Not set".
    pub payment_type: String,
    pub category: Category,
    /// Label of the one conditional field the category surfaces.
    pub conditional_label: &'static str,
    pub conditional_value: String,
    pub creator_id: String,
    pub creator_name: String,
}

impl Preview {
    pub fn of(draft: &Draft) -> Self {
        Preview {
            title: draft.title.clone(),
            description: draft.description.clone(),
            payment: draft.payment.clone().unwrap_or_else(|| NOT_SET.to_string()),
            payment_type: draft
                .payment_type
                .map(|p| p.as_str().to_string())
                .unwrap_or_else(|| NOT_SET.to_string()),
            category: draft.category,
            conditional_label: conditional_label(draft.category),
            conditional_value: draft
                .conditional_value()
                .unwrap_or(NOT_SET)
                .to_string(),
            creator_id: draft.submitter.id.clone(),
            creator_name: draft.submitter.username.clone(),
        }
    }
}

pub fn conditional_label(category: Category) -> &'static str {
    match category {
        Category::Hiring => "Reference",
        Category::ForHire => "Portfolio / Past Work",
    }
}

/// A freshly started composition.
#[derive(Debug, Clone)]
pub struct Started {
    pub id: DraftId,
    pub preview: Preview,
    /// The submitter already has posts, so offer "Repost Previous".
    pub has_prior_posts: bool,
}

/// Values submitted through the edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldEdits {
    pub title: String,
    pub description: String,
    /// Free text; reduced to its digits before it is stored.
    pub payment: String,
    /// Portfolio (for_hire) or reference (hiring), whichever is active.
    pub conditional: Option<String>,
}

/// Longest title a post may carry, in characters.
pub const TITLE_LIMIT: usize = 256;

/// Keep only ASCII digits: `"$1,200.50"` becomes `"120050"`.
pub fn normalize_payment(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Clone)]
pub struct CompositionWorkflow {
    drafts: Arc<DraftRegistry>,
    pool: SqlitePool,
    review: ReviewWorkflow,
}

impl CompositionWorkflow {
    pub fn new(drafts: Arc<DraftRegistry>, pool: SqlitePool, review: ReviewWorkflow) -> Self {
        CompositionWorkflow {
            drafts,
            pool,
            review,
        }
    }

    pub async fn start(&self, submitter: Submitter) -> Result<Started> {
        let has_prior_posts = !db::posts_by_creator(&self.pool, &submitter.id)
            .await?
            .is_empty();

        let id = DraftId::generate(&submitter.id);
        let draft = Draft::new(submitter);
        let preview = Preview::of(&draft);
        self.drafts.put(id.clone(), draft);
        debug!(draft_id = %id, has_prior_posts, "Draft started");

        Ok(Started {
            id,
            preview,
            has_prior_posts,
        })
    }

    /// Snapshot of a draft, used to pre-fill the edit form.
    pub fn draft(&self, id: &DraftId) -> Option<Draft> {
        self.drafts.get(id)
    }

    pub fn select_category(&self, id: &DraftId, category: Category) -> Option<Preview> {
        self.drafts.update(id, |draft| {
            draft.category = category;
            Preview::of(draft)
        })
    }

    pub fn select_payment_type(&self, id: &DraftId, payment_type: PaymentType) -> Option<Preview> {
        self.drafts.update(id, |draft| {
            draft.payment_type = Some(payment_type);
            Preview::of(draft)
        })
    }

    pub fn edit_fields(&self, id: &DraftId, edits: FieldEdits) -> Option<Preview> {
        self.drafts.update(id, |draft| {
            draft.title = edits.title;
            draft.description = edits.description;
            let payment = normalize_payment(&edits.payment);
            draft.payment = (!payment.is_empty()).then_some(payment);
            draft.set_conditional_value(edits.conditional);
            Preview::of(draft)
        })
    }

    /// Pre-fill the draft from the submitter's most recent post.
    pub async fn load_previous(&self, id: &DraftId) -> Result<Option<Preview>> {
        let Some(draft) = self.drafts.get(id) else {
            return Ok(None);
        };
        let previous = db::latest_post_by_creator(&self.pool, &draft.submitter.id)
            .await?
            .ok_or_else(|| MarketError::validation("post", "You have no previous posts to repost."))?;

        Ok(self.drafts.update(id, |draft| {
            draft.title = previous.title;
            draft.description = previous.description;
            draft.payment = Some(previous.payment);
            draft.payment_type = Some(previous.payment_type);
            draft.category = previous.detail.category();
            match previous.detail {
                CategoryDetail::Hiring { reference } => draft.reference = reference,
                CategoryDetail::ForHire { past_work } => draft.past_work = Some(past_work),
            }
            Preview::of(draft)
        }))
    }

    /// Persist the draft as a pending post and hand it to moderators.
    ///
    /// On a validation failure the draft stays registered so the user can
    /// fix it and submit again.
    pub async fn submit(&self, id: &DraftId) -> Result<Option<Post>> {
        let Some(draft) = self.drafts.remove(id) else {
            return Ok(None);
        };

        let new_post = match validate(&draft) {
            Ok(new_post) => new_post,
            Err(e) => {
                self.drafts.put(id.clone(), draft);
                return Err(e);
            }
        };

        let post = match db::create_post(&self.pool, &new_post).await {
            Ok(post) => post,
            Err(e) => {
                self.drafts.put(id.clone(), draft);
                return Err(e);
            }
        };
        info!(post_id = post.id, draft_id = %id, "Post submitted for review");

        Ok(Some(self.review.publish_for_review(post).await))
    }
}

fn validate(draft: &Draft) -> Result<NewPost> {
    if draft.title.trim().is_empty() {
        return Err(MarketError::validation("title", "Give your post a title before submitting."));
    }
    if draft.title.chars().count() > TITLE_LIMIT {
        return Err(MarketError::validation(
            "title",
            format!("Keep the title to {TITLE_LIMIT} characters or fewer."),
        ));
    }
    let payment = draft
        .payment
        .clone()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            MarketError::validation("payment", "Set a payment amount before submitting.")
        })?;
    let payment_type = draft.payment_type.ok_or_else(|| {
        MarketError::validation("paymentType", "Select a payment type before submitting.")
    })?;

    let detail = draft.detail();
    if let CategoryDetail::ForHire { past_work } = &detail {
        if past_work.trim().is_empty() {
            return Err(MarketError::validation(
                "pastWork",
                "Add your portfolio / past work before submitting.",
            ));
        }
    }

    Ok(NewPost {
        detail,
        title: draft.title.clone(),
        description: draft.description.clone(),
        payment,
        payment_type,
        creator: draft.submitter.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelMap;
    use crate::drafts::{NO_DESCRIPTION, UNTITLED};
    use crate::models::PostStatus;
    use crate::notify::testing::RecordingNotifier;
    use crate::notify::{Notice, Target};

    const CHANNELS: ChannelMap = ChannelMap {
        review: 10,
        hiring: 20,
        for_hire: 30,
        log: 40,
    };

    async fn setup() -> (CompositionWorkflow, Arc<RecordingNotifier>, SqlitePool) {
        let pool = db::test_pool().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let review = ReviewWorkflow::new(pool.clone(), notifier.clone(), CHANNELS);
        let workflow = CompositionWorkflow::new(Arc::new(DraftRegistry::new()), pool.clone(), review);
        (workflow, notifier, pool)
    }

    fn submitter(id: &str) -> Submitter {
        Submitter {
            id: id.to_string(),
            username: "animator".to_string(),
            avatar: Some("a1b2c3".to_string()),
        }
    }

    #[test]
    fn payment_keeps_digits_only() {
        assert_eq!(normalize_payment("$1,200.50"), "120050");
        assert_eq!(normalize_payment("500 Robux"), "500");
        assert_eq!(normalize_payment("free"), "");
    }

    #[tokio::test]
    async fn start_registers_a_placeholder_draft() {
        let (workflow, _, _) = setup().await;
        let started = workflow.start(submitter("1")).await.unwrap();

        assert!(!started.has_prior_posts);
        assert_eq!(started.preview.title, UNTITLED);
        assert_eq!(started.preview.description, NO_DESCRIPTION);
        assert_eq!(started.preview.payment, NOT_SET);
        assert_eq!(started.preview.payment_type, NOT_SET);
        assert_eq!(started.preview.category, Category::Hiring);
        assert_eq!(started.preview.conditional_label, "Reference");
        assert!(workflow.draft(&started.id).is_some());
    }

    #[tokio::test]
    async fn category_switch_changes_surfaced_field() {
        let (workflow, _, _) = setup().await;
        let id = workflow.start(submitter("1")).await.unwrap().id;

        let preview = workflow.select_category(&id, Category::ForHire).unwrap();
        assert_eq!(preview.conditional_label, "Portfolio / Past Work");
        assert_eq!(preview.conditional_value, NOT_SET);

        workflow
            .edit_fields(
                &id,
                FieldEdits {
                    title: "t".into(),
                    description: "d".into(),
                    payment: "1".into(),
                    conditional: Some("http://portfolio.example".into()),
                },
            )
            .unwrap();
        let back = workflow.select_category(&id, Category::Hiring).unwrap();
        assert_eq!(back.conditional_value, NOT_SET);
        let again = workflow.select_category(&id, Category::ForHire).unwrap();
        assert_eq!(again.conditional_value, "http://portfolio.example");
    }

    #[tokio::test]
    async fn full_for_hire_submission() {
        let (workflow, notifier, pool) = setup().await;
        let id = workflow.start(submitter("55")).await.unwrap().id;

        workflow.select_category(&id, Category::ForHire).unwrap();
        let preview = workflow
            .edit_fields(
                &id,
                FieldEdits {
                    title: "Logo Animation".into(),
                    description: "Need a 10s intro".into(),
                    payment: "$500".into(),
                    conditional: Some("http://portfolio.example".into()),
                },
            )
            .unwrap();
        assert_eq!(preview.payment, "500");
        workflow.select_payment_type(&id, PaymentType::Usd).unwrap();

        let post = workflow.submit(&id).await.unwrap().unwrap();
        assert_eq!(post.payment, "500");
        assert_eq!(post.payment_type, PaymentType::Usd);
        assert_eq!(post.category(), Category::ForHire);
        assert_eq!(post.status, PostStatus::Pending);
        assert_eq!(
            post.detail,
            CategoryDetail::ForHire {
                past_work: "http://portfolio.example".into()
            }
        );

        // The draft is gone and the moderators were asked to review.
        assert!(workflow.draft(&id).is_none());
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Target::Channel(CHANNELS.review));
        assert!(matches!(&sent[0].1, Notice::ReviewRequest { post: p, rating: None } if p.id == post.id));

        let stored = db::get_post(&pool, post.id).await.unwrap().unwrap();
        assert!(stored.review_message_id.is_some());
    }

    #[tokio::test]
    async fn submit_without_payment_fails_and_keeps_draft() {
        let (workflow, notifier, pool) = setup().await;
        let id = workflow.start(submitter("9")).await.unwrap().id;

        let err = workflow.submit(&id).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation { field: "payment", .. }));

        workflow
            .edit_fields(
                &id,
                FieldEdits {
                    title: "Builder wanted".into(),
                    description: "Obby map".into(),
                    payment: "2500".into(),
                    conditional: None,
                },
            )
            .unwrap();
        let err = workflow.submit(&id).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation { field: "paymentType", .. }));

        assert!(workflow.draft(&id).is_some());
        assert!(db::posts_by_creator(&pool, "9").await.unwrap().is_empty());
        assert_eq!(notifier.sent_count().await, 0);
    }

    #[tokio::test]
    async fn non_numeric_payment_counts_as_unset() {
        let (workflow, _, _) = setup().await;
        let id = workflow.start(submitter("9")).await.unwrap().id;
        let preview = workflow
            .edit_fields(
                &id,
                FieldEdits {
                    title: "t".into(),
                    description: "d".into(),
                    payment: "negotiable".into(),
                    conditional: None,
                },
            )
            .unwrap();
        assert_eq!(preview.payment, NOT_SET);
        workflow.select_payment_type(&id, PaymentType::Robux).unwrap();
        assert!(workflow.submit(&id).await.is_err());
    }

    #[tokio::test]
    async fn overlong_title_is_rejected_before_it_reaches_moderators() {
        let (workflow, notifier, pool) = setup().await;
        let id = workflow.start(submitter("12")).await.unwrap().id;
        workflow
            .edit_fields(
                &id,
                FieldEdits {
                    title: "t".repeat(TITLE_LIMIT + 1),
                    description: "d".into(),
                    payment: "10".into(),
                    conditional: None,
                },
            )
            .unwrap();
        workflow.select_payment_type(&id, PaymentType::Usd).unwrap();

        let err = workflow.submit(&id).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation { field: "title", .. }));
        assert!(db::posts_by_creator(&pool, "12").await.unwrap().is_empty());
        assert_eq!(notifier.sent_count().await, 0);
        assert!(workflow.draft(&id).is_some());
    }

    #[tokio::test]
    async fn store_failures_after_commit_still_report_the_post() {
        let (workflow, notifier, pool) = setup().await;
        sqlx::query("DROP TABLE reviews").execute(&pool).await.unwrap();
        sqlx::query(
            "CREATE TRIGGER lock_review_message BEFORE UPDATE OF review_message_id ON posts \
             BEGIN SELECT RAISE(ABORT, 'locked'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let id = workflow.start(submitter("13")).await.unwrap().id;
        workflow
            .edit_fields(
                &id,
                FieldEdits {
                    title: "Rigging".into(),
                    description: "d".into(),
                    payment: "10".into(),
                    conditional: None,
                },
            )
            .unwrap();
        workflow.select_payment_type(&id, PaymentType::Usd).unwrap();

        let post = workflow.submit(&id).await.unwrap().unwrap();
        assert_eq!(post.review_message_id, None);
        assert!(workflow.draft(&id).is_none());
        assert_eq!(notifier.sent_count().await, 1);
        assert!(db::get_post(&pool, post.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn for_hire_requires_portfolio() {
        let (workflow, _, _) = setup().await;
        let id = workflow.start(submitter("3")).await.unwrap().id;
        workflow
            .edit_fields(
                &id,
                FieldEdits {
                    title: "t".into(),
                    description: "d".into(),
                    payment: "10".into(),
                    conditional: Some("old reference".into()),
                },
            )
            .unwrap();
        workflow.select_payment_type(&id, PaymentType::Robux).unwrap();
        workflow.select_category(&id, Category::ForHire).unwrap();

        let err = workflow.submit(&id).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation { field: "pastWork", .. }));
    }

    #[tokio::test]
    async fn hiring_submission_drops_inactive_portfolio() {
        let (workflow, _, _) = setup().await;
        let id = workflow.start(submitter("4")).await.unwrap().id;
        workflow.select_category(&id, Category::ForHire).unwrap();
        workflow
            .edit_fields(
                &id,
                FieldEdits {
                    title: "t".into(),
                    description: "d".into(),
                    payment: "10".into(),
                    conditional: Some("http://portfolio.example".into()),
                },
            )
            .unwrap();
        workflow.select_category(&id, Category::Hiring).unwrap();
        workflow.select_payment_type(&id, PaymentType::Usd).unwrap();

        let post = workflow.submit(&id).await.unwrap().unwrap();
        assert_eq!(post.detail, CategoryDetail::Hiring { reference: None });
    }

    #[tokio::test]
    async fn absent_drafts_are_silent_noops() {
        let (workflow, notifier, _) = setup().await;
        let ghost = DraftId::generate("0");

        assert!(workflow.select_category(&ghost, Category::ForHire).is_none());
        assert!(workflow.select_payment_type(&ghost, PaymentType::Usd).is_none());
        assert!(workflow.edit_fields(&ghost, FieldEdits::default()).is_none());
        assert!(workflow.load_previous(&ghost).await.unwrap().is_none());
        assert!(workflow.submit(&ghost).await.unwrap().is_none());
        assert_eq!(notifier.sent_count().await, 0);
    }

    #[tokio::test]
    async fn second_submit_of_same_draft_is_a_noop() {
        let (workflow, _, pool) = setup().await;
        let id = workflow.start(submitter("6")).await.unwrap().id;
        workflow
            .edit_fields(
                &id,
                FieldEdits {
                    title: "t".into(),
                    description: "d".into(),
                    payment: "10".into(),
                    conditional: None,
                },
            )
            .unwrap();
        workflow.select_payment_type(&id, PaymentType::Usd).unwrap();

        assert!(workflow.submit(&id).await.unwrap().is_some());
        assert!(workflow.submit(&id).await.unwrap().is_none());
        assert_eq!(db::posts_by_creator(&pool, "6").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repost_prefills_from_latest_post() {
        let (workflow, _, pool) = setup().await;
        db::create_post(
            &pool,
            &db::sample_new_post(
                "8",
                CategoryDetail::ForHire {
                    past_work: "http://portfolio.example".into(),
                },
            ),
        )
        .await
        .unwrap();

        let started = workflow.start(submitter("8")).await.unwrap();
        assert!(started.has_prior_posts);

        let preview = workflow.load_previous(&started.id).await.unwrap().unwrap();
        assert_eq!(preview.title, "Logo Animation");
        assert_eq!(preview.payment, "500");
        assert_eq!(preview.payment_type, "USD");
        assert_eq!(preview.category, Category::ForHire);
        assert_eq!(preview.conditional_value, "http://portfolio.example");

        let fresh = workflow.start(submitter("nobody")).await.unwrap();
        let err = workflow.load_previous(&fresh.id).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation { .. }));
    }
}
