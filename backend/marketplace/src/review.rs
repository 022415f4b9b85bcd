//! Moderator review: puts pending posts in front of moderators and resolves
//! each one exactly once.
//!
//! ```text
//! Pending ──approve──► Approved   (listing + audit log + DM)
//!    └─────deny──────► Rejected   (audit log with reason + DM)
//! ```
//!
//! The status change is the only step that can fail the operation. Every
//! notification after it is best effort and only logged on failure.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::ChannelMap;
use crate::db;
use crate::errors::{MarketError, Result};
use crate::models::{Category, Moderator, Post, PostStatus, RatingSummary};
use crate::notify::{self, MessageRef, Notice, Notifier, Target};

#[derive(Clone)]
pub struct ReviewWorkflow {
    pool: SqlitePool,
    notifier: Arc<dyn Notifier>,
    channels: ChannelMap,
}

impl ReviewWorkflow {
    pub fn new(pool: SqlitePool, notifier: Arc<dyn Notifier>, channels: ChannelMap) -> Self {
        ReviewWorkflow {
            pool,
            notifier,
            channels,
        }
    }

    /// Post a review request to the moderator channel and remember the
    /// message so that resolving the post can remove it.
    ///
    /// The post is already committed, so nothing here can fail the caller.
    /// Store and delivery errors are logged and the post is returned as is.
    pub async fn publish_for_review(&self, mut post: Post) -> Post {
        let rating = match db::rating_summary(&self.pool, post.id).await {
            Ok(summary) => (summary.count > 0).then_some(summary),
            Err(e) => {
                warn!(post_id = post.id, "rating lookup failed, requesting review without it: {e}");
                None
            }
        };
        let notice = Notice::ReviewRequest {
            post: post.clone(),
            rating,
        };

        let sent = notify::deliver(
            self.notifier.as_ref(),
            &Target::Channel(self.channels.review),
            &notice,
        )
        .await
        .log("review request", post.id);

        if let Some(message) = sent {
            let stored = message.to_string();
            match db::set_review_message(&self.pool, post.id, &stored).await {
                Ok(()) => post.review_message_id = Some(stored),
                Err(e) => warn!(
                    post_id = post.id,
                    message = %stored,
                    "could not record review message, it will not be removed on resolution: {e}"
                ),
            }
        }
        post
    }

    pub async fn approve(&self, post_id: i64, moderator: &Moderator) -> Result<Post> {
        let post = db::resolve_post(&self.pool, post_id, PostStatus::Approved, &moderator.id, None)
            .await?;
        let Some(post) = post else {
            return Err(self.unresolvable(post_id).await?);
        };
        info!(post_id, moderator = %moderator.name, "Post approved");

        let rating = match db::rating_summary(&self.pool, post_id).await {
            Ok(rating) => rating,
            Err(e) => {
                warn!(post_id, "rating lookup failed, listing without reviews: {e}");
                RatingSummary::new(None, 0)
            }
        };

        let listing_channel = match post.category() {
            Category::Hiring => self.channels.hiring,
            Category::ForHire => self.channels.for_hire,
        };
        self.send(
            Target::Channel(listing_channel),
            Notice::Listing {
                post: post.clone(),
                rating,
                moderator: moderator.clone(),
            },
            "public listing",
            post_id,
        )
        .await;
        self.send(
            Target::Channel(self.channels.log),
            Notice::ApprovalLog {
                post: post.clone(),
                moderator: moderator.clone(),
            },
            "approval log",
            post_id,
        )
        .await;
        self.send(
            Target::User(post.creator_id.clone()),
            Notice::ApprovedDm {
                title: post.title.clone(),
            },
            "approval dm",
            post_id,
        )
        .await;
        self.clear_review_message(&post).await;

        Ok(post)
    }

    pub async fn deny(&self, post_id: i64, moderator: &Moderator, reason: &str) -> Result<Post> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(MarketError::validation(
                "reason",
                "A rejection reason is required.",
            ));
        }

        let post = db::resolve_post(
            &self.pool,
            post_id,
            PostStatus::Rejected,
            &moderator.id,
            Some(reason),
        )
        .await?;
        let Some(post) = post else {
            return Err(self.unresolvable(post_id).await?);
        };
        info!(post_id, moderator = %moderator.name, reason, "Post rejected");

        self.send(
            Target::User(post.creator_id.clone()),
            Notice::RejectedDm {
                title: post.title.clone(),
                reason: reason.to_string(),
            },
            "rejection dm",
            post_id,
        )
        .await;
        self.send(
            Target::Channel(self.channels.log),
            Notice::RejectionLog {
                post: post.clone(),
                moderator: moderator.clone(),
                reason: reason.to_string(),
            },
            "rejection log",
            post_id,
        )
        .await;
        self.clear_review_message(&post).await;

        Ok(post)
    }

    async fn send(&self, target: Target, notice: Notice, label: &str, post_id: i64) {
        let _ = notify::deliver(self.notifier.as_ref(), &target, &notice)
            .await
            .log(label, post_id);
    }

    async fn clear_review_message(&self, post: &Post) {
        let Some(message) = post.review_message_id.as_deref().and_then(MessageRef::parse) else {
            return;
        };
        let _ = notify::retract(self.notifier.as_ref(), &message)
            .await
            .log("review message removal", post.id);
    }

    /// Explain why a conditional resolve changed nothing.
    async fn unresolvable(&self, post_id: i64) -> Result<MarketError> {
        Ok(match db::get_post(&self.pool, post_id).await? {
            None => MarketError::NotFound(format!("Post {post_id}")),
            Some(post) if post.status.is_terminal() => MarketError::Conflict(format!(
                "Post {post_id} was already {}",
                post.status.as_str()
            )),
            // Another resolver's write is not visible yet; still a lost race.
            Some(_) => MarketError::Conflict(format!("Post {post_id} is being resolved")),
        })
    }
}
