//! Marketplace records: posts, reviews and the team roster, plus the
//! enums that make up a post's lifecycle.
//!
//! ## Post lifecycle
//!
//! ```text
//! Pending ──► Approved
//!    └──────► Rejected
//! ```
//!
//! `Approved` and `Rejected` are terminal. No path leads back to `Pending`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{MarketError, Result};

/// Whether a post asks for help or offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Hiring,
    ForHire,
}

impl Category {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "hiring" => Some(Self::Hiring),
            "for_hire" => Some(Self::ForHire),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hiring => "hiring",
            Self::ForHire => "for_hire",
        }
    }

    /// Human-facing name used in Discord embeds.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hiring => "Hiring",
            Self::ForHire => "For Hire",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentType {
    #[serde(rename = "USD")]
    Usd,
    Robux,
}

impl PaymentType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "USD" => Some(Self::Usd),
            "Robux" => Some(Self::Robux),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Robux => "Robux",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Waiting in the moderator queue.
    Pending,
    /// Published to the public channel and the web listing.
    Approved,
    /// Turned down by a moderator.
    Rejected,
}

impl PostStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Only `Pending -> Approved` and `Pending -> Rejected` are legal.
    pub fn can_transition_to(&self, to: PostStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected)
        )
    }
}

/// The category-specific part of a post. Exactly one variant is live, so a
/// post can never carry both a portfolio and a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CategoryDetail {
    Hiring {
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ForHire { past_work: String },
}

impl CategoryDetail {
    pub fn category(&self) -> Category {
        match self {
            Self::Hiring { .. } => Category::Hiring,
            Self::ForHire { .. } => Category::ForHire,
        }
    }

    /// The attachment shown on the public listing, if any.
    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Hiring { reference } => reference.as_deref(),
            Self::ForHire { past_work } => Some(past_work.as_str()),
        }
    }
}

/// Who composed a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitter {
    /// Discord user id.
    pub id: String,
    pub username: String,
    /// Discord avatar hash.
    pub avatar: Option<String>,
}

/// The moderator resolving a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moderator {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A persisted marketplace listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    #[serde(flatten)]
    pub detail: CategoryDetail,
    pub status: PostStatus,
    pub title: String,
    pub description: String,
    pub payment: String,
    pub payment_type: PaymentType,
    pub creator_id: String,
    pub creator_username: String,
    pub creator_avatar: Option<String>,
    /// Moderator-queue message; internal, never part of the public JSON.
    #[serde(skip_serializing)]
    pub review_message_id: Option<String>,
    /// Discord id of the resolving moderator; internal.
    #[serde(skip_serializing)]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn category(&self) -> Category {
        self.detail.category()
    }
}

/// Everything needed to insert a post; the store assigns id, status and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub detail: CategoryDetail,
    pub title: String,
    pub description: String,
    pub payment: String,
    pub payment_type: PaymentType,
    pub creator: Submitter,
}

/// Raw `posts` row as stored in / read from SQLite.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub status: String,
    pub title: String,
    pub description: String,
    pub payment: String,
    pub payment_type: String,
    pub past_work: Option<String>,
    pub reference: Option<String>,
    pub creator_id: String,
    pub creator_username: String,
    pub creator_avatar: Option<String>,
    pub review_message_id: Option<String>,
    pub resolved_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: i64,
}

impl TryFrom<PostRow> for Post {
    type Error = MarketError;

    fn try_from(row: PostRow) -> Result<Self> {
        let detail = match Category::parse(&row.kind) {
            Some(Category::Hiring) => CategoryDetail::Hiring {
                reference: row.reference,
            },
            Some(Category::ForHire) => CategoryDetail::ForHire {
                past_work: row.past_work.unwrap_or_default(),
            },
            None => return Err(decode_error("type", &row.kind)),
        };
        let status =
            PostStatus::parse(&row.status).ok_or_else(|| decode_error("status", &row.status))?;
        let payment_type = PaymentType::parse(&row.payment_type)
            .ok_or_else(|| decode_error("payment_type", &row.payment_type))?;

        Ok(Post {
            id: row.id,
            detail,
            status,
            title: row.title,
            description: row.description,
            payment: row.payment,
            payment_type,
            creator_id: row.creator_id,
            creator_username: row.creator_username,
            creator_avatar: row.creator_avatar,
            review_message_id: row.review_message_id,
            resolved_by: row.resolved_by,
            rejection_reason: row.rejection_reason,
            created_at: from_millis(row.created_at),
        })
    }
}

fn decode_error(column: &str, value: &str) -> MarketError {
    MarketError::Database(sqlx::Error::Decode(
        format!("unexpected {column} value {value:?}").into(),
    ))
}

/// A rating and comment left on a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub post_id: i64,
    pub rating: i64,
    pub content: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub post_id: i64,
    pub rating: i64,
    pub content: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub created_at: i64,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            post_id: row.post_id,
            rating: row.rating,
            content: row.content,
            author_name: row.author_name,
            author_avatar: row.author_avatar,
            created_at: from_millis(row.created_at),
        }
    }
}

/// A validated review ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub post_id: i64,
    pub rating: i64,
    pub content: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
}

/// Body of `POST /api/posts/:postId/reviews`.
///
/// Every field is optional at the serde level so that a missing field is
/// reported as a validation failure naming it, rather than a bare 422.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewBody {
    pub rating: Option<i64>,
    pub content: Option<String>,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
}

impl CreateReviewBody {
    pub fn validate(self, post_id: i64) -> Result<NewReview> {
        let rating = self
            .rating
            .ok_or_else(|| MarketError::validation("rating", "rating is required"))?;
        if !(1..=5).contains(&rating) {
            return Err(MarketError::validation(
                "rating",
                "rating must be between 1 and 5",
            ));
        }
        let content = required_text(self.content, "content")?;
        let author_name = required_text(self.author_name, "authorName")?;

        Ok(NewReview {
            post_id,
            rating,
            content,
            author_name,
            author_avatar: self.author_avatar.filter(|a| !a.trim().is_empty()),
        })
    }
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MarketError::validation(field, format!("{field} is required"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub avatar_url: String,
}

/// Average star rating across a post's reviews.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    /// `0.0` when there are no reviews.
    pub average: f64,
    pub count: i64,
}

impl RatingSummary {
    pub fn new(average: Option<f64>, count: i64) -> Self {
        RatingSummary {
            average: if count > 0 { average.unwrap_or(0.0) } else { 0.0 },
            count,
        }
    }
}

impl fmt::Display for RatingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}/5 ({} reviews)", self.average, self.count)
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
