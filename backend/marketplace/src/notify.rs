//! Outbound notifications: moderator queue, public listings, audit log and
//! direct messages.
//!
//! A failed notification never undoes a committed status change. Callers
//! go through [`deliver`] / [`retract`], which turn the sink's `Result`
//! into a [`Delivery`] that must be logged.

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::models::{Moderator, Post, RatingSummary};

/// Where a notice is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Channel(u64),
    /// Direct message to a Discord user id.
    User(String),
}

/// Handle to a message the sink has sent, so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

impl MessageRef {
    /// Parse the `{channel}/{message}` form stored on a post.
    pub fn parse(raw: &str) -> Option<Self> {
        let (channel, message) = raw.split_once('/')?;
        Some(MessageRef {
            channel_id: channel.parse().ok()?,
            message_id: message.parse().ok()?,
        })
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.message_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A pending post awaiting a moderator decision.
    ReviewRequest {
        post: Post,
        /// Present only when the post already has reviews.
        rating: Option<RatingSummary>,
    },
    /// The public listing for an approved post.
    Listing {
        post: Post,
        rating: RatingSummary,
        moderator: Moderator,
    },
    ApprovalLog {
        post: Post,
        moderator: Moderator,
    },
    RejectionLog {
        post: Post,
        moderator: Moderator,
        reason: String,
    },
    ApprovedDm {
        title: String,
    },
    RejectedDm {
        title: String,
        reason: String,
    },
}

impl Notice {
    pub fn kind(&self) -> &'static str {
        match self {
            Notice::ReviewRequest { .. } => "review_request",
            Notice::Listing { .. } => "listing",
            Notice::ApprovalLog { .. } => "approval_log",
            Notice::RejectionLog { .. } => "rejection_log",
            Notice::ApprovedDm { .. } => "approved_dm",
            Notice::RejectedDm { .. } => "rejected_dm",
        }
    }

    /// Plain-text body for notices sent as direct messages.
    pub fn direct_text(&self) -> Option<String> {
        match self {
            Notice::ApprovedDm { title } => Some(format!(
                "✅ Your marketplace post \"{title}\" has been approved!"
            )),
            Notice::RejectedDm { title, reason } => Some(format!(
                "Your marketplace post \"{title}\" was rejected for the following reason: {reason}"
            )),
            _ => None,
        }
    }
}

/// A messaging platform able to post notices and remove them again.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, target: &Target, notice: &Notice) -> Result<MessageRef>;

    async fn retract(&self, message: &MessageRef) -> Result<()>;
}

/// Outcome of a best-effort notification.
#[must_use = "delivery outcomes must be logged with `Delivery::log`"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T = ()> {
    Sent(T),
    Failed(String),
}

impl<T> Delivery<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(v) => Delivery::Sent(v),
            Err(e) => Delivery::Failed(e.to_string()),
        }
    }

    /// Log the outcome and hand back the sent value, if any.
    pub fn log(self, label: &str, post_id: i64) -> Option<T> {
        match self {
            Delivery::Sent(v) => {
                debug!(post_id, "{label} delivered");
                Some(v)
            }
            Delivery::Failed(reason) => {
                warn!(post_id, "{label} failed: {reason}");
                None
            }
        }
    }
}

pub async fn deliver(
    notifier: &dyn Notifier,
    target: &Target,
    notice: &Notice,
) -> Delivery<MessageRef> {
    Delivery::from_result(notifier.deliver(target, notice).await)
}

pub async fn retract(notifier: &dyn Notifier, message: &MessageRef) -> Delivery {
    Delivery::from_result(notifier.retract(message).await)
}

#[cfg(test)]
pub mod testing {
    //! Recording notifier used by workflow tests.

    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use tokio::sync::Mutex;

    use super::*;
    use crate::errors::MarketError;

    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(Target, Notice)>>,
        retracted: Mutex<Vec<MessageRef>>,
        next_id: AtomicU64,
        fail_direct: AtomicBool,
        fail_channels: AtomicBool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every direct message fail, as if the user blocks DMs.
        pub fn fail_direct_messages(&self) {
            self.fail_direct.store(true, Ordering::SeqCst);
        }

        pub fn fail_channel_messages(&self) {
            self.fail_channels.store(true, Ordering::SeqCst);
        }

        pub async fn sent(&self) -> Vec<(Target, Notice)> {
            self.sent.lock().await.clone()
        }

        pub async fn sent_count(&self) -> usize {
            self.sent.lock().await.len()
        }

        pub async fn retracted(&self) -> Vec<MessageRef> {
            self.retracted.lock().await.clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, target: &Target, notice: &Notice) -> Result<MessageRef> {
            let channel_id = match target {
                Target::User(_) if self.fail_direct.load(Ordering::SeqCst) => {
                    return Err(MarketError::Delivery("cannot send messages to this user".into()))
                }
                Target::Channel(_) if self.fail_channels.load(Ordering::SeqCst) => {
                    return Err(MarketError::Delivery("missing access".into()))
                }
                Target::Channel(id) => *id,
                Target::User(_) => 0,
            };
            self.sent.lock().await.push((target.clone(), notice.clone()));
            Ok(MessageRef {
                channel_id,
                message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            })
        }

        async fn retract(&self, message: &MessageRef) -> Result<()> {
            self.retracted.lock().await.push(*message);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    #[test]
    fn message_ref_round_trips_through_storage_form() {
        let msg = MessageRef {
            channel_id: 1_456_382_405_329_031_260,
            message_id: 99,
        };
        assert_eq!(MessageRef::parse(&msg.to_string()), Some(msg));
        assert_eq!(MessageRef::parse("garbage"), None);
        assert_eq!(MessageRef::parse("1/x"), None);
    }

    #[test]
    fn direct_texts() {
        let approved = Notice::ApprovedDm {
            title: "Rigging".into(),
        };
        assert_eq!(
            approved.direct_text().unwrap(),
            "✅ Your marketplace post \"Rigging\" has been approved!"
        );
        let rejected = Notice::RejectedDm {
            title: "Rigging".into(),
            reason: "Low quality".into(),
        };
        assert!(rejected.direct_text().unwrap().ends_with("reason: Low quality"));
    }

    #[tokio::test]
    async fn failed_delivery_is_reported_not_raised() {
        let notifier = RecordingNotifier::new();
        notifier.fail_direct_messages();

        let outcome = deliver(
            &notifier,
            &Target::User("1".into()),
            &Notice::ApprovedDm { title: "t".into() },
        )
        .await;
        assert!(matches!(outcome, Delivery::Failed(_)));
        assert_eq!(outcome.log("approval dm", 1), None);
        assert_eq!(notifier.sent_count().await, 0);

        let sent = deliver(
            &notifier,
            &Target::Channel(5),
            &Notice::ApprovedDm { title: "t".into() },
        )
        .await;
        assert_eq!(sent.log("channel", 1).map(|m| m.channel_id), Some(5));
    }
}
