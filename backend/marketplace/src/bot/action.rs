//! Typed routing for Discord component and modal ids.
//!
//! Every button, select menu and form the bot renders carries a `custom_id`
//! of the form `{kind}:{payload}`. Handlers never look at the raw string;
//! they match on [`Action`].

use crate::drafts::DraftId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Category select menu on the wizard preview.
    SelectCategory(DraftId),
    /// Payment type select menu on the wizard preview.
    SelectPaymentType(DraftId),
    /// "Edit" button; opens the draft form.
    Edit(DraftId),
    /// "Repost Previous" button; pre-fills from the user's latest post.
    Repost(DraftId),
    Submit(DraftId),
    /// Submission of the draft edit form.
    DraftForm(DraftId),
    Approve(i64),
    /// "Deny" button; opens the rejection reason form.
    Deny(i64),
    /// Submission of the rejection reason form.
    DenyForm(i64),
}

impl Action {
    pub fn custom_id(&self) -> String {
        match self {
            Action::SelectCategory(id) => format!("category:{id}"),
            Action::SelectPaymentType(id) => format!("payment:{id}"),
            Action::Edit(id) => format!("edit:{id}"),
            Action::Repost(id) => format!("repost:{id}"),
            Action::Submit(id) => format!("submit:{id}"),
            Action::DraftForm(id) => format!("draft-form:{id}"),
            Action::Approve(post_id) => format!("approve:{post_id}"),
            Action::Deny(post_id) => format!("deny:{post_id}"),
            Action::DenyForm(post_id) => format!("deny-form:{post_id}"),
        }
    }

    pub fn parse(custom_id: &str) -> Option<Self> {
        let (kind, payload) = custom_id.split_once(':')?;
        let draft = || DraftId::parse(payload);
        let post = || payload.parse::<i64>().ok().filter(|id| *id > 0);

        match kind {
            "category" => draft().map(Action::SelectCategory),
            "payment" => draft().map(Action::SelectPaymentType),
            "edit" => draft().map(Action::Edit),
            "repost" => draft().map(Action::Repost),
            "submit" => draft().map(Action::Submit),
            "draft-form" => draft().map(Action::DraftForm),
            "approve" => post().map(Action::Approve),
            "deny" => post().map(Action::Deny),
            "deny-form" => post().map(Action::DenyForm),
            _ => None,
        }
    }
}
