//! Discord presentation: embeds, components and forms for the wizard and
//! for every [`Notice`] the review workflow emits.

use serenity::all::{
    ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter,
    CreateInputText, CreateMessage, CreateModal, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, InputTextStyle, Timestamp,
};

use crate::bot::action::Action;
use crate::composition::{conditional_label, Preview, TITLE_LIMIT};
use crate::drafts::{Draft, DraftId, NOT_SET, UNTITLED};
use crate::models::{Category, CategoryDetail, Moderator, Post, RatingSummary};
use crate::notify::Notice;

const GOLD: u32 = 0xF1C40F;
const ORANGE: u32 = 0xF39C12;
const GREEN: u32 = 0x2ECC71;
const RED: u32 = 0xE74C3C;

// Discord limits, in characters.
const FIELD_LIMIT: usize = 1024;
const EMBED_TITLE_LIMIT: usize = 256;
const PAYMENT_INPUT_LIMIT: u16 = 32;
const TEXT_INPUT_LIMIT: u16 = 1024;

// Form input ids.
pub const INPUT_TITLE: &str = "title";
pub const INPUT_DESCRIPTION: &str = "description";
pub const INPUT_PAYMENT: &str = "payment";
pub const INPUT_PAST_WORK: &str = "past_work";
pub const INPUT_REFERENCE: &str = "reference";
pub const INPUT_REASON: &str = "reason";

fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(limit - 1).collect();
    cut.push('…');
    cut
}

fn field_value(value: &str) -> String {
    if value.trim().is_empty() {
        return NOT_SET.to_string();
    }
    truncate(value, FIELD_LIMIT)
}

fn embed_title(value: &str) -> String {
    if value.trim().is_empty() {
        return UNTITLED.to_string();
    }
    truncate(value, EMBED_TITLE_LIMIT)
}

fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

fn is_link(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

fn avatar_url(user_id: &str, avatar_hash: Option<&str>) -> Option<String> {
    avatar_hash.map(|hash| format!("https://cdn.discordapp.com/avatars/{user_id}/{hash}.png"))
}

// ─────────────────────────────────────────────────────────
// Composition wizard
// ─────────────────────────────────────────────────────────

pub fn preview_embed(preview: &Preview) -> CreateEmbed {
    CreateEmbed::new()
        .title(embed_title(&preview.title))
        .colour(GOLD)
        .author(CreateEmbedAuthor::new("Marketplace Preview"))
        .field("Description", field_value(&preview.description), false)
        .field(
            "Payment Details",
            field_value(&format!(
                "Amount: {}\nType: {}",
                preview.payment, preview.payment_type
            )),
            false,
        )
        .field(
            "Contact Information",
            format!(
                "Creator: {}\nID: {}",
                preview.creator_name,
                mention(&preview.creator_id)
            ),
            false,
        )
        .field(
            preview.conditional_label,
            field_value(&preview.conditional_value),
            false,
        )
}

/// Select menus first, then the action buttons.
pub fn wizard_components(id: &DraftId, has_prior_posts: bool) -> Vec<CreateActionRow> {
    let category = CreateSelectMenu::new(
        Action::SelectCategory(id.clone()).custom_id(),
        CreateSelectMenuKind::String {
            options: vec![
                CreateSelectMenuOption::new(Category::Hiring.label(), Category::Hiring.as_str()),
                CreateSelectMenuOption::new(Category::ForHire.label(), Category::ForHire.as_str()),
            ],
        },
    )
    .placeholder("Select Hiring Type");

    let payment_type = CreateSelectMenu::new(
        Action::SelectPaymentType(id.clone()).custom_id(),
        CreateSelectMenuKind::String {
            options: vec![
                CreateSelectMenuOption::new("USD", "USD"),
                CreateSelectMenuOption::new("Robux", "Robux"),
            ],
        },
    )
    .placeholder("Select Payment Type");

    let mut buttons = vec![
        CreateButton::new(Action::Edit(id.clone()).custom_id())
            .label(if has_prior_posts { "Edit" } else { "Create New Post" })
            .style(ButtonStyle::Primary),
        CreateButton::new(Action::Submit(id.clone()).custom_id())
            .label("Submit")
            .style(ButtonStyle::Success),
    ];
    if has_prior_posts {
        buttons.push(
            CreateButton::new(Action::Repost(id.clone()).custom_id())
                .label("Repost Previous")
                .style(ButtonStyle::Secondary),
        );
    }

    vec![
        CreateActionRow::SelectMenu(category),
        CreateActionRow::SelectMenu(payment_type),
        CreateActionRow::Buttons(buttons),
    ]
}

/// Edit form, pre-filled from the draft. Only the active category's
/// conditional field is offered.
pub fn edit_modal(id: &DraftId, draft: &Draft) -> CreateModal {
    let text = |style, label: &str, input_id: &str, value: &str, max: u16| {
        CreateInputText::new(style, label, input_id)
            .value(value)
            .max_length(max)
    };

    let conditional = match draft.category {
        Category::ForHire => text(
            InputTextStyle::Paragraph,
            "Past Work",
            INPUT_PAST_WORK,
            draft.past_work.as_deref().unwrap_or_default(),
            TEXT_INPUT_LIMIT,
        ),
        Category::Hiring => text(
            InputTextStyle::Paragraph,
            "Reference (Optional)",
            INPUT_REFERENCE,
            draft.reference.as_deref().unwrap_or_default(),
            TEXT_INPUT_LIMIT,
        )
        .required(false),
    };

    CreateModal::new(Action::DraftForm(id.clone()).custom_id(), "Edit Post").components(vec![
        CreateActionRow::InputText(text(
            InputTextStyle::Short,
            "Title",
            INPUT_TITLE,
            &truncate(&draft.title, TITLE_LIMIT),
            TITLE_LIMIT as u16,
        )),
        CreateActionRow::InputText(text(
            InputTextStyle::Paragraph,
            "Description",
            INPUT_DESCRIPTION,
            &truncate(&draft.description, FIELD_LIMIT),
            TEXT_INPUT_LIMIT,
        )),
        CreateActionRow::InputText(text(
            InputTextStyle::Short,
            "Payment",
            INPUT_PAYMENT,
            draft.payment.as_deref().unwrap_or_default(),
            PAYMENT_INPUT_LIMIT,
        )),
        CreateActionRow::InputText(conditional),
    ])
}

pub fn deny_modal(post_id: i64) -> CreateModal {
    CreateModal::new(Action::DenyForm(post_id).custom_id(), "Rejection Reason").components(vec![
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Paragraph, "Reason", INPUT_REASON)
                .required(true)
                .max_length(TEXT_INPUT_LIMIT),
        ),
    ])
}

// ─────────────────────────────────────────────────────────
// Notices
// ─────────────────────────────────────────────────────────

pub fn notice_message(notice: &Notice) -> CreateMessage {
    match notice {
        Notice::ReviewRequest { post, rating } => CreateMessage::new()
            .embed(review_request_embed(post, rating.as_ref()))
            .components(vec![review_buttons(post.id)]),
        Notice::Listing {
            post,
            rating,
            moderator,
        } => CreateMessage::new().embed(listing_embed(post, rating, moderator)),
        Notice::ApprovalLog { post, moderator } => {
            CreateMessage::new().embed(audit_embed("Post Approved", GREEN, post, moderator))
        }
        Notice::RejectionLog {
            post,
            moderator,
            reason,
        } => CreateMessage::new().embed(
            audit_embed("Post Rejected", RED, post, moderator)
                .field("Reason", field_value(reason), false),
        ),
        Notice::ApprovedDm { .. } | Notice::RejectedDm { .. } => {
            CreateMessage::new().content(notice.direct_text().unwrap_or_default())
        }
    }
}

fn review_request_embed(post: &Post, rating: Option<&RatingSummary>) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("Awaiting Approval")
        .description("A new marketplace listing has been submitted and requires review.")
        .colour(ORANGE)
        .field(
            "Listing Details",
            field_value(&format!(
                "**Title:** {}\n**Category:** {}\n**Payment:** {} {}",
                post.title,
                post.category().label(),
                post.payment,
                post.payment_type.as_str()
            )),
            false,
        )
        .field("Description", field_value(&post.description), false)
        .field(
            "Submission Info",
            format!(
                "**User:** {}\n**Discord ID:** {}",
                post.creator_username,
                mention(&post.creator_id)
            ),
            false,
        )
        .timestamp(Timestamp::now());

    match &post.detail {
        CategoryDetail::ForHire { past_work } => {
            embed = embed.field(conditional_label(Category::ForHire), field_value(past_work), false);
        }
        CategoryDetail::Hiring {
            reference: Some(reference),
        } => {
            embed = embed.field(conditional_label(Category::Hiring), field_value(reference), false);
        }
        CategoryDetail::Hiring { reference: None } => {}
    }
    if let Some(rating) = rating {
        embed = embed.field("Current Rating", rating.to_string(), false);
    }
    if let Some(url) = avatar_url(&post.creator_id, post.creator_avatar.as_deref()) {
        embed = embed.thumbnail(url);
    }
    embed
}

fn review_buttons(post_id: i64) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(Action::Approve(post_id).custom_id())
            .label("Approve")
            .style(ButtonStyle::Success),
        CreateButton::new(Action::Deny(post_id).custom_id())
            .label("Deny")
            .style(ButtonStyle::Danger),
    ])
}

fn listing_embed(post: &Post, rating: &RatingSummary, moderator: &Moderator) -> CreateEmbed {
    let mut footer = CreateEmbedFooter::new(format!("Rating: {rating}"));
    if let Some(icon) = &moderator.avatar_url {
        footer = footer.icon_url(icon);
    }

    let mut embed = CreateEmbed::new()
        .title(embed_title(&post.title))
        .description(field_value(&post.description))
        .colour(GOLD)
        .field(
            "Payment",
            field_value(&format!("{} {}", post.payment, post.payment_type.as_str())),
            true,
        )
        .field("Contact", mention(&post.creator_id), true)
        .footer(footer);

    // Discord rejects the whole message when an embed image is not a URL.
    if let Some(image) = post.detail.image_url().filter(|v| is_link(v)) {
        embed = embed.image(image);
    }
    embed
}

fn audit_embed(title: &str, colour: u32, post: &Post, moderator: &Moderator) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .colour(colour)
        .field("Title", field_value(&post.title), false)
        .field("User", mention(&post.creator_id), false)
        .field("Moderator", mention(&moderator.id), false)
        .timestamp(Timestamp::now())
}
