//! Discord front-end: the `/post` wizard and the moderator review buttons.
//!
//! Every interaction enters through [`Handler::interaction_create`], is
//! routed by its typed [`Action`], and any error it produces is logged and
//! answered with a short ephemeral message. A failed interaction never
//! takes the gateway connection down.

pub mod action;
pub mod render;
pub mod sink;

use std::collections::HashMap;

use async_trait::async_trait;
use serenity::all::{
    ActionRowComponent, Client, Command, CommandInteraction, ComponentInteraction,
    ComponentInteractionDataKind, Context, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, EditInteractionResponse,
    EventHandler, GatewayIntents, GuildId, Interaction, ModalInteraction, Ready, User,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bot::action::Action;
use crate::composition::{CompositionWorkflow, FieldEdits, Preview};
use crate::errors::{MarketError, Result};
use crate::models::{Category, Moderator, PaymentType, Submitter};
use crate::review::ReviewWorkflow;

const POST_COMMAND: &str = "post";

pub struct Handler {
    composition: CompositionWorkflow,
    review: ReviewWorkflow,
    guild_id: Option<u64>,
}

impl Handler {
    pub fn new(
        composition: CompositionWorkflow,
        review: ReviewWorkflow,
        guild_id: Option<u64>,
    ) -> Self {
        Handler {
            composition,
            review,
            guild_id,
        }
    }
}

/// Connect to the gateway and handle interactions until `shutdown` fires.
pub async fn run(token: String, handler: Handler, shutdown: CancellationToken) -> Result<()> {
    let mut client = Client::builder(&token, GatewayIntents::GUILDS)
        .event_handler(handler)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        info!("Shutting down Discord shards");
        shard_manager.shutdown_all().await;
    });

    client.start().await?;
    Ok(())
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, "Discord bot connected");
        if let Err(e) = self.register_commands(&ctx).await {
            error!("Failed to register slash commands: {e}");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let (result, responder) = match &interaction {
            Interaction::Command(command) => (
                self.on_command(&ctx, command).await,
                Responder::Command(command),
            ),
            Interaction::Component(component) => (
                self.on_component(&ctx, component).await,
                Responder::Component(component),
            ),
            Interaction::Modal(modal) => (
                self.on_modal(&ctx, modal).await,
                Responder::Modal(modal),
            ),
            _ => return,
        };

        if let Err(e) = result {
            let text = user_message(&e);
            responder.report(&ctx, text).await;
        }
    }
}

impl Handler {
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        let post = CreateCommand::new(POST_COMMAND).description("Create a marketplace post");

        // Drop stale global registrations so the command is not listed twice.
        Command::set_global_commands(&ctx.http, vec![]).await?;
        match self.guild_id {
            Some(id) => {
                GuildId::new(id).set_commands(&ctx.http, vec![post]).await?;
                info!(guild_id = id, "Registered /{POST_COMMAND} for guild");
            }
            None => {
                Command::create_global_command(&ctx.http, post).await?;
                info!("Registered /{POST_COMMAND} globally");
            }
        }
        Ok(())
    }

    async fn on_command(&self, ctx: &Context, command: &CommandInteraction) -> Result<()> {
        if command.data.name != POST_COMMAND {
            return Ok(());
        }

        let started = self.composition.start(submitter(&command.user)).await?;
        let reply = CreateInteractionResponseMessage::new()
            .embed(render::preview_embed(&started.preview))
            .components(render::wizard_components(&started.id, started.has_prior_posts))
            .ephemeral(true);
        command
            .create_response(&ctx.http, CreateInteractionResponse::Message(reply))
            .await?;
        Ok(())
    }

    async fn on_component(&self, ctx: &Context, component: &ComponentInteraction) -> Result<()> {
        let Some(action) = Action::parse(&component.data.custom_id) else {
            debug!(custom_id = %component.data.custom_id, "Ignoring unknown component");
            return Ok(());
        };

        match action {
            Action::SelectCategory(id) => {
                let preview = selected(component)
                    .and_then(Category::parse)
                    .and_then(|category| self.composition.select_category(&id, category));
                show_preview(ctx, component, preview).await
            }
            Action::SelectPaymentType(id) => {
                let preview = selected(component)
                    .and_then(PaymentType::parse)
                    .and_then(|payment_type| self.composition.select_payment_type(&id, payment_type));
                show_preview(ctx, component, preview).await
            }
            Action::Edit(id) => {
                let response = match self.composition.draft(&id) {
                    Some(draft) => CreateInteractionResponse::Modal(render::edit_modal(&id, &draft)),
                    None => CreateInteractionResponse::Acknowledge,
                };
                component.create_response(&ctx.http, response).await?;
                Ok(())
            }
            Action::Repost(id) => {
                let preview = self.composition.load_previous(&id).await?;
                show_preview(ctx, component, preview).await
            }
            Action::Submit(id) => {
                component.defer(&ctx.http).await?;
                if let Some(post) = self.composition.submit(&id).await? {
                    debug!(post_id = post.id, "Wizard closed after submission");
                    component
                        .edit_response(
                            &ctx.http,
                            EditInteractionResponse::new()
                                .content("Post successfully submitted for review")
                                .embeds(vec![])
                                .components(vec![]),
                        )
                        .await?;
                }
                Ok(())
            }
            Action::Approve(post_id) => {
                component.defer_ephemeral(&ctx.http).await?;
                let post = self.review.approve(post_id, &moderator(&component.user)).await?;
                component
                    .edit_response(
                        &ctx.http,
                        EditInteractionResponse::new()
                            .content(format!("Approved \"{}\".", post.title)),
                    )
                    .await?;
                Ok(())
            }
            Action::Deny(post_id) => {
                component
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::Modal(render::deny_modal(post_id)),
                    )
                    .await?;
                Ok(())
            }
            Action::DraftForm(_) | Action::DenyForm(_) => {
                warn!(custom_id = %component.data.custom_id, "Form id used on a component");
                Ok(())
            }
        }
    }

    async fn on_modal(&self, ctx: &Context, modal: &ModalInteraction) -> Result<()> {
        let Some(action) = Action::parse(&modal.data.custom_id) else {
            debug!(custom_id = %modal.data.custom_id, "Ignoring unknown form");
            return Ok(());
        };
        let mut inputs = form_inputs(modal);

        match action {
            Action::DraftForm(id) => {
                let conditional = inputs
                    .remove(render::INPUT_PAST_WORK)
                    .or_else(|| inputs.remove(render::INPUT_REFERENCE));
                let mut take = |key: &str| inputs.remove(key).unwrap_or_default();
                let edits = FieldEdits {
                    title: take(render::INPUT_TITLE),
                    description: take(render::INPUT_DESCRIPTION),
                    payment: take(render::INPUT_PAYMENT),
                    conditional,
                };
                let response = match self.composition.edit_fields(&id, edits) {
                    Some(preview) => CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .embed(render::preview_embed(&preview)),
                    ),
                    None => CreateInteractionResponse::Acknowledge,
                };
                modal.create_response(&ctx.http, response).await?;
                Ok(())
            }
            Action::DenyForm(post_id) => {
                modal.defer_ephemeral(&ctx.http).await?;
                let reason = inputs.remove(render::INPUT_REASON).unwrap_or_default();
                let post = self
                    .review
                    .deny(post_id, &moderator(&modal.user), &reason)
                    .await?;
                modal
                    .edit_response(
                        &ctx.http,
                        EditInteractionResponse::new()
                            .content(format!("Rejected \"{}\".", post.title)),
                    )
                    .await?;
                Ok(())
            }
            _ => {
                warn!(custom_id = %modal.data.custom_id, "Component id used on a form");
                Ok(())
            }
        }
    }
}

/// Redraw the wizard preview, or silently acknowledge when the draft is gone.
async fn show_preview(
    ctx: &Context,
    component: &ComponentInteraction,
    preview: Option<Preview>,
) -> Result<()> {
    let response = match preview {
        Some(preview) => CreateInteractionResponse::UpdateMessage(
            CreateInteractionResponseMessage::new().embed(render::preview_embed(&preview)),
        ),
        None => CreateInteractionResponse::Acknowledge,
    };
    component.create_response(&ctx.http, response).await?;
    Ok(())
}

fn selected(component: &ComponentInteraction) -> Option<&str> {
    match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => {
            values.first().map(String::as_str)
        }
        _ => None,
    }
}

fn form_inputs(modal: &ModalInteraction) -> HashMap<String, String> {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .filter_map(|component| match component {
            ActionRowComponent::InputText(input) => input
                .value
                .clone()
                .map(|value| (input.custom_id.clone(), value)),
            _ => None,
        })
        .collect()
}

fn submitter(user: &User) -> Submitter {
    Submitter {
        id: user.id.to_string(),
        username: user.name.clone(),
        avatar: user.avatar.map(|hash| hash.to_string()),
    }
}

fn moderator(user: &User) -> Moderator {
    Moderator {
        id: user.id.to_string(),
        name: user.global_name.clone().unwrap_or_else(|| user.name.clone()),
        avatar_url: Some(user.face()),
    }
}

/// Short reply for the acting user. Internal details stay in the log.
fn user_message(err: &MarketError) -> String {
    match err {
        MarketError::Validation { message, .. } => message.clone(),
        MarketError::NotFound(_) => {
            "This post no longer exists or has already been handled.".to_string()
        }
        MarketError::Conflict(_) => "This post has already been resolved.".to_string(),
        other => {
            error!("Interaction failed: {other}");
            "Something went wrong while handling that. Please try again.".to_string()
        }
    }
}

/// The interaction an error reply goes to.
enum Responder<'a> {
    Command(&'a CommandInteraction),
    Component(&'a ComponentInteraction),
    Modal(&'a ModalInteraction),
}

impl Responder<'_> {
    /// Answer ephemerally, falling back to a follow-up when the
    /// interaction was already acknowledged.
    async fn report(&self, ctx: &Context, text: String) {
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(text.clone())
                .ephemeral(true),
        );
        let first = match self {
            Responder::Command(i) => i.create_response(&ctx.http, response).await,
            Responder::Component(i) => i.create_response(&ctx.http, response).await,
            Responder::Modal(i) => i.create_response(&ctx.http, response).await,
        };
        if first.is_ok() {
            return;
        }

        let followup = CreateInteractionResponseFollowup::new()
            .content(text)
            .ephemeral(true);
        let sent = match self {
            Responder::Command(i) => i.create_followup(&ctx.http, followup).await,
            Responder::Component(i) => i.create_followup(&ctx.http, followup).await,
            Responder::Modal(i) => i.create_followup(&ctx.http, followup).await,
        };
        if let Err(e) = sent {
            warn!("Could not report interaction error: {e}");
        }
    }
}
