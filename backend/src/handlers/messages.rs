//! Scheduled message HTTP handlers (admin)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Action, MessageTarget, Recipient, Resource};
use crate::services::messaging::{
    CreateMessageInput, MessageDelivery, MessageFilter, ScheduleInput, ScheduledMessage, UpdateMessageInput,
};
use crate::services::MessagingService;
use crate::AppState;

#[derive(Serialize)]
pub struct RecipientPreview {
    pub count: usize,
    pub recipients: Vec<Recipient>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<MessageFilter>,
) -> AppResult<Json<Vec<ScheduledMessage>>> {
    check_permission(&user, Resource::Message, Action::View)?;
    let service = MessagingService::new(state.db.clone());
    Ok(Json(service.list_messages(user.studio_id, &filter).await?))
}

pub async fn get_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
) -> AppResult<Json<ScheduledMessage>> {
    check_permission(&user, Resource::Message, Action::View)?;
    let service = MessagingService::new(state.db.clone());
    Ok(Json(service.get_message(user.studio_id, message_id).await?))
}

pub async fn create_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateMessageInput>,
) -> AppResult<(StatusCode, Json<ScheduledMessage>)> {
    check_permission(&user, Resource::Message, Action::Create)?;
    let service = MessagingService::new(state.db.clone());
    let message = service.create_message(user.studio_id, user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn update_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
    Json(input): Json<UpdateMessageInput>,
) -> AppResult<Json<ScheduledMessage>> {
    check_permission(&user, Resource::Message, Action::Edit)?;
    let service = MessagingService::new(state.db.clone());
    Ok(Json(service.update_message(user.studio_id, message_id, input).await?))
}

pub async fn schedule_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
    Json(input): Json<ScheduleInput>,
) -> AppResult<Json<ScheduledMessage>> {
    check_permission(&user, Resource::Message, Action::Edit)?;
    let service = MessagingService::new(state.db.clone());
    Ok(Json(service.schedule_message(user.studio_id, message_id, input).await?))
}

pub async fn cancel_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
) -> AppResult<Json<ScheduledMessage>> {
    check_permission(&user, Resource::Message, Action::Edit)?;
    let service = MessagingService::new(state.db.clone());
    Ok(Json(service.cancel_message(user.studio_id, message_id).await?))
}

/// Deliver a message immediately instead of waiting for the dispatch job
pub async fn send_now(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
) -> AppResult<Json<ScheduledMessage>> {
    check_permission(&user, Resource::Message, Action::Create)?;
    let service = MessagingService::new(state.db.clone());
    let message = service
        .send_now(user.studio_id, message_id, state.notifier.as_ref())
        .await?;
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&user, Resource::Message, Action::Delete)?;
    let service = MessagingService::new(state.db.clone());
    service.delete_message(user.studio_id, message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
) -> AppResult<Json<Vec<MessageDelivery>>> {
    check_permission(&user, Resource::Message, Action::View)?;
    let service = MessagingService::new(state.db.clone());
    Ok(Json(service.list_deliveries(user.studio_id, message_id).await?))
}

/// Families a target would reach right now
pub async fn preview_recipients(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(target): Json<MessageTarget>,
) -> AppResult<Json<RecipientPreview>> {
    check_permission(&user, Resource::Message, Action::View)?;
    let service = MessagingService::new(state.db.clone());
    let recipients = service.preview_recipients(user.studio_id, target).await?;
    Ok(Json(RecipientPreview {
        count: recipients.len(),
        recipients,
    }))
}
