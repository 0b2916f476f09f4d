use axum::extract::State;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::models::{FeedbackChanges, SubmitFeedback, UserRole};
use crate::routes::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{Actor, ApiJson, ApiPath};
use crate::utils::response::{created, empty_success, success};

const MODERATORS: &[UserRole] = &[UserRole::Admin, UserRole::SuperAdmin];

pub async fn list_feedback(State(state): State<AppState>, _actor: Actor) -> Result<Response, AppError> {
    let entries = state.engine.feedback.list().await?;
    Ok(success(entries, "Feedback retrieved successfully").into_response())
}

pub async fn my_feedback(State(state): State<AppState>, actor: Actor) -> Result<Response, AppError> {
    let entries = state.engine.feedback.list_for_author(actor.user_id).await?;
    Ok(success(entries, "Feedback retrieved successfully").into_response())
}

pub async fn feedback_summary(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Response, AppError> {
    actor.require(MODERATORS)?;
    let summary = state.engine.feedback.summary_by_event().await?;
    Ok(success(summary, "Feedback summary retrieved successfully").into_response())
}

pub async fn get_feedback(
    State(state): State<AppState>,
    _actor: Actor,
    ApiPath(feedback_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let entry = state.engine.feedback.get(feedback_id).await?;
    Ok(success(entry, "Feedback retrieved successfully").into_response())
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<SubmitFeedback>,
) -> Result<Response, AppError> {
    actor.require(&[UserRole::RegisteredUser])?;
    let entry = state.engine.feedback.submit(actor.user_id, request).await?;
    Ok(created(entry, "Feedback submitted successfully").into_response())
}

pub async fn update_feedback(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(feedback_id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<FeedbackChanges>,
) -> Result<Response, AppError> {
    actor.require(&[UserRole::RegisteredUser])?;
    let entry = state
        .engine
        .feedback
        .update(feedback_id, actor.user_id, changes)
        .await?;
    Ok(success(entry, "Feedback updated successfully").into_response())
}

pub async fn delete_feedback(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(feedback_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    actor.require(MODERATORS)?;
    state.engine.feedback.delete(feedback_id).await?;
    Ok(empty_success("Feedback deleted successfully").into_response())
}
