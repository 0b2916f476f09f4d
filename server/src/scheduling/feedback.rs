use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use super::error::{SchedulingError, SchedulingResult};
use super::Context;
use crate::models::{
    Feedback, FeedbackChanges, FeedbackSummary, FeedbackView, SubmitFeedback, Ticket, TicketStatus,
};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 10;
pub const MAX_COMMENT_CHARS: usize = 255;

pub fn validate_entry(rating: i16, comment: Option<&str>) -> SchedulingResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(SchedulingError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )));
    }
    if let Some(comment) = comment {
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(SchedulingError::Validation(format!(
                "comment must be at most {MAX_COMMENT_CHARS} characters"
            )));
        }
    }
    Ok(())
}

/// A ticket proves attendance only if it belongs to the author, admits to the
/// rated event, and has been paid for.
pub fn check_eligibility(ticket: Option<&Ticket>, feedback: &Feedback) -> SchedulingResult<()> {
    let ticket = ticket.ok_or_else(|| {
        SchedulingError::Ineligible(format!("ticket {} does not exist", feedback.ticket_id))
    })?;
    if ticket.id != feedback.ticket_id || ticket.holder_id != feedback.author_id {
        return Err(SchedulingError::Ineligible(format!(
            "ticket {} is not held by user {}",
            feedback.ticket_id, feedback.author_id
        )));
    }
    if ticket.event_id != feedback.event_id {
        return Err(SchedulingError::Ineligible(format!(
            "ticket {} is not for event {}",
            ticket.id, feedback.event_id
        )));
    }
    if ticket.status != TicketStatus::Confirmed {
        return Err(SchedulingError::Ineligible(format!(
            "ticket {} is {}, not confirmed",
            ticket.id, ticket.status
        )));
    }
    Ok(())
}

pub(crate) fn draft(author_id: Uuid, request: SubmitFeedback, at: DateTime<Utc>) -> Feedback {
    Feedback {
        id: Uuid::new_v4(),
        event_id: request.event_id,
        ticket_id: request.ticket_id,
        author_id,
        rating: request.rating,
        comment: request.comment,
        submitted_at: at,
        updated_at: at,
    }
}

#[derive(Clone)]
pub struct FeedbackGate {
    ctx: Context,
}

impl FeedbackGate {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, request), fields(event_id = %request.event_id, ticket_id = %request.ticket_id))]
    pub async fn submit(&self, author_id: Uuid, request: SubmitFeedback) -> SchedulingResult<Feedback> {
        validate_entry(request.rating, request.comment.as_deref())?;

        let feedback = draft(author_id, request, self.ctx.now());
        let feedback = self
            .ctx
            .guarded(self.ctx.store().insert_feedback(feedback))
            .await?;
        info!(feedback_id = %feedback.id, rating = feedback.rating, "Feedback recorded");
        Ok(feedback)
    }

    /// Only the author may edit; eligibility is not re-checked.
    pub async fn update(
        &self,
        feedback_id: Uuid,
        author_id: Uuid,
        changes: FeedbackChanges,
    ) -> SchedulingResult<Feedback> {
        validate_entry(changes.rating, changes.comment.as_deref())?;
        let now = self.ctx.now();
        self.ctx
            .guarded(
                self.ctx
                    .store()
                    .update_feedback(feedback_id, author_id, &changes, now),
            )
            .await
    }

    pub async fn delete(&self, feedback_id: Uuid) -> SchedulingResult<()> {
        self.ctx
            .guarded(self.ctx.store().delete_feedback(feedback_id))
            .await?;
        info!(%feedback_id, "Feedback deleted");
        Ok(())
    }

    pub async fn get(&self, feedback_id: Uuid) -> SchedulingResult<FeedbackView> {
        self.ctx
            .guarded(self.ctx.store().feedback(feedback_id))
            .await?
            .ok_or_else(|| SchedulingError::not_found("Feedback", feedback_id))
    }

    pub async fn list(&self) -> SchedulingResult<Vec<FeedbackView>> {
        self.ctx.guarded(self.ctx.store().feedback_list(None)).await
    }

    pub async fn list_for_author(&self, author_id: Uuid) -> SchedulingResult<Vec<FeedbackView>> {
        self.ctx
            .guarded(self.ctx.store().feedback_list(Some(author_id)))
            .await
    }

    pub async fn summary_by_event(&self) -> SchedulingResult<Vec<FeedbackSummary>> {
        self.ctx.guarded(self.ctx.store().feedback_summary()).await
    }
}
