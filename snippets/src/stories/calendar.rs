use chrono::Utc;
use uuid::Uuid;

use super::{CleanupScope, Resource, StoryContext};
use crate::errors::OpResult;
use crate::operations::EventDraft;
use crate::session::ServiceDomain;

/// Event starting and ending now, with the current local time of day
fn draft_now(ctx: &StoryContext, location: &str) -> EventDraft {
    let now = Utc::now();
    let time_of_day = now.with_timezone(&ctx.timezone).time();

    EventDraft {
        location: location.to_string(),
        body: ctx.identifiers.calendar.clone(),
        attendees: String::new(),
        subject: Uuid::new_v4().to_string(),
        start: now,
        end: now,
        start_time: time_of_day,
        end_time: time_of_day,
    }
}

pub async fn client(ctx: &StoryContext) -> OpResult<bool> {
    Ok(ctx.session.client(ServiceDomain::Calendar).await.is_some())
}

pub async fn read(ctx: &StoryContext) -> OpResult<bool> {
    ctx.calendar.list_events().await?;
    Ok(true)
}

pub async fn create(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let event_id = ctx.calendar.add_sample_event().await?;
    scope.register(Resource::Event(event_id.clone()));
    Ok(!event_id.is_empty())
}

pub async fn create_with_args(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let draft = draft_now(ctx, &Uuid::new_v4().to_string());

    let event_id = ctx.calendar.add_event(&draft).await?;
    scope.register(Resource::Event(event_id.clone()));
    Ok(!event_id.is_empty())
}

pub async fn update(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let event_id = ctx.calendar.add_event(&draft_now(ctx, "OrigLocationValue")).await?;
    scope.register(Resource::Event(event_id.clone()));

    let changes = draft_now(ctx, "NewLocationValue");
    let updated = ctx.calendar.update_event(&event_id, &changes).await?;
    if updated.id != event_id {
        return Ok(false);
    }

    let stored = ctx.calendar.get_event(&event_id).await?;
    Ok(stored.location.map(|l| l.display_name).as_deref() == Some("NewLocationValue")
        && stored.subject.as_deref() == Some(changes.subject.as_str())
        && stored.body.map(|b| b.content).as_deref() == Some(changes.body.as_str()))
}

pub async fn delete(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let event_id = ctx.calendar.add_sample_event().await?;
    scope.register(Resource::Event(event_id.clone()));

    let deleted = ctx.calendar.delete_event(&event_id).await?;
    scope.dismiss(&Resource::Event(event_id));
    Ok(!deleted.id.is_empty())
}
