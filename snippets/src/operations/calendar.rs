use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{segment, EmailAddress, ItemBody, Page};
use crate::errors::OpResult;
use crate::session::{ServiceDomain, Session};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attendee {
    pub email_address: EmailAddress,
    #[serde(rename = "Type")]
    pub attendee_type: String,
}

impl Attendee {
    pub fn required(address: &str) -> Self {
        Self {
            email_address: EmailAddress::new(address),
            attendee_type: "Required".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

/// Caller-supplied event fields. Start and end take their date from `start`
/// and `end` and their time of day from `start_time` and `end_time`.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub location: String,
    pub body: String,
    /// Semicolon-separated attendee addresses
    pub attendees: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[async_trait]
pub trait CalendarOperations: Send + Sync {
    async fn list_events(&self) -> OpResult<Vec<Event>>;

    /// Add the fixed "Weekly Sync" sample event and return its id
    async fn add_sample_event(&self) -> OpResult<String>;

    async fn add_event(&self, draft: &EventDraft) -> OpResult<String>;

    async fn get_event(&self, event_id: &str) -> OpResult<Event>;

    async fn update_event(&self, event_id: &str, draft: &EventDraft) -> OpResult<Event>;

    /// Delete and return the event as it was before deletion
    async fn delete_event(&self, event_id: &str) -> OpResult<Event>;
}

/// Split a `;`-separated address list into required attendees
pub fn parse_attendees(attendees: &str) -> Vec<Attendee> {
    attendees
        .split(';')
        .filter(|address| !address.is_empty())
        .map(Attendee::required)
        .collect()
}

/// Move `new_date` by the difference between `new_time` and the time of day
/// `old` shows in `tz`. Hours, minutes and seconds shift independently.
pub fn shift_time_of_day(old: DateTime<Utc>, new_date: DateTime<Utc>, new_time: NaiveTime, tz: &Tz) -> DateTime<Utc> {
    let old_local = old.with_timezone(tz).time();

    new_date
        + Duration::hours(i64::from(new_time.hour()) - i64::from(old_local.hour()))
        + Duration::minutes(i64::from(new_time.minute()) - i64::from(old_local.minute()))
        + Duration::seconds(i64::from(new_time.second()) - i64::from(old_local.second()))
}

pub fn sample_event() -> Event {
    Event {
        id: String::new(),
        subject: Some("Weekly Sync".to_string()),
        body: Some(ItemBody::text("Status updates, blocking issues, and next steps")),
        location: Some(Location {
            display_name: "Water cooler".to_string(),
        }),
        start: Utc.with_ymd_and_hms(2014, 12, 1, 9, 30, 0).single(),
        end: Utc.with_ymd_and_hms(2014, 12, 1, 10, 0, 0).single(),
        attendees: vec![Attendee::required("mara@fabrikam.com")],
    }
}

/// Rewrite `event` with the draft's fields, shifting start and end from the
/// event's current times.
fn apply_draft(mut event: Event, draft: &EventDraft, tz: &Tz) -> Event {
    event.subject = Some(draft.subject.clone());
    event.location = Some(Location {
        display_name: draft.location.clone(),
    });
    event.body = Some(ItemBody::text(&draft.body));
    event.attendees = parse_attendees(&draft.attendees);

    let old_start = event.start.unwrap_or(draft.start);
    let old_end = event.end.unwrap_or(draft.end);
    event.start = Some(shift_time_of_day(old_start, draft.start, draft.start_time, tz));
    event.end = Some(shift_time_of_day(old_end, draft.end, draft.end_time, tz));
    event
}

/// Calendar operations over Outlook REST
pub struct OutlookCalendar {
    session: Arc<Session>,
    timezone: Tz,
}

impl OutlookCalendar {
    pub fn new(session: Arc<Session>, timezone: Tz) -> Self {
        Self { session, timezone }
    }
}

#[async_trait]
impl CalendarOperations for OutlookCalendar {
    async fn list_events(&self) -> OpResult<Vec<Event>> {
        let client = self.session.try_client(ServiceDomain::Calendar).await?;
        let page: Page<Event> = client.get_json("me/events").await?;

        if let Some(first) = page.value.first() {
            debug!("First event: {}", first.id);
        }
        Ok(page.value)
    }

    async fn add_sample_event(&self) -> OpResult<String> {
        let client = self.session.try_client(ServiceDomain::Calendar).await?;
        let created: Event = client.post_json("me/calendar/events", &sample_event()).await?;

        debug!("Added event: {}", created.id);
        Ok(created.id)
    }

    async fn add_event(&self, draft: &EventDraft) -> OpResult<String> {
        let client = self.session.try_client(ServiceDomain::Calendar).await?;
        // the draft's own start is the reference time of day for a new event
        let event = apply_draft(
            Event {
                id: String::new(),
                subject: None,
                body: None,
                location: None,
                start: Some(draft.start),
                end: Some(draft.end),
                attendees: Vec::new(),
            },
            draft,
            &self.timezone,
        );

        let created: Event = client.post_json("me/events", &event).await?;
        debug!("Added event: {}", created.id);
        Ok(created.id)
    }

    async fn get_event(&self, event_id: &str) -> OpResult<Event> {
        let client = self.session.try_client(ServiceDomain::Calendar).await?;
        client.get_json(&format!("me/events/{}", segment(event_id))).await
    }

    async fn update_event(&self, event_id: &str, draft: &EventDraft) -> OpResult<Event> {
        let client = self.session.try_client(ServiceDomain::Calendar).await?;
        let path = format!("me/events/{}", segment(event_id));

        let current: Event = client.get_json(&path).await?;
        let mut changes = apply_draft(current, draft, &self.timezone);
        changes.id = String::new();

        let updated: Event = client.patch_json(&path, &changes).await?;
        debug!("Updated event: {}", updated.id);
        Ok(updated)
    }

    async fn delete_event(&self, event_id: &str) -> OpResult<Event> {
        let client = self.session.try_client(ServiceDomain::Calendar).await?;
        let path = format!("me/events/{}", segment(event_id));

        let existing: Event = client.get_json(&path).await?;
        client.delete(&path).await?;

        debug!("Deleted event: {}", existing.id);
        Ok(existing)
    }
}
