//! In-memory stand-ins for the identity provider, the discovery service and
//! every remote service, with call recording and fault injection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{StoryContext, StoryIdentifiers};
use crate::auth::TokenProvider;
use crate::config::Config;
use crate::discovery::{CapabilityDiscoveryResult, ServiceDiscovery};
use crate::errors::{OpError, OpResult};
use crate::operations::calendar::{parse_attendees, sample_event, Location};
use crate::operations::{
    Attachment, CalendarOperations, Contact, ContactDraft, ContactsOperations, DirectoryOperations, DriveItem,
    Event, EventDraft, FilesOperations, Group, ItemBody, MailFolder, MailOperations, Message, Recipient,
    TenantDetail, User,
};
use crate::poll::{CancelSignal, PollPolicy};
use crate::session::Session;

const FAKE_TENANT: &str = "fake-tenant";
const FAKE_USER: &str = "user@fake.example";
const WELL_KNOWN_FOLDERS: [&str; 4] = ["Inbox", "Drafts", "SentItems", "DeletedItems"];
const SEED_FOLDER_ID: &str = "seed-documents";

pub struct FakeTokenProvider {
    token: Option<String>,
    authority: Mutex<Option<String>>,
    token_calls: AtomicUsize,
    clear_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl FakeTokenProvider {
    pub fn signed_in() -> Self {
        Self {
            token: Some("fake-access-token".to_string()),
            authority: Mutex::new(Some(format!("https://login.microsoftonline.com/{}", FAKE_TENANT))),
            token_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// Every sign-in prompt is dismissed
    pub fn cancelling() -> Self {
        Self {
            token: None,
            authority: Mutex::new(None),
            ..Self::signed_in()
        }
    }

    pub fn forget_authority(&self) {
        *self.authority.lock() = None;
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for FakeTokenProvider {
    async fn get_token(&self, _resource_id: &str) -> OpResult<Option<String>> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }

    fn last_authority(&self) -> Option<String> {
        self.authority.lock().clone()
    }

    fn common_authority(&self) -> String {
        "https://login.microsoftonline.com/common".to_string()
    }

    fn tenant_id(&self) -> Option<String> {
        self.token.as_ref().map(|_| FAKE_TENANT.to_string())
    }

    fn user_email(&self) -> Option<String> {
        self.token.as_ref().map(|_| FAKE_USER.to_string())
    }

    async fn clear_cache(&self) {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn sign_out(&self) -> OpResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.forget_authority();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDiscovery {
    failing: bool,
    calls: AtomicUsize,
    capabilities: Mutex<Vec<String>>,
}

impl FakeDiscovery {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn capabilities(&self) -> Vec<String> {
        self.capabilities.lock().clone()
    }
}

#[async_trait]
impl ServiceDiscovery for FakeDiscovery {
    async fn discover_capability(&self, capability: &str) -> OpResult<CapabilityDiscoveryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.capabilities.lock().push(capability.to_string());

        if self.failing {
            return Err(OpError::transient("Discovery", "503 Service Unavailable"));
        }
        Ok(CapabilityDiscoveryResult {
            capability: capability.to_string(),
            service_endpoint_uri: format!("https://fake.example/{}", capability.to_lowercase()),
            service_resource_id: "https://fake.example/".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Transient,
    Unauthorized,
}

impl Fault {
    fn error(&self, operation: &str) -> OpError {
        match self {
            Fault::Transient => OpError::transient("Fake", format!("{} failed", operation)),
            Fault::Unauthorized => OpError::unauthorized("Fake", format!("{} denied", operation)),
        }
    }
}

struct StoredMessage {
    message: Message,
    folder: String,
    attachments: Vec<Attachment>,
    /// Lookups that will still miss this message
    hidden_polls: u32,
}

struct StoredItem {
    item: DriveItem,
    parent: String,
    content: Vec<u8>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    events: BTreeMap<String, Event>,
    contacts: BTreeMap<String, Contact>,
    messages: Vec<StoredMessage>,
    folders: BTreeMap<String, MailFolder>,
    items: BTreeMap<String, StoredItem>,
    delivery_delay: u32,
}

impl State {
    fn seeded() -> Self {
        let mut state = State::default();
        for name in WELL_KNOWN_FOLDERS {
            state.folders.insert(
                name.to_string(),
                MailFolder {
                    id: name.to_string(),
                    display_name: name.to_string(),
                    parent_folder_id: None,
                },
            );
        }
        state.items.insert(
            SEED_FOLDER_ID.to_string(),
            StoredItem {
                item: DriveItem {
                    id: SEED_FOLDER_ID.to_string(),
                    ..DriveItem::folder("Documents")
                },
                parent: "root".to_string(),
                content: Vec::new(),
            },
        );
        state
    }

    fn next_id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", kind, self.next_id)
    }

    fn message_mut(&mut self, message_id: &str) -> OpResult<&mut StoredMessage> {
        self.messages
            .iter_mut()
            .find(|stored| stored.message.id == message_id)
            .ok_or_else(|| OpError::not_found(format!("message {}", message_id)))
    }

    fn require_mail_folder(&self, folder_id: &str) -> OpResult<()> {
        if self.folders.contains_key(folder_id) {
            Ok(())
        } else {
            Err(OpError::not_found(format!("mail folder {}", folder_id)))
        }
    }

    fn require_drive_folder(&self, folder_id: &str) -> OpResult<()> {
        match self.items.get(folder_id) {
            _ if folder_id == "root" => Ok(()),
            Some(stored) if stored.item.is_folder() => Ok(()),
            _ => Err(OpError::not_found(format!("folder {}", folder_id))),
        }
    }

    /// File a sent message under Sent Items and drop a received copy in the
    /// inbox
    fn deliver(&mut self, mut sent: Message, attachments: Vec<Attachment>) {
        sent.date_time_received = Some(Utc::now());
        let received = Message {
            id: self.next_id("message"),
            ..sent.clone()
        };
        let hidden_polls = self.delivery_delay;

        self.messages.push(StoredMessage {
            message: sent,
            folder: "SentItems".to_string(),
            attachments: attachments.clone(),
            hidden_polls: 0,
        });
        self.messages.push(StoredMessage {
            message: received,
            folder: "Inbox".to_string(),
            attachments,
            hidden_polls,
        });
    }

    /// Send a stored draft
    fn send_draft(&mut self, draft_id: &str) -> OpResult<()> {
        let index = self
            .messages
            .iter()
            .position(|stored| stored.message.id == draft_id && stored.folder == "Drafts")
            .ok_or_else(|| OpError::not_found(format!("draft {}", draft_id)))?;

        let draft = self.messages.remove(index);
        self.deliver(draft.message, draft.attachments);
        Ok(())
    }

    /// Send a reply or forward of a stored message, prefixing its subject
    fn respond(&mut self, message_id: &str, prefix: &str, comment: &str, recipient: &str) -> OpResult<()> {
        let original = self.message_mut(message_id)?.message.clone();
        let response = Message {
            id: self.next_id("message"),
            subject: Some(format!("{}{}", prefix, original.subject.unwrap_or_default())),
            body: Some(ItemBody::html(comment)),
            to_recipients: vec![Recipient::to(recipient)],
            ..Message::default()
        };
        self.deliver(response, Vec::new());
        Ok(())
    }
}

/// One in-memory tenant behind every operation trait
pub struct FakeOffice {
    state: Mutex<State>,
    calls: Mutex<Vec<&'static str>>,
    faults: Mutex<HashMap<&'static str, Fault>>,
    auth: Arc<FakeTokenProvider>,
    discovery: Arc<FakeDiscovery>,
}

impl FakeOffice {
    pub fn new() -> Arc<Self> {
        Self::with_auth(FakeTokenProvider::signed_in())
    }

    pub fn cancelling_sign_in() -> Arc<Self> {
        Self::with_auth(FakeTokenProvider::cancelling())
    }

    fn with_auth(auth: FakeTokenProvider) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::seeded()),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(HashMap::new()),
            auth: Arc::new(auth),
            discovery: Arc::new(FakeDiscovery::default()),
        })
    }

    /// Story context wired to this fake, polling every millisecond
    pub fn context(self: &Arc<Self>) -> StoryContext {
        let session = Arc::new(Session::new(
            self.auth.clone(),
            self.discovery.clone(),
            Config::default().directory,
            reqwest::Client::new(),
        ));

        StoryContext {
            session,
            calendar: self.clone(),
            contacts: self.clone(),
            mail: self.clone(),
            files: self.clone(),
            directory: self.clone(),
            identifiers: StoryIdentifiers::generate(),
            poll_policy: PollPolicy {
                interval: Duration::from_millis(1),
                ..PollPolicy::default()
            },
            cancel: CancelSignal::never(),
            timezone: chrono_tz::UTC,
            recipient: None,
        }
    }

    pub fn inject(&self, operation: &'static str, fault: Fault) {
        self.faults.lock().insert(operation, fault);
    }

    pub fn was_called(&self, operation: &str) -> bool {
        self.call_count(operation) > 0
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().iter().filter(|call| **call == operation).count()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<&'static str> {
        self.calls
            .lock()
            .iter()
            .copied()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    /// Lookups that miss each newly delivered message
    pub fn set_delivery_delay(&self, polls: u32) {
        self.state.lock().delivery_delay = polls;
    }

    /// Put a message straight into the inbox and return its id
    pub fn deliver(&self, subject: &str, received_at: DateTime<Utc>) -> String {
        let mut state = self.state.lock();
        let id = state.next_id("message");
        state.messages.push(StoredMessage {
            message: Message {
                id: id.clone(),
                subject: Some(subject.to_string()),
                date_time_received: Some(received_at),
                ..Message::default()
            },
            folder: "Inbox".to_string(),
            attachments: Vec::new(),
            hidden_polls: 0,
        });
        id
    }

    /// Subjects of the messages currently filed in `folder`
    pub fn subjects_in(&self, folder: &str) -> Vec<String> {
        self.state
            .lock()
            .messages
            .iter()
            .filter(|stored| stored.folder == folder)
            .filter_map(|stored| stored.message.subject.clone())
            .collect()
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery.calls()
    }

    /// Entities a story created and did not remove
    pub fn leftovers(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut leftovers = Vec::new();
        leftovers.extend(
            state
                .messages
                .iter()
                .map(|stored| format!("{} ({})", stored.message.id, stored.folder)),
        );
        leftovers.extend(state.events.keys().cloned());
        leftovers.extend(state.contacts.keys().cloned());
        leftovers.extend(
            state
                .folders
                .keys()
                .filter(|id| !WELL_KNOWN_FOLDERS.contains(&id.as_str()))
                .cloned(),
        );
        leftovers.extend(state.items.keys().filter(|id| *id != SEED_FOLDER_ID).cloned());
        leftovers
    }

    fn enter(&self, operation: &'static str) -> OpResult<()> {
        self.calls.lock().push(operation);
        match self.faults.lock().get(operation) {
            Some(fault) => Err(fault.error(operation)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarOperations for FakeOffice {
    async fn list_events(&self) -> OpResult<Vec<Event>> {
        self.enter("list_events")?;
        Ok(self.state.lock().events.values().cloned().collect())
    }

    async fn add_sample_event(&self) -> OpResult<String> {
        self.enter("add_sample_event")?;
        let mut state = self.state.lock();
        let id = state.next_id("event");
        state.events.insert(
            id.clone(),
            Event {
                id: id.clone(),
                ..sample_event()
            },
        );
        Ok(id)
    }

    async fn add_event(&self, draft: &EventDraft) -> OpResult<String> {
        self.enter("add_event")?;
        let mut state = self.state.lock();
        let id = state.next_id("event");
        state.events.insert(
            id.clone(),
            Event {
                id: id.clone(),
                subject: Some(draft.subject.clone()),
                body: Some(ItemBody::text(&draft.body)),
                location: Some(Location {
                    display_name: draft.location.clone(),
                }),
                start: Some(draft.start),
                end: Some(draft.end),
                attendees: parse_attendees(&draft.attendees),
            },
        );
        Ok(id)
    }

    async fn get_event(&self, event_id: &str) -> OpResult<Event> {
        self.enter("get_event")?;
        self.state
            .lock()
            .events
            .get(event_id)
            .cloned()
            .ok_or_else(|| OpError::not_found(format!("event {}", event_id)))
    }

    async fn update_event(&self, event_id: &str, draft: &EventDraft) -> OpResult<Event> {
        self.enter("update_event")?;
        let mut state = self.state.lock();
        let event = state
            .events
            .get_mut(event_id)
            .ok_or_else(|| OpError::not_found(format!("event {}", event_id)))?;

        event.subject = Some(draft.subject.clone());
        event.body = Some(ItemBody::text(&draft.body));
        event.location = Some(Location {
            display_name: draft.location.clone(),
        });
        event.attendees = parse_attendees(&draft.attendees);
        Ok(event.clone())
    }

    async fn delete_event(&self, event_id: &str) -> OpResult<Event> {
        self.enter("delete_event")?;
        self.state
            .lock()
            .events
            .remove(event_id)
            .ok_or_else(|| OpError::not_found(format!("event {}", event_id)))
    }
}

#[async_trait]
impl ContactsOperations for FakeOffice {
    async fn list_contacts(&self) -> OpResult<Vec<Contact>> {
        self.enter("list_contacts")?;
        Ok(self.state.lock().contacts.values().cloned().collect())
    }

    async fn get_contact(&self, contact_id: &str) -> OpResult<Contact> {
        self.enter("get_contact")?;
        self.state
            .lock()
            .contacts
            .get(contact_id)
            .cloned()
            .ok_or_else(|| OpError::not_found(format!("contact {}", contact_id)))
    }

    async fn add_contact(&self, draft: &ContactDraft) -> OpResult<Contact> {
        self.enter("add_contact")?;
        let mut state = self.state.lock();
        let contact = Contact {
            id: state.next_id("contact"),
            ..draft.to_contact()
        };
        state.contacts.insert(contact.id.clone(), contact.clone());
        Ok(contact)
    }

    async fn update_contact(&self, contact_id: &str, draft: &ContactDraft) -> OpResult<Contact> {
        self.enter("update_contact")?;
        let mut state = self.state.lock();
        let existing = state
            .contacts
            .remove(contact_id)
            .ok_or_else(|| OpError::not_found(format!("contact {}", contact_id)))?;

        let updated = draft.apply_to(existing);
        state.contacts.insert(contact_id.to_string(), updated.clone());
        Ok(updated)
    }

    async fn delete_contact(&self, contact_id: &str) -> OpResult<()> {
        self.enter("delete_contact")?;
        self.state
            .lock()
            .contacts
            .remove(contact_id)
            .map(|_| ())
            .ok_or_else(|| OpError::not_found(format!("contact {}", contact_id)))
    }
}

#[async_trait]
impl MailOperations for FakeOffice {
    async fn list_inbox_messages(&self) -> OpResult<Vec<Message>> {
        self.enter("list_inbox_messages")?;
        Ok(self
            .state
            .lock()
            .messages
            .iter()
            .filter(|stored| stored.folder == "Inbox")
            .map(|stored| stored.message.clone())
            .collect())
    }

    async fn list_messages(&self) -> OpResult<Vec<Message>> {
        self.enter("list_messages")?;
        Ok(self.state.lock().messages.iter().map(|stored| stored.message.clone()).collect())
    }

    async fn find_message(
        &self,
        folder: &str,
        subject: &str,
        received_after: DateTime<Utc>,
    ) -> OpResult<Option<Message>> {
        self.enter("find_message")?;
        let mut state = self.state.lock();

        // newest first, as the service orders messages
        let mut found = None;
        for stored in state.messages.iter_mut().rev() {
            let matches = stored.folder == folder
                && stored.message.subject.as_deref() == Some(subject)
                && stored.message.date_time_received.is_some_and(|at| at > received_after);
            if !matches {
                continue;
            }
            if stored.hidden_polls > 0 {
                stored.hidden_polls -= 1;
                continue;
            }
            if found.is_none() {
                found = Some(stored.message.clone());
            }
        }
        Ok(found)
    }

    async fn send_message(&self, subject: &str, body: &str, recipient: &str) -> OpResult<()> {
        self.enter("send_message")?;
        let mut state = self.state.lock();
        let message = Message {
            id: state.next_id("message"),
            subject: Some(subject.to_string()),
            body: Some(ItemBody::html(body)),
            to_recipients: vec![Recipient::to(recipient)],
            ..Message::default()
        };
        state.deliver(message, Vec::new());
        Ok(())
    }

    async fn create_draft(&self, subject: &str, body: &str, recipient: &str) -> OpResult<String> {
        self.enter("create_draft")?;
        Ok(save_draft(&mut self.state.lock(), subject, body, recipient))
    }

    async fn create_draft_and_send(&self, subject: &str, body: &str, recipient: &str) -> OpResult<String> {
        self.enter("create_draft_and_send")?;
        let mut state = self.state.lock();
        let draft_id = save_draft(&mut state, subject, body, recipient);
        state.send_draft(&draft_id)?;
        Ok(draft_id)
    }

    async fn update_message(&self, message_id: &str, content: &str) -> OpResult<()> {
        self.enter("update_message")?;
        let mut state = self.state.lock();
        state.message_mut(message_id)?.message.body = Some(ItemBody::html(content));
        Ok(())
    }

    async fn reply(&self, message_id: &str, comment: &str) -> OpResult<()> {
        self.enter("reply")?;
        self.state.lock().respond(message_id, "RE: ", comment, FAKE_USER)
    }

    async fn reply_all(&self, message_id: &str, comment: &str) -> OpResult<()> {
        self.enter("reply_all")?;
        self.state.lock().respond(message_id, "RE: ", comment, FAKE_USER)
    }

    async fn forward(&self, message_id: &str, comment: &str, recipient: &str) -> OpResult<()> {
        self.enter("forward")?;
        self.state.lock().respond(message_id, "FW: ", comment, recipient)
    }

    async fn move_message(&self, message_id: &str, destination_folder: &str) -> OpResult<Message> {
        self.enter("move_message")?;
        let mut state = self.state.lock();
        state.require_mail_folder(destination_folder)?;
        let new_id = state.next_id("message");

        let stored = state.message_mut(message_id)?;
        stored.message.id = new_id;
        stored.folder = destination_folder.to_string();
        Ok(stored.message.clone())
    }

    async fn copy_message(&self, message_id: &str, destination_folder: &str) -> OpResult<Message> {
        self.enter("copy_message")?;
        let mut state = self.state.lock();
        state.require_mail_folder(destination_folder)?;
        let new_id = state.next_id("message");

        let original = state.message_mut(message_id)?;
        let copy = StoredMessage {
            message: Message {
                id: new_id,
                ..original.message.clone()
            },
            folder: destination_folder.to_string(),
            attachments: original.attachments.clone(),
            hidden_polls: 0,
        };
        let message = copy.message.clone();
        state.messages.push(copy);
        Ok(message)
    }

    async fn add_file_attachment(&self, message_id: &str, content: &[u8]) -> OpResult<()> {
        self.enter("add_file_attachment")?;
        let mut state = self.state.lock();
        state
            .message_mut(message_id)?
            .attachments
            .push(Attachment::file("fileAttachment", content));
        state.send_draft(message_id)
    }

    async fn list_attachments(&self, message_id: &str) -> OpResult<Vec<Attachment>> {
        self.enter("list_attachments")?;
        let mut state = self.state.lock();
        Ok(state.message_mut(message_id)?.attachments.clone())
    }

    async fn message_web_link(&self, message_id: &str) -> OpResult<String> {
        self.enter("message_web_link")?;
        let mut state = self.state.lock();
        state
            .message_mut(message_id)?
            .message
            .web_link
            .clone()
            .ok_or_else(|| OpError::not_found(format!("web link for message {}", message_id)))
    }

    async fn delete_message(&self, message_id: &str) -> OpResult<()> {
        self.enter("delete_message")?;
        let mut state = self.state.lock();
        let before = state.messages.len();
        state.messages.retain(|stored| stored.message.id != message_id);

        if state.messages.len() == before {
            return Err(OpError::not_found(format!("message {}", message_id)));
        }
        Ok(())
    }

    async fn list_mail_folders(&self) -> OpResult<Vec<MailFolder>> {
        self.enter("list_mail_folders")?;
        Ok(self.state.lock().folders.values().cloned().collect())
    }

    async fn create_mail_folder(&self, parent_folder: &str, name: &str) -> OpResult<String> {
        self.enter("create_mail_folder")?;
        let mut state = self.state.lock();
        state.require_mail_folder(parent_folder)?;

        let id = state.next_id("folder");
        state.folders.insert(
            id.clone(),
            MailFolder {
                id: id.clone(),
                display_name: name.to_string(),
                parent_folder_id: Some(parent_folder.to_string()),
            },
        );
        Ok(id)
    }

    async fn rename_mail_folder(&self, folder_id: &str, new_name: &str) -> OpResult<MailFolder> {
        self.enter("rename_mail_folder")?;
        let mut state = self.state.lock();
        let folder = state
            .folders
            .get_mut(folder_id)
            .ok_or_else(|| OpError::not_found(format!("mail folder {}", folder_id)))?;

        folder.display_name = new_name.to_string();
        Ok(folder.clone())
    }

    async fn move_mail_folder(&self, folder_id: &str, destination_folder: &str) -> OpResult<MailFolder> {
        self.enter("move_mail_folder")?;
        let mut state = self.state.lock();
        state.require_mail_folder(destination_folder)?;
        let folder = state
            .folders
            .get_mut(folder_id)
            .ok_or_else(|| OpError::not_found(format!("mail folder {}", folder_id)))?;

        folder.parent_folder_id = Some(destination_folder.to_string());
        Ok(folder.clone())
    }

    async fn copy_mail_folder(&self, folder_id: &str, destination_folder: &str) -> OpResult<String> {
        self.enter("copy_mail_folder")?;
        let mut state = self.state.lock();
        state.require_mail_folder(destination_folder)?;
        let original = state
            .folders
            .get(folder_id)
            .cloned()
            .ok_or_else(|| OpError::not_found(format!("mail folder {}", folder_id)))?;

        let id = state.next_id("folder");
        state.folders.insert(
            id.clone(),
            MailFolder {
                id: id.clone(),
                parent_folder_id: Some(destination_folder.to_string()),
                ..original
            },
        );
        Ok(id)
    }

    async fn delete_mail_folder(&self, folder_id: &str) -> OpResult<()> {
        self.enter("delete_mail_folder")?;
        self.state
            .lock()
            .folders
            .remove(folder_id)
            .map(|_| ())
            .ok_or_else(|| OpError::not_found(format!("mail folder {}", folder_id)))
    }
}

fn save_draft(state: &mut State, subject: &str, body: &str, recipient: &str) -> String {
    let id = state.next_id("message");
    state.messages.push(StoredMessage {
        message: Message {
            id: id.clone(),
            subject: Some(subject.to_string()),
            body: Some(ItemBody::html(body)),
            to_recipients: vec![Recipient::to(recipient)],
            importance: Some("High".to_string()),
            web_link: Some(format!("https://outlook.fake.example/owa/?ItemID={}", id)),
            ..Message::default()
        },
        folder: "Drafts".to_string(),
        attachments: Vec::new(),
        hidden_polls: 0,
    });
    id
}

#[async_trait]
impl FilesOperations for FakeOffice {
    async fn create_file(&self, name: &str, content: Vec<u8>) -> OpResult<String> {
        self.enter("create_file")?;
        let mut state = self.state.lock();
        let id = state.next_id("file");
        state.items.insert(
            id.clone(),
            StoredItem {
                item: DriveItem {
                    id: id.clone(),
                    size: Some(content.len() as i64),
                    ..DriveItem::file(name)
                },
                parent: "root".to_string(),
                content,
            },
        );
        Ok(id)
    }

    async fn update_file_content(&self, file_id: &str, content: Vec<u8>) -> OpResult<()> {
        self.enter("update_file_content")?;
        let mut state = self.state.lock();
        let stored = state
            .items
            .get_mut(file_id)
            .ok_or_else(|| OpError::not_found(format!("file {}", file_id)))?;

        stored.item.size = Some(content.len() as i64);
        stored.content = content;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> OpResult<Vec<u8>> {
        self.enter("download_file")?;
        self.state
            .lock()
            .items
            .get(file_id)
            .map(|stored| stored.content.clone())
            .ok_or_else(|| OpError::not_found(format!("file {}", file_id)))
    }

    async fn delete_file(&self, file_id: &str) -> OpResult<()> {
        self.enter("delete_file")?;
        self.state
            .lock()
            .items
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| OpError::not_found(format!("file {}", file_id)))
    }

    async fn copy_file(&self, file_id: &str, destination_folder_id: &str) -> OpResult<String> {
        self.enter("copy_file")?;
        let mut state = self.state.lock();
        state.require_drive_folder(destination_folder_id)?;
        let (item, content) = state
            .items
            .get(file_id)
            .map(|stored| (stored.item.clone(), stored.content.clone()))
            .ok_or_else(|| OpError::not_found(format!("file {}", file_id)))?;

        let id = state.next_id("file");
        state.items.insert(
            id.clone(),
            StoredItem {
                item: DriveItem { id: id.clone(), ..item },
                parent: destination_folder_id.to_string(),
                content,
            },
        );
        Ok(id)
    }

    async fn rename_file(&self, file_id: &str, new_name: &str) -> OpResult<String> {
        self.enter("rename_file")?;
        let mut state = self.state.lock();
        let stored = state
            .items
            .get_mut(file_id)
            .ok_or_else(|| OpError::not_found(format!("file {}", file_id)))?;

        stored.item.name = new_name.to_string();
        Ok(stored.item.name.clone())
    }

    async fn list_folder_children(&self, folder_id: &str) -> OpResult<Vec<DriveItem>> {
        self.enter("list_folder_children")?;
        let state = self.state.lock();
        state.require_drive_folder(folder_id)?;

        Ok(state
            .items
            .values()
            .filter(|stored| stored.parent == folder_id)
            .map(|stored| stored.item.clone())
            .collect())
    }

    async fn create_folder(&self, name: &str, parent_folder_id: &str) -> OpResult<DriveItem> {
        self.enter("create_folder")?;
        let mut state = self.state.lock();
        state.require_drive_folder(parent_folder_id)?;

        let id = state.next_id("folder");
        let folder = DriveItem {
            id: id.clone(),
            ..DriveItem::folder(name)
        };
        state.items.insert(
            id,
            StoredItem {
                item: folder.clone(),
                parent: parent_folder_id.to_string(),
                content: Vec::new(),
            },
        );
        Ok(folder)
    }

    async fn delete_folder(&self, folder_id: &str) -> OpResult<()> {
        self.enter("delete_folder")?;
        let mut state = self.state.lock();
        state
            .items
            .remove(folder_id)
            .ok_or_else(|| OpError::not_found(format!("folder {}", folder_id)))?;

        state.items.retain(|_, stored| stored.parent != folder_id);
        Ok(())
    }
}

#[async_trait]
impl DirectoryOperations for FakeOffice {
    async fn list_users(&self) -> OpResult<Vec<User>> {
        self.enter("list_users")?;
        Ok(vec![User {
            object_id: "user-1".to_string(),
            display_name: Some("Fake User".to_string()),
            user_principal_name: Some(FAKE_USER.to_string()),
            mail: Some(FAKE_USER.to_string()),
        }])
    }

    async fn tenant_details(&self) -> OpResult<TenantDetail> {
        self.enter("tenant_details")?;
        Ok(TenantDetail {
            object_id: FAKE_TENANT.to_string(),
            display_name: Some("Fake Tenant".to_string()),
        })
    }

    async fn list_groups(&self) -> OpResult<Vec<Group>> {
        self.enter("list_groups")?;
        Ok(Vec::new())
    }
}
