//! Scenario catalogue. Each story arranges data on a live tenant, exercises
//! one operation, checks the result and removes what it created.

use chrono_tz::Tz;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{ErrorCategory, OpError, OpResult};
use crate::operations::{
    CalendarOperations, ContactsOperations, DirectoryOperations, FilesOperations, MailOperations,
};
use crate::poll::{CancelSignal, PollPolicy};
use crate::session::{ServiceDomain, Session};

pub mod calendar;
pub mod contacts;
pub mod directory;
pub mod files;
pub mod mail;

#[cfg(test)]
pub mod fakes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryGroup {
    UsersAndGroups,
    Contacts,
    Calendar,
    Email,
    MailFolder,
    Files,
}

impl StoryGroup {
    pub const ALL: [StoryGroup; 6] = [
        StoryGroup::UsersAndGroups,
        StoryGroup::Contacts,
        StoryGroup::Calendar,
        StoryGroup::Email,
        StoryGroup::MailFolder,
        StoryGroup::Files,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StoryGroup::UsersAndGroups => "Users & Groups",
            StoryGroup::Contacts => "Contacts",
            StoryGroup::Calendar => "Calendar",
            StoryGroup::Email => "Email",
            StoryGroup::MailFolder => "Mail folder",
            StoryGroup::Files => "Files",
        }
    }

    /// Service whose client handle the group's stories use
    pub fn domain(&self) -> ServiceDomain {
        match self {
            StoryGroup::UsersAndGroups => ServiceDomain::Directory,
            StoryGroup::Contacts => ServiceDomain::Contacts,
            StoryGroup::Calendar => ServiceDomain::Calendar,
            StoryGroup::Email | StoryGroup::MailFolder => ServiceDomain::Mail,
            StoryGroup::Files => ServiceDomain::Files,
        }
    }

    /// Case-insensitive lookup by display name
    pub fn find(name: &str) -> Option<StoryGroup> {
        Self::ALL
            .into_iter()
            .find(|group| group.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn stories(&self) -> impl Iterator<Item = StoryId> + '_ {
        StoryId::ALL.into_iter().filter(move |story| story.group() == *self)
    }
}

impl fmt::Display for StoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryId {
    DirectoryClient,
    ReadUsers,
    TenantDetails,
    ReadGroups,

    ContactsClient,
    ReadContacts,
    GetContact,
    CreateContact,
    DeleteContact,
    UpdateContact,

    CalendarClient,
    ReadEvents,
    CreateEvent,
    CreateEventWithArgs,
    UpdateEvent,
    DeleteEvent,

    MailClient,
    ReadInbox,
    ReadMessages,
    SendMail,
    Reply,
    ReplyAll,
    Forward,
    CreateDraft,
    UpdateMessage,
    DeleteMessage,
    MoveMessage,
    CopyMessage,
    AddAttachment,
    ReadAttachments,
    WebLink,

    ReadMailFolders,
    CreateMailFolder,
    RenameMailFolder,
    MoveMailFolder,
    CopyMailFolder,
    DeleteMailFolder,

    FilesClient,
    ReadFolders,
    CreateFolder,
    DeleteFolder,
    CreateFile,
    UpdateFileContent,
    DeleteFile,
    DownloadFile,
    CopyFile,
    RenameFile,
}

impl StoryId {
    /// Every story in display order
    pub const ALL: [StoryId; 47] = [
        StoryId::DirectoryClient,
        StoryId::ReadUsers,
        StoryId::TenantDetails,
        StoryId::ReadGroups,
        StoryId::ContactsClient,
        StoryId::ReadContacts,
        StoryId::GetContact,
        StoryId::CreateContact,
        StoryId::DeleteContact,
        StoryId::UpdateContact,
        StoryId::CalendarClient,
        StoryId::ReadEvents,
        StoryId::CreateEvent,
        StoryId::CreateEventWithArgs,
        StoryId::UpdateEvent,
        StoryId::DeleteEvent,
        StoryId::MailClient,
        StoryId::ReadInbox,
        StoryId::ReadMessages,
        StoryId::SendMail,
        StoryId::Reply,
        StoryId::ReplyAll,
        StoryId::Forward,
        StoryId::CreateDraft,
        StoryId::UpdateMessage,
        StoryId::DeleteMessage,
        StoryId::MoveMessage,
        StoryId::CopyMessage,
        StoryId::AddAttachment,
        StoryId::ReadAttachments,
        StoryId::WebLink,
        StoryId::ReadMailFolders,
        StoryId::CreateMailFolder,
        StoryId::RenameMailFolder,
        StoryId::MoveMailFolder,
        StoryId::CopyMailFolder,
        StoryId::DeleteMailFolder,
        StoryId::FilesClient,
        StoryId::ReadFolders,
        StoryId::CreateFolder,
        StoryId::DeleteFolder,
        StoryId::CreateFile,
        StoryId::UpdateFileContent,
        StoryId::DeleteFile,
        StoryId::DownloadFile,
        StoryId::CopyFile,
        StoryId::RenameFile,
    ];

    pub fn group(&self) -> StoryGroup {
        use StoryId::*;
        match self {
            DirectoryClient | ReadUsers | TenantDetails | ReadGroups => StoryGroup::UsersAndGroups,
            ContactsClient | ReadContacts | GetContact | CreateContact | DeleteContact | UpdateContact => {
                StoryGroup::Contacts
            }
            CalendarClient | ReadEvents | CreateEvent | CreateEventWithArgs | UpdateEvent | DeleteEvent => {
                StoryGroup::Calendar
            }
            MailClient | ReadInbox | ReadMessages | SendMail | Reply | ReplyAll | Forward | CreateDraft
            | UpdateMessage | DeleteMessage | MoveMessage | CopyMessage | AddAttachment | ReadAttachments
            | WebLink => StoryGroup::Email,
            ReadMailFolders | CreateMailFolder | RenameMailFolder | MoveMailFolder | CopyMailFolder
            | DeleteMailFolder => StoryGroup::MailFolder,
            FilesClient | ReadFolders | CreateFolder | DeleteFolder | CreateFile | UpdateFileContent
            | DeleteFile | DownloadFile | CopyFile | RenameFile => StoryGroup::Files,
        }
    }

    pub fn title(&self) -> &'static str {
        use StoryId::*;
        match self {
            DirectoryClient | ContactsClient | CalendarClient | MailClient | FilesClient => "Client",
            ReadUsers => "Read Users",
            TenantDetails => "Tenant Details",
            ReadGroups => "Read Groups",
            ReadContacts | ReadEvents => "Read",
            GetContact => "Get contact",
            CreateContact | CreateEvent | CreateMailFolder => "Create",
            DeleteContact | DeleteEvent | DeleteMailFolder => "Delete",
            UpdateContact | UpdateEvent => "Update",
            CreateEventWithArgs => "Create with args",
            ReadInbox => "Read Inbox",
            ReadMessages => "Read messages",
            SendMail => "SendMail",
            Reply => "Reply",
            ReplyAll => "Reply All",
            Forward => "Forward",
            CreateDraft => "Create draft",
            UpdateMessage => "Update",
            DeleteMessage => "Delete",
            MoveMessage | MoveMailFolder => "Move",
            CopyMessage | CopyMailFolder => "Copy",
            AddAttachment => "Add attachment",
            ReadAttachments => "Read attachments",
            WebLink => "Web link",
            ReadMailFolders => "Read Folders",
            RenameMailFolder => "Rename",
            ReadFolders => "Read folders",
            CreateFolder => "Create folder",
            DeleteFolder => "Delete folder",
            CreateFile => "Create file",
            UpdateFileContent => "Update content",
            DeleteFile => "Delete file",
            DownloadFile => "Download",
            CopyFile => "Copy file",
            RenameFile => "Rename file",
        }
    }

    /// "Group/Title", unique across the catalogue
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.group().name(), self.title())
    }

    /// Case-insensitive lookup by "Group/Title"
    pub fn find(full_name: &str) -> Option<StoryId> {
        let (group, title) = full_name.split_once('/')?;
        let group = StoryGroup::find(group)?;
        let found = group
            .stories()
            .find(|story| story.title().eq_ignore_ascii_case(title.trim()));
        found
    }

    /// Run the story body, release everything it registered and reduce the
    /// outcome to a verdict.
    pub async fn run(self, ctx: &StoryContext) -> bool {
        let mut scope = CleanupScope::new();
        let result = self.execute(ctx, &mut scope).await;
        scope.release(ctx).await;

        match result {
            Ok(passed) => passed,
            Err(OpError::SignInCancelled) => {
                info!("{}: sign-in cancelled", self.full_name());
                false
            }
            Err(e) => {
                if e.category() == ErrorCategory::Authentication {
                    // a rejected token may belong to a stale handle
                    ctx.session.invalidate(self.group().domain()).await;
                }
                if e.is_retryable() {
                    warn!("{}: {} (transient, may pass on a rerun)", self.full_name(), e);
                } else {
                    warn!("{}: {}", self.full_name(), e);
                }
                false
            }
        }
    }

    async fn execute(self, ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
        use StoryId::*;
        match self {
            DirectoryClient => directory::client(ctx).await,
            ReadUsers => directory::read_users(ctx).await,
            TenantDetails => directory::tenant_details(ctx).await,
            ReadGroups => directory::read_groups(ctx).await,

            ContactsClient => contacts::client(ctx).await,
            ReadContacts => contacts::read(ctx).await,
            GetContact => contacts::get_contact(ctx, scope).await,
            CreateContact => contacts::create(ctx, scope).await,
            DeleteContact => contacts::delete(ctx, scope).await,
            UpdateContact => contacts::update(ctx, scope).await,

            CalendarClient => calendar::client(ctx).await,
            ReadEvents => calendar::read(ctx).await,
            CreateEvent => calendar::create(ctx, scope).await,
            CreateEventWithArgs => calendar::create_with_args(ctx, scope).await,
            UpdateEvent => calendar::update(ctx, scope).await,
            DeleteEvent => calendar::delete(ctx, scope).await,

            MailClient => mail::client(ctx).await,
            ReadInbox => mail::read_inbox(ctx).await,
            ReadMessages => mail::read_messages(ctx).await,
            SendMail => mail::send(ctx, scope).await,
            Reply => mail::reply(ctx, scope).await,
            ReplyAll => mail::reply_all(ctx, scope).await,
            Forward => mail::forward(ctx, scope).await,
            CreateDraft => mail::create_draft(ctx, scope).await,
            UpdateMessage => mail::update(ctx, scope).await,
            DeleteMessage => mail::delete(ctx, scope).await,
            MoveMessage => mail::move_message(ctx, scope).await,
            CopyMessage => mail::copy_message(ctx, scope).await,
            AddAttachment => mail::add_attachment(ctx, scope).await,
            ReadAttachments => mail::read_attachments(ctx, scope).await,
            WebLink => mail::web_link(ctx, scope).await,

            ReadMailFolders => mail::read_folders(ctx).await,
            CreateMailFolder => mail::create_folder(ctx, scope).await,
            RenameMailFolder => mail::rename_folder(ctx, scope).await,
            MoveMailFolder => mail::move_folder(ctx, scope).await,
            CopyMailFolder => mail::copy_folder(ctx, scope).await,
            DeleteMailFolder => mail::delete_folder(ctx, scope).await,

            FilesClient => files::client(ctx).await,
            ReadFolders => files::read_folders(ctx).await,
            CreateFolder => files::create_folder(ctx, scope).await,
            DeleteFolder => files::delete_folder(ctx, scope).await,
            CreateFile => files::create_file(ctx, scope).await,
            UpdateFileContent => files::update_content(ctx, scope).await,
            DeleteFile => files::delete_file(ctx, scope).await,
            DownloadFile => files::download(ctx, scope).await,
            CopyFile => files::copy_file(ctx, scope).await,
            RenameFile => files::rename_file(ctx, scope).await,
        }
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group().name(), self.title())
    }
}

/// Markers stamped into the data each group creates, one per process
#[derive(Debug, Clone)]
pub struct StoryIdentifiers {
    pub calendar: String,
    pub contacts: String,
    pub mail: String,
    pub files: String,
}

impl StoryIdentifiers {
    pub fn generate() -> Self {
        Self {
            calendar: Uuid::new_v4().to_string(),
            contacts: Uuid::new_v4().to_string(),
            mail: Uuid::new_v4().to_string(),
            files: Uuid::new_v4().to_string(),
        }
    }
}

/// Everything a story needs from the outside world
pub struct StoryContext {
    pub session: Arc<Session>,
    pub calendar: Arc<dyn CalendarOperations>,
    pub contacts: Arc<dyn ContactsOperations>,
    pub mail: Arc<dyn MailOperations>,
    pub files: Arc<dyn FilesOperations>,
    pub directory: Arc<dyn DirectoryOperations>,
    pub identifiers: StoryIdentifiers,
    pub poll_policy: PollPolicy,
    pub cancel: CancelSignal,
    pub timezone: Tz,
    /// Overrides the signed-in user as mail recipient
    pub recipient: Option<String>,
}

impl StoryContext {
    pub fn recipient(&self) -> OpResult<String> {
        self.recipient
            .clone()
            .or_else(|| self.session.auth().user_email())
            .filter(|address| !address.is_empty())
            .ok_or_else(|| OpError::config("No mail recipient: sign in or set general.recipient_email"))
    }
}

/// Remote entity a story created and must remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Event(String),
    Contact(String),
    Message(String),
    MailFolder(String),
    File(String),
    Folder(String),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Event(id) => write!(f, "event {}", id),
            Resource::Contact(id) => write!(f, "contact {}", id),
            Resource::Message(id) => write!(f, "message {}", id),
            Resource::MailFolder(id) => write!(f, "mail folder {}", id),
            Resource::File(id) => write!(f, "file {}", id),
            Resource::Folder(id) => write!(f, "folder {}", id),
        }
    }
}

/// Resources to delete once a story finishes, whatever its outcome.
#[derive(Debug, Default)]
pub struct CleanupScope {
    resources: Vec<Resource>,
}

impl CleanupScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: Resource) {
        debug!("Registered {} for cleanup", resource);
        self.resources.push(resource);
    }

    /// Forget a resource the story already removed itself
    pub fn dismiss(&mut self, resource: &Resource) {
        self.resources.retain(|registered| registered != resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Delete every registered resource, newest first. Failures are logged
    /// and never surface.
    pub async fn release(&mut self, ctx: &StoryContext) {
        while let Some(resource) = self.resources.pop() {
            match delete_resource(ctx, &resource).await {
                Ok(()) => debug!("Cleaned up {}", resource),
                Err(OpError::NotFound { .. }) => debug!("{} was already gone", resource),
                Err(e) => warn!("Could not clean up {}: {}", resource, e),
            }
        }
    }
}

async fn delete_resource(ctx: &StoryContext, resource: &Resource) -> OpResult<()> {
    match resource {
        Resource::Event(id) => ctx.calendar.delete_event(id).await.map(|_| ()),
        Resource::Contact(id) => ctx.contacts.delete_contact(id).await,
        Resource::Message(id) => ctx.mail.delete_message(id).await,
        Resource::MailFolder(id) => ctx.mail.delete_mail_folder(id).await,
        Resource::File(id) => ctx.files.delete_file(id).await,
        Resource::Folder(id) => ctx.files.delete_folder(id).await,
    }
}
