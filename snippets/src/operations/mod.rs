pub mod calendar;
pub mod contacts;
pub mod directory;
pub mod files;
pub mod mail;

pub use calendar::{CalendarOperations, Event, EventDraft, OutlookCalendar};
pub use contacts::{Contact, ContactDraft, ContactsOperations, OutlookContacts};
pub use directory::{DirectoryOperations, GraphDirectory, Group, TenantDetail, User};
pub use files::{DriveItem, FilesOperations, MyFiles};
pub use mail::{Attachment, MailFolder, MailOperations, Message, OutlookMail};

use serde::{Deserialize, Serialize};

/// Message or event body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemBody {
    pub content_type: String,
    pub content: String,
}

impl ItemBody {
    pub fn html(content: &str) -> Self {
        Self {
            content_type: "HTML".to_string(),
            content: content.to_string(),
        }
    }

    pub fn text(content: &str) -> Self {
        Self {
            content_type: "Text".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailAddress {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EmailAddress {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

impl Recipient {
    pub fn to(address: &str) -> Self {
        Self {
            email_address: EmailAddress::new(address),
        }
    }
}

/// OData collection page; only the current page is read
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// Percent-encode an id before it goes into a URL path
pub(crate) fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}
