use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{segment, EmailAddress, Page};
use crate::errors::OpResult;
use crate::session::{ServiceDomain, Session};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contact {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub file_as: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub mobile_phone1: Option<String>,
    #[serde(default)]
    pub business_phones: Vec<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
}

#[derive(Debug, Clone, Default)]
pub struct ContactDraft {
    pub file_as: String,
    pub given_name: String,
    pub surname: String,
    pub job_title: String,
    /// Left untouched on the server when empty
    pub email: String,
    pub work_phone: String,
    pub mobile_phone: String,
}

impl ContactDraft {
    /// Contact body for creation. An empty email is omitted.
    pub fn to_contact(&self) -> Contact {
        let mut contact = Contact {
            file_as: Some(self.file_as.clone()),
            given_name: Some(self.given_name.clone()),
            surname: Some(self.surname.clone()),
            job_title: Some(self.job_title.clone()),
            mobile_phone1: Some(self.mobile_phone.clone()),
            business_phones: vec![self.work_phone.clone()],
            ..Contact::default()
        };
        if !self.email.is_empty() {
            contact.email_addresses.push(EmailAddress::new(&self.email));
        }
        contact
    }

    /// Overlay the draft on an existing contact. The email list is replaced
    /// only when the draft carries an email.
    pub fn apply_to(&self, mut contact: Contact) -> Contact {
        contact.file_as = Some(self.file_as.clone());
        contact.given_name = Some(self.given_name.clone());
        contact.surname = Some(self.surname.clone());
        contact.job_title = Some(self.job_title.clone());
        contact.mobile_phone1 = Some(self.mobile_phone.clone());
        if !self.email.is_empty() {
            contact.email_addresses = vec![EmailAddress {
                address: self.email.clone(),
                name: Some(self.email.clone()),
            }];
        }
        contact
    }
}

#[async_trait]
pub trait ContactsOperations: Send + Sync {
    async fn list_contacts(&self) -> OpResult<Vec<Contact>>;

    async fn get_contact(&self, contact_id: &str) -> OpResult<Contact>;

    async fn add_contact(&self, draft: &ContactDraft) -> OpResult<Contact>;

    async fn update_contact(&self, contact_id: &str, draft: &ContactDraft) -> OpResult<Contact>;

    async fn delete_contact(&self, contact_id: &str) -> OpResult<()>;
}

/// Contacts operations over Outlook REST
pub struct OutlookContacts {
    session: Arc<Session>,
}

impl OutlookContacts {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ContactsOperations for OutlookContacts {
    async fn list_contacts(&self) -> OpResult<Vec<Contact>> {
        let client = self.session.try_client(ServiceDomain::Contacts).await?;
        let page: Page<Contact> = client.get_json("me/contacts").await?;

        debug!("Got {} contacts", page.value.len());
        Ok(page.value)
    }

    async fn get_contact(&self, contact_id: &str) -> OpResult<Contact> {
        let client = self.session.try_client(ServiceDomain::Contacts).await?;
        let contact: Contact = client.get_json(&format!("me/contacts/{}", segment(contact_id))).await?;

        debug!("Got contact: {}", contact.id);
        Ok(contact)
    }

    async fn add_contact(&self, draft: &ContactDraft) -> OpResult<Contact> {
        let client = self.session.try_client(ServiceDomain::Contacts).await?;
        let created: Contact = client.post_json("me/contacts", &draft.to_contact()).await?;

        debug!("Added contact: {}", created.id);
        Ok(created)
    }

    async fn update_contact(&self, contact_id: &str, draft: &ContactDraft) -> OpResult<Contact> {
        let client = self.session.try_client(ServiceDomain::Contacts).await?;
        let path = format!("me/contacts/{}", segment(contact_id));

        let current: Contact = client.get_json(&path).await?;
        let mut changes = draft.apply_to(current);
        changes.id = String::new();

        let updated: Contact = client.patch_json(&path, &changes).await?;
        debug!("Updated contact: {}", updated.id);
        Ok(updated)
    }

    async fn delete_contact(&self, contact_id: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Contacts).await?;
        client.delete(&format!("me/contacts/{}", segment(contact_id))).await?;

        debug!("Deleted contact: {}", contact_id);
        Ok(())
    }
}
