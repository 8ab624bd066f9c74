use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{segment, ItemBody, Page, Recipient};
use crate::errors::{OpError, OpResult};
use crate::http_utils::odata_string;
use crate::session::{ServiceDomain, Session};

const FILE_ATTACHMENT_TYPE: &str = "#Microsoft.OutlookServices.FileAttachment";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub to_recipients: Vec<Recipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<String>,
    #[serde(default, skip_serializing)]
    pub date_time_received: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub web_link: Option<String>,
}

impl Message {
    fn outgoing(subject: &str, body: &str, recipient: &str) -> Self {
        Self {
            subject: Some(subject.to_string()),
            body: Some(ItemBody::html(body)),
            to_recipients: vec![Recipient::to(recipient)],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MailFolder {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing)]
    pub parent_folder_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attachment {
    #[serde(rename = "@odata.type", default)]
    pub odata_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    /// Base64 file content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_bytes: Option<String>,
    #[serde(default)]
    pub size: i64,
}

impl Attachment {
    pub fn file(name: &str, content: &[u8]) -> Self {
        Self {
            odata_type: FILE_ATTACHMENT_TYPE.to_string(),
            id: String::new(),
            name: name.to_string(),
            content_bytes: Some(STANDARD.encode(content)),
            size: content.len() as i64,
        }
    }

    pub fn decoded_content(&self) -> OpResult<Option<Vec<u8>>> {
        self.content_bytes
            .as_deref()
            .map(|encoded| {
                STANDARD
                    .decode(encoded)
                    .map_err(|e| OpError::invalid(format!("Attachment content is not base64: {}", e)))
            })
            .transpose()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMailRequest {
    message: Message,
    save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CommentRequest<'a> {
    comment: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ForwardRequest<'a> {
    comment: &'a str,
    to_recipients: Vec<Recipient>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DestinationRequest<'a> {
    destination_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct BodyPatch {
    body: ItemBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FolderName<'a> {
    display_name: &'a str,
}

/// Mail operations. Folder ids also accept the well-known names
/// `Inbox`, `Drafts`, `SentItems` and `DeletedItems`.
#[async_trait]
pub trait MailOperations: Send + Sync {
    async fn list_inbox_messages(&self) -> OpResult<Vec<Message>>;

    async fn list_messages(&self) -> OpResult<Vec<Message>>;

    /// First message in `folder` with exactly `subject` received after
    /// `received_after`
    async fn find_message(
        &self,
        folder: &str,
        subject: &str,
        received_after: DateTime<Utc>,
    ) -> OpResult<Option<Message>>;

    /// Send directly, keeping a copy in Sent Items
    async fn send_message(&self, subject: &str, body: &str, recipient: &str) -> OpResult<()>;

    /// Save a high-importance HTML draft and return its id
    async fn create_draft(&self, subject: &str, body: &str, recipient: &str) -> OpResult<String>;

    /// Save a draft, send it and return the draft's id
    async fn create_draft_and_send(&self, subject: &str, body: &str, recipient: &str) -> OpResult<String>;

    async fn update_message(&self, message_id: &str, content: &str) -> OpResult<()>;

    async fn reply(&self, message_id: &str, comment: &str) -> OpResult<()>;

    async fn reply_all(&self, message_id: &str, comment: &str) -> OpResult<()>;

    async fn forward(&self, message_id: &str, comment: &str, recipient: &str) -> OpResult<()>;

    /// Move and return the message as it now exists in the destination
    async fn move_message(&self, message_id: &str, destination_folder: &str) -> OpResult<Message>;

    async fn copy_message(&self, message_id: &str, destination_folder: &str) -> OpResult<Message>;

    /// Attach a file named "fileAttachment" to a draft, then send it
    async fn add_file_attachment(&self, message_id: &str, content: &[u8]) -> OpResult<()>;

    async fn list_attachments(&self, message_id: &str) -> OpResult<Vec<Attachment>>;

    async fn message_web_link(&self, message_id: &str) -> OpResult<String>;

    async fn delete_message(&self, message_id: &str) -> OpResult<()>;

    async fn list_mail_folders(&self) -> OpResult<Vec<MailFolder>>;

    /// Create a child of `parent_folder` and return the new folder's id
    async fn create_mail_folder(&self, parent_folder: &str, name: &str) -> OpResult<String>;

    async fn rename_mail_folder(&self, folder_id: &str, new_name: &str) -> OpResult<MailFolder>;

    async fn move_mail_folder(&self, folder_id: &str, destination_folder: &str) -> OpResult<MailFolder>;

    /// Copy into `destination_folder` and return the copy's id
    async fn copy_mail_folder(&self, folder_id: &str, destination_folder: &str) -> OpResult<String>;

    async fn delete_mail_folder(&self, folder_id: &str) -> OpResult<()>;
}

pub(crate) fn subject_filter(subject: &str, received_after: DateTime<Utc>) -> String {
    format!(
        "Subject eq {} and DateTimeReceived gt {}",
        odata_string(subject),
        received_after.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

fn message_path(message_id: &str) -> String {
    format!("me/messages/{}", segment(message_id))
}

fn folder_path(folder_id: &str) -> String {
    format!("me/folders/{}", segment(folder_id))
}

/// Mail operations over Outlook REST
pub struct OutlookMail {
    session: Arc<Session>,
}

impl OutlookMail {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    async fn save_draft(&self, subject: &str, body: &str, recipient: &str) -> OpResult<Message> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let draft = Message {
            importance: Some("High".to_string()),
            ..Message::outgoing(subject, body, recipient)
        };

        // saving to me/messages puts the message in Drafts
        let saved: Message = client.post_json("me/messages", &draft).await?;
        Ok(saved)
    }
}

#[async_trait]
impl MailOperations for OutlookMail {
    async fn list_inbox_messages(&self) -> OpResult<Vec<Message>> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let page: Page<Message> = client.get_json("me/folders/Inbox/messages").await?;

        if let Some(first) = page.value.first() {
            debug!("First message from Inbox folder: {}", first.id);
        }
        Ok(page.value)
    }

    async fn list_messages(&self) -> OpResult<Vec<Message>> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let page: Page<Message> = client.get_json("me/messages").await?;

        if let Some(first) = page.value.first() {
            debug!("First message: {}", first.id);
        }
        Ok(page.value)
    }

    async fn find_message(
        &self,
        folder: &str,
        subject: &str,
        received_after: DateTime<Utc>,
    ) -> OpResult<Option<Message>> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let page: Page<Message> = client
            .get_json_with_query(
                &format!("{}/messages", folder_path(folder)),
                &[("$filter", subject_filter(subject, received_after))],
            )
            .await?;

        Ok(page.value.into_iter().next())
    }

    async fn send_message(&self, subject: &str, body: &str, recipient: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let request = SendMailRequest {
            message: Message::outgoing(subject, body, recipient),
            save_to_sent_items: true,
        };

        client.post_action("me/sendmail", &request).await?;
        debug!("Sent mail: {}", subject);
        Ok(())
    }

    async fn create_draft(&self, subject: &str, body: &str, recipient: &str) -> OpResult<String> {
        let draft = self.save_draft(subject, body, recipient).await?;

        debug!("Created draft: {}", draft.id);
        Ok(draft.id)
    }

    async fn create_draft_and_send(&self, subject: &str, body: &str, recipient: &str) -> OpResult<String> {
        let draft = self.save_draft(subject, body, recipient).await?;

        let client = self.session.try_client(ServiceDomain::Mail).await?;
        client
            .post_action(&format!("{}/send", message_path(&draft.id)), &serde_json::json!({}))
            .await?;

        debug!("Created and sent draft: {}", draft.id);
        Ok(draft.id)
    }

    async fn update_message(&self, message_id: &str, content: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let patch = BodyPatch {
            body: ItemBody::html(content),
        };

        let _: Message = client.patch_json(&message_path(message_id), &patch).await?;
        debug!("Updated message: {}", message_id);
        Ok(())
    }

    async fn reply(&self, message_id: &str, comment: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        client
            .post_action(&format!("{}/reply", message_path(message_id)), &CommentRequest { comment })
            .await?;

        debug!("Replied to message: {}", message_id);
        Ok(())
    }

    async fn reply_all(&self, message_id: &str, comment: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        client
            .post_action(&format!("{}/replyall", message_path(message_id)), &CommentRequest { comment })
            .await?;

        debug!("Replied all to message: {}", message_id);
        Ok(())
    }

    async fn forward(&self, message_id: &str, comment: &str, recipient: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let request = ForwardRequest {
            comment,
            to_recipients: vec![Recipient::to(recipient)],
        };

        client
            .post_action(&format!("{}/forward", message_path(message_id)), &request)
            .await?;
        debug!("Forwarded message: {}", message_id);
        Ok(())
    }

    async fn move_message(&self, message_id: &str, destination_folder: &str) -> OpResult<Message> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let moved: Message = client
            .post_json(
                &format!("{}/move", message_path(message_id)),
                &DestinationRequest {
                    destination_id: destination_folder,
                },
            )
            .await?;

        debug!("Moved message {} to {}", message_id, destination_folder);
        Ok(moved)
    }

    async fn copy_message(&self, message_id: &str, destination_folder: &str) -> OpResult<Message> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let copied: Message = client
            .post_json(
                &format!("{}/copy", message_path(message_id)),
                &DestinationRequest {
                    destination_id: destination_folder,
                },
            )
            .await?;

        debug!("Copied message {} to {}", message_id, destination_folder);
        Ok(copied)
    }

    async fn add_file_attachment(&self, message_id: &str, content: &[u8]) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let path = message_path(message_id);

        let _: Attachment = client
            .post_json(&format!("{}/attachments", path), &Attachment::file("fileAttachment", content))
            .await?;
        client.post_action(&format!("{}/send", path), &serde_json::json!({})).await?;

        debug!("Added attachment to message: {}", message_id);
        Ok(())
    }

    async fn list_attachments(&self, message_id: &str) -> OpResult<Vec<Attachment>> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let page: Page<Attachment> = client
            .get_json(&format!("{}/attachments", message_path(message_id)))
            .await?;

        for attachment in &page.value {
            debug!("Attachment: {}", attachment.name);
        }
        Ok(page.value)
    }

    async fn message_web_link(&self, message_id: &str) -> OpResult<String> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let message: Message = client.get_json(&message_path(message_id)).await?;

        let web_link = message
            .web_link
            .filter(|link| !link.is_empty())
            .ok_or_else(|| OpError::not_found(format!("web link for message {}", message_id)))?;
        debug!("Web link for message {}: {}", message_id, web_link);
        Ok(web_link)
    }

    async fn delete_message(&self, message_id: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        client.delete(&message_path(message_id)).await?;

        debug!("Deleted message: {}", message_id);
        Ok(())
    }

    async fn list_mail_folders(&self) -> OpResult<Vec<MailFolder>> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let page: Page<MailFolder> = client.get_json("me/folders").await?;

        if let Some(first) = page.value.first() {
            debug!("First mail folder in the collection: {}", first.id);
        }
        Ok(page.value)
    }

    async fn create_mail_folder(&self, parent_folder: &str, name: &str) -> OpResult<String> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let created: MailFolder = client
            .post_json(
                &format!("{}/childfolders", folder_path(parent_folder)),
                &FolderName { display_name: name },
            )
            .await?;

        debug!("Created folder: {}", created.id);
        Ok(created.id)
    }

    async fn rename_mail_folder(&self, folder_id: &str, new_name: &str) -> OpResult<MailFolder> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let renamed: MailFolder = client
            .patch_json(&folder_path(folder_id), &FolderName { display_name: new_name })
            .await?;

        debug!("Updated folder name: {} {}", folder_id, new_name);
        Ok(renamed)
    }

    async fn move_mail_folder(&self, folder_id: &str, destination_folder: &str) -> OpResult<MailFolder> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let moved: MailFolder = client
            .post_json(
                &format!("{}/move", folder_path(folder_id)),
                &DestinationRequest {
                    destination_id: destination_folder,
                },
            )
            .await?;

        debug!("Moved folder {} to {}", folder_id, destination_folder);
        Ok(moved)
    }

    async fn copy_mail_folder(&self, folder_id: &str, destination_folder: &str) -> OpResult<String> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        let copied: MailFolder = client
            .post_json(
                &format!("{}/copy", folder_path(folder_id)),
                &DestinationRequest {
                    destination_id: destination_folder,
                },
            )
            .await?;

        debug!("Copied folder {} to {}", folder_id, destination_folder);
        Ok(copied.id)
    }

    async fn delete_mail_folder(&self, folder_id: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Mail).await?;
        client.delete(&folder_path(folder_id)).await?;

        debug!("Deleted folder: {}", folder_id);
        Ok(())
    }
}
