use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::{CleanupScope, Resource, StoryContext};
use crate::errors::OpResult;
use crate::poll::{poll_until, PollOutcome, PollPolicy};
use crate::session::ServiceDomain;

pub const DEFAULT_MESSAGE_BODY: &str = "This message was sent from the <a href='https://github.com/OfficeDev/O365-Win-Snippets' >Office 365 Windows Snippets project</a>";
pub const UPDATED_MESSAGE_BODY: &str = "This message was updated by the <a href='https://github.com/OfficeDev/O365-Win-Snippets' >Office 365 Windows Snippets project</a>";
const REPLY_COMMENT: &str = "This reply was sent from the <a href='https://github.com/OfficeDev/O365-Win-Snippets' >Office 365 Windows Snippets project</a>";
const REPLY_ALL_COMMENT: &str = "This reply all was sent from the <a href='https://github.com/OfficeDev/O365-Win-Snippets' >Office 365 Windows Snippets project</a>";
const FORWARD_COMMENT: &str = "This forward was sent from the <a href='https://github.com/OfficeDev/O365-Win-Snippets' >Office 365 Windows Snippets project</a>";
const ATTACHMENT_CONTENT: &str = "TryAddMailAttachmentAsync";
const WELL_KNOWN_FOLDERS: [&str; 4] = ["Inbox", "Drafts", "DeletedItems", "SentItems"];

/// Subject for one send. The suffix keeps a poll from matching mail an
/// earlier story sent.
fn unique_subject(ctx: &StoryContext) -> String {
    format!("{} {}", ctx.identifiers.mail, Uuid::new_v4())
}

/// Start of the receipt window. An out-of-range look-back falls back to a
/// minute.
fn received_after(policy: &PollPolicy) -> DateTime<Utc> {
    let now = Utc::now();
    Duration::from_std(policy.lookback)
        .ok()
        .and_then(|lookback| now.checked_sub_signed(lookback))
        .unwrap_or_else(|| now - Duration::seconds(60))
}

/// Poll `folder` for a message with exactly `subject`. The receipt window
/// is fixed when polling starts.
pub async fn find_sent_message_id(ctx: &StoryContext, folder: &str, subject: &str) -> Option<String> {
    let received_after = received_after(&ctx.poll_policy);
    let mail = ctx.mail.as_ref();

    let outcome = poll_until(&ctx.poll_policy, &ctx.cancel, "find sent message", move |_| async move {
        mail.find_message(folder, subject, received_after)
            .await
            .map(|found| found.map(|message| message.id))
    })
    .await;

    match outcome {
        PollOutcome::Found(id) => Some(id),
        PollOutcome::Exhausted { attempts } => {
            info!("'{}' did not arrive in {} after {} attempts", subject, folder, attempts);
            None
        }
        PollOutcome::TimedOut { attempts } => {
            info!("Gave up waiting for '{}' in {} after {} attempts", subject, folder, attempts);
            None
        }
        PollOutcome::Cancelled { .. } => None,
    }
}

/// Register the inbox and Sent Items copies of a sent message for cleanup.
/// Returns the inbox copy's id.
async fn collect_copies(ctx: &StoryContext, scope: &mut CleanupScope, subject: &str) -> Option<String> {
    let received = find_sent_message_id(ctx, "Inbox", subject).await;
    let sent = find_sent_message_id(ctx, "SentItems", subject).await;

    for message_id in received.iter().chain(sent.iter()) {
        scope.register(Resource::Message(message_id.clone()));
    }
    received
}

/// Send a draft to the recipient and wait for it to arrive. Both copies are
/// registered for cleanup.
async fn send_and_receive(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<Option<(String, String)>> {
    let recipient = ctx.recipient()?;
    let subject = unique_subject(ctx);
    ctx.mail
        .create_draft_and_send(&subject, DEFAULT_MESSAGE_BODY, &recipient)
        .await?;

    Ok(collect_copies(ctx, scope, &subject)
        .await
        .map(|message_id| (message_id, subject)))
}

async fn add_draft(ctx: &StoryContext, scope: &mut CleanupScope, subject: &str) -> OpResult<String> {
    let recipient = ctx.recipient()?;
    let draft_id = ctx
        .mail
        .create_draft(subject, DEFAULT_MESSAGE_BODY, &recipient)
        .await?;
    scope.register(Resource::Message(draft_id.clone()));
    Ok(draft_id)
}

/// Attach a file to a fresh draft, which sends it
async fn send_with_attachment(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<String> {
    let subject = unique_subject(ctx);
    let draft_id = add_draft(ctx, scope, &subject).await?;

    ctx.mail
        .add_file_attachment(&draft_id, ATTACHMENT_CONTENT.as_bytes())
        .await?;
    // sending consumed the draft
    scope.dismiss(&Resource::Message(draft_id));
    Ok(subject)
}

async fn add_folder(ctx: &StoryContext, scope: &mut CleanupScope, name: &str) -> OpResult<String> {
    let folder_id = ctx.mail.create_mail_folder("Inbox", name).await?;
    scope.register(Resource::MailFolder(folder_id.clone()));
    Ok(folder_id)
}

pub async fn client(ctx: &StoryContext) -> OpResult<bool> {
    Ok(ctx.session.client(ServiceDomain::Mail).await.is_some())
}

pub async fn read_inbox(ctx: &StoryContext) -> OpResult<bool> {
    ctx.mail.list_inbox_messages().await?;
    Ok(true)
}

pub async fn read_messages(ctx: &StoryContext) -> OpResult<bool> {
    ctx.mail.list_messages().await?;
    Ok(true)
}

pub async fn send(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let recipient = ctx.recipient()?;
    let subject = unique_subject(ctx);
    ctx.mail
        .send_message(&subject, DEFAULT_MESSAGE_BODY, &recipient)
        .await?;

    collect_copies(ctx, scope, &subject).await;
    Ok(true)
}

pub async fn reply(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let Some((message_id, subject)) = send_and_receive(ctx, scope).await? else {
        return Ok(false);
    };

    ctx.mail.reply(&message_id, REPLY_COMMENT).await?;
    collect_copies(ctx, scope, &format!("RE: {}", subject)).await;
    Ok(true)
}

pub async fn reply_all(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let Some((message_id, subject)) = send_and_receive(ctx, scope).await? else {
        return Ok(false);
    };

    ctx.mail.reply_all(&message_id, REPLY_ALL_COMMENT).await?;
    collect_copies(ctx, scope, &format!("RE: {}", subject)).await;
    Ok(true)
}

pub async fn forward(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let Some((message_id, subject)) = send_and_receive(ctx, scope).await? else {
        return Ok(false);
    };

    let recipient = ctx.recipient()?;
    ctx.mail.forward(&message_id, FORWARD_COMMENT, &recipient).await?;
    collect_copies(ctx, scope, &format!("FW: {}", subject)).await;
    Ok(true)
}

pub async fn create_draft(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let draft_id = add_draft(ctx, scope, &ctx.identifiers.mail).await?;
    Ok(!draft_id.is_empty())
}

pub async fn update(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let draft_id = add_draft(ctx, scope, &ctx.identifiers.mail).await?;

    ctx.mail.update_message(&draft_id, UPDATED_MESSAGE_BODY).await?;
    Ok(true)
}

pub async fn delete(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let draft_id = add_draft(ctx, scope, &ctx.identifiers.mail).await?;

    ctx.mail.delete_message(&draft_id).await?;
    scope.dismiss(&Resource::Message(draft_id));
    Ok(true)
}

pub async fn move_message(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let Some((message_id, _)) = send_and_receive(ctx, scope).await? else {
        return Ok(false);
    };

    let moved = ctx.mail.move_message(&message_id, "Drafts").await?;
    // a moved message gets a new id in its new folder
    scope.dismiss(&Resource::Message(message_id));
    scope.register(Resource::Message(moved.id.clone()));
    Ok(!moved.id.is_empty())
}

pub async fn copy_message(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let Some((message_id, _)) = send_and_receive(ctx, scope).await? else {
        return Ok(false);
    };

    let copied = ctx.mail.copy_message(&message_id, "Drafts").await?;
    scope.register(Resource::Message(copied.id.clone()));
    Ok(!copied.id.is_empty())
}

pub async fn add_attachment(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let subject = send_with_attachment(ctx, scope).await?;

    collect_copies(ctx, scope, &subject).await;
    Ok(true)
}

pub async fn read_attachments(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let subject = send_with_attachment(ctx, scope).await?;
    let Some(message_id) = collect_copies(ctx, scope, &subject).await else {
        return Ok(false);
    };

    let attachments = ctx.mail.list_attachments(&message_id).await?;
    debug!("Received {} attachments", attachments.len());

    for attachment in attachments.iter().filter(|attachment| attachment.name == "fileAttachment") {
        if attachment.decoded_content()?.as_deref() == Some(ATTACHMENT_CONTENT.as_bytes()) {
            return Ok(true);
        }
    }
    Ok(false)
}

pub async fn web_link(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let draft_id = add_draft(ctx, scope, &ctx.identifiers.mail).await?;

    let link = ctx.mail.message_web_link(&draft_id).await?;
    Ok(!link.is_empty())
}

pub async fn read_folders(ctx: &StoryContext) -> OpResult<bool> {
    let folders = ctx.mail.list_mail_folders().await?;
    Ok(folders
        .iter()
        .any(|folder| WELL_KNOWN_FOLDERS.contains(&folder.display_name.as_str())))
}

pub async fn create_folder(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let folder_id = add_folder(ctx, scope, "FolderToDelete").await?;
    Ok(!folder_id.is_empty())
}

pub async fn rename_folder(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let folder_id = add_folder(ctx, scope, "FolderToUpdateAndDelete").await?;

    let renamed = ctx.mail.rename_mail_folder(&folder_id, "FolderToDelete").await?;
    Ok(renamed.display_name == "FolderToDelete")
}

pub async fn move_folder(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let folder_id = add_folder(ctx, scope, "FolderToDelete").await?;

    let moved = ctx.mail.move_mail_folder(&folder_id, "Drafts").await?;
    if moved.id != folder_id {
        scope.dismiss(&Resource::MailFolder(folder_id));
        scope.register(Resource::MailFolder(moved.id.clone()));
    }
    Ok(!moved.id.is_empty())
}

pub async fn copy_folder(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let folder_id = add_folder(ctx, scope, "FolderToCopyAndDelete").await?;

    let copy_id = ctx.mail.copy_mail_folder(&folder_id, "Drafts").await?;
    scope.register(Resource::MailFolder(copy_id.clone()));
    Ok(!copy_id.is_empty())
}

pub async fn delete_folder(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let folder_id = add_folder(ctx, scope, "FolderToDelete").await?;

    ctx.mail.delete_mail_folder(&folder_id).await?;
    scope.dismiss(&Resource::MailFolder(folder_id));
    Ok(true)
}
