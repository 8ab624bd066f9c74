use uuid::Uuid;

use super::{CleanupScope, Resource, StoryContext};
use crate::errors::{OpError, OpResult};
use crate::operations::ContactDraft;
use crate::session::ServiceDomain;

fn random_contact(ctx: &StoryContext) -> ContactDraft {
    ContactDraft {
        file_as: Uuid::new_v4().to_string(),
        given_name: Uuid::new_v4().to_string(),
        surname: ctx.identifiers.contacts.clone(),
        job_title: Uuid::new_v4().to_string(),
        email: "a@b.com".to_string(),
        work_phone: Uuid::new_v4().to_string(),
        mobile_phone: Uuid::new_v4().to_string(),
    }
}

async fn add_contact(ctx: &StoryContext, scope: &mut CleanupScope, draft: &ContactDraft) -> OpResult<String> {
    let contact = ctx.contacts.add_contact(draft).await?;
    scope.register(Resource::Contact(contact.id.clone()));
    Ok(contact.id)
}

pub async fn client(ctx: &StoryContext) -> OpResult<bool> {
    Ok(ctx.session.client(ServiceDomain::Contacts).await.is_some())
}

pub async fn read(ctx: &StoryContext) -> OpResult<bool> {
    ctx.contacts.list_contacts().await?;
    Ok(true)
}

pub async fn get_contact(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let contact_id = add_contact(ctx, scope, &random_contact(ctx)).await?;

    let contact = ctx.contacts.get_contact(&contact_id).await?;
    Ok(contact.id == contact_id)
}

pub async fn create(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let contact_id = add_contact(ctx, scope, &random_contact(ctx)).await?;
    Ok(!contact_id.is_empty())
}

pub async fn delete(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let contact_id = add_contact(ctx, scope, &random_contact(ctx)).await?;
    ctx.contacts.get_contact(&contact_id).await?;

    ctx.contacts.delete_contact(&contact_id).await?;
    scope.dismiss(&Resource::Contact(contact_id.clone()));

    match ctx.contacts.get_contact(&contact_id).await {
        Err(OpError::NotFound { .. }) => Ok(true),
        Ok(_) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn update(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let original = ContactDraft {
        file_as: "FileAsValue".to_string(),
        given_name: "FirstNameValue".to_string(),
        surname: ctx.identifiers.contacts.clone(),
        job_title: "JobTitleValue".to_string(),
        email: "a@b.com".to_string(),
        work_phone: "WorkPhoneValue".to_string(),
        mobile_phone: "MobilePhoneValue".to_string(),
    };
    let contact_id = add_contact(ctx, scope, &original).await?;

    let changes = ContactDraft {
        file_as: "NewFileAsValue".to_string(),
        job_title: "NewJobTitleValue".to_string(),
        ..original
    };
    ctx.contacts.update_contact(&contact_id, &changes).await?;

    let contact = ctx.contacts.get_contact(&contact_id).await?;
    Ok(contact.file_as.as_deref() == Some("NewFileAsValue")
        && contact.job_title.as_deref() == Some("NewJobTitleValue"))
}
