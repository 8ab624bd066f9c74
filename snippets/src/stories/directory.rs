use super::StoryContext;
use crate::errors::OpResult;
use crate::session::ServiceDomain;

pub async fn client(ctx: &StoryContext) -> OpResult<bool> {
    Ok(ctx.session.client(ServiceDomain::Directory).await.is_some())
}

pub async fn read_users(ctx: &StoryContext) -> OpResult<bool> {
    ctx.directory.list_users().await?;
    Ok(true)
}

pub async fn tenant_details(ctx: &StoryContext) -> OpResult<bool> {
    let tenant = ctx.directory.tenant_details().await?;
    Ok(!tenant.object_id.is_empty())
}

pub async fn read_groups(ctx: &StoryContext) -> OpResult<bool> {
    ctx.directory.list_groups().await?;
    Ok(true)
}
