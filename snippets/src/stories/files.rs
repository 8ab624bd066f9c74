use uuid::Uuid;

use super::{CleanupScope, Resource, StoryContext};
use crate::errors::OpResult;
use crate::session::ServiceDomain;

const ROOT: &str = "root";

fn unique_file_name(ctx: &StoryContext) -> String {
    format!("{}_{}", ctx.identifiers.files, Uuid::new_v4())
}

async fn root_count(ctx: &StoryContext) -> OpResult<usize> {
    Ok(ctx.files.list_folder_children(ROOT).await?.len())
}

async fn add_file(ctx: &StoryContext, scope: &mut CleanupScope, content: &str) -> OpResult<String> {
    let file_id = ctx
        .files
        .create_file(&unique_file_name(ctx), content.as_bytes().to_vec())
        .await?;
    scope.register(Resource::File(file_id.clone()));
    Ok(file_id)
}

async fn add_folder(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<String> {
    let folder = ctx.files.create_folder(&ctx.identifiers.files, ROOT).await?;
    scope.register(Resource::Folder(folder.id.clone()));
    Ok(folder.id)
}

pub async fn client(ctx: &StoryContext) -> OpResult<bool> {
    Ok(ctx.session.client(ServiceDomain::Files).await.is_some())
}

pub async fn read_folders(ctx: &StoryContext) -> OpResult<bool> {
    ctx.files.list_folder_children(ROOT).await?;
    Ok(true)
}

pub async fn create_folder(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let folder_id = add_folder(ctx, scope).await?;
    Ok(!folder_id.is_empty())
}

pub async fn delete_folder(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let folder_id = add_folder(ctx, scope).await?;

    ctx.files.delete_folder(&folder_id).await?;
    scope.dismiss(&Resource::Folder(folder_id));
    Ok(true)
}

pub async fn create_file(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let original = root_count(ctx).await?;
    add_file(ctx, scope, "TryAddFileAsync").await?;

    Ok(root_count(ctx).await? == original + 1)
}

pub async fn update_content(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let original = root_count(ctx).await?;
    let file_id = add_file(ctx, scope, "TryUpdateFileAsync").await?;
    if root_count(ctx).await? != original + 1 {
        return Ok(false);
    }

    let updated = "Updated content";
    ctx.files
        .update_file_content(&file_id, updated.as_bytes().to_vec())
        .await?;

    let downloaded = ctx.files.download_file(&file_id).await?;
    Ok(downloaded == updated.as_bytes())
}

pub async fn delete_file(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let original = root_count(ctx).await?;
    let file_id = add_file(ctx, scope, "CanAddFileAsync").await?;
    if root_count(ctx).await? != original + 1 {
        return Ok(false);
    }

    ctx.files.delete_file(&file_id).await?;
    scope.dismiss(&Resource::File(file_id));

    Ok(root_count(ctx).await? == original)
}

pub async fn download(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let contents = "TryDownloadFileAsync";
    let file_id = add_file(ctx, scope, contents).await?;

    let downloaded = ctx.files.download_file(&file_id).await?;
    Ok(downloaded == contents.as_bytes())
}

pub async fn copy_file(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let file_id = add_file(ctx, scope, "TryAddFileAsync").await?;
    let folder_id = add_folder(ctx, scope).await?;

    let copy_id = ctx.files.copy_file(&file_id, &folder_id).await?;
    scope.register(Resource::File(copy_id.clone()));
    Ok(!copy_id.is_empty())
}

pub async fn rename_file(ctx: &StoryContext, scope: &mut CleanupScope) -> OpResult<bool> {
    let new_name = "updated name";
    let file_id = add_file(ctx, scope, "TryUpdateFileAsync").await?;

    let name = ctx.files.rename_file(&file_id, new_name).await?;
    Ok(name == new_name)
}
