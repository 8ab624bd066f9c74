use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{segment, Page};
use crate::errors::{OpError, OpResult};
use crate::session::{ServiceDomain, Session};

/// File or folder in the user's file store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    /// "File" or "Folder"
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

impl DriveItem {
    pub fn file(name: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            item_type: "File".to_string(),
            size: None,
        }
    }

    pub fn folder(name: &str) -> Self {
        Self {
            item_type: "Folder".to_string(),
            ..Self::file(name)
        }
    }

    pub fn is_folder(&self) -> bool {
        self.item_type.eq_ignore_ascii_case("folder")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CopyRequest<'a> {
    dest_folder_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RenameRequest<'a> {
    name: &'a str,
}

#[async_trait]
pub trait FilesOperations: Send + Sync {
    /// Add an empty file item, upload `content` into it and return its id
    async fn create_file(&self, name: &str, content: Vec<u8>) -> OpResult<String>;

    async fn update_file_content(&self, file_id: &str, content: Vec<u8>) -> OpResult<()>;

    async fn download_file(&self, file_id: &str) -> OpResult<Vec<u8>>;

    async fn delete_file(&self, file_id: &str) -> OpResult<()>;

    /// Copy into `destination_folder_id` and return the copy's id
    async fn copy_file(&self, file_id: &str, destination_folder_id: &str) -> OpResult<String>;

    /// Rename and return the name the server now reports
    async fn rename_file(&self, file_id: &str, new_name: &str) -> OpResult<String>;

    /// Children of a folder; `"root"` names the root folder
    async fn list_folder_children(&self, folder_id: &str) -> OpResult<Vec<DriveItem>>;

    async fn create_folder(&self, name: &str, parent_folder_id: &str) -> OpResult<DriveItem>;

    async fn delete_folder(&self, folder_id: &str) -> OpResult<()>;
}

/// File operations over the files v1.0 REST API
pub struct MyFiles {
    session: Arc<Session>,
}

impl MyFiles {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

fn item_path(item_id: &str) -> String {
    format!("files/{}", segment(item_id))
}

#[async_trait]
impl FilesOperations for MyFiles {
    async fn create_file(&self, name: &str, content: Vec<u8>) -> OpResult<String> {
        let client = self.session.try_client(ServiceDomain::Files).await?;

        let created: DriveItem = client.post_json("files", &DriveItem::file(name)).await?;
        client
            .post_bytes(&format!("{}/uploadContent", item_path(&created.id)), content)
            .await?;

        debug!("Created a file: {}", created.id);
        Ok(created.id)
    }

    async fn update_file_content(&self, file_id: &str, content: Vec<u8>) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Files).await?;
        client
            .post_bytes(&format!("{}/uploadContent", item_path(file_id)), content)
            .await?;

        debug!("Updated file content: {}", file_id);
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> OpResult<Vec<u8>> {
        let client = self.session.try_client(ServiceDomain::Files).await?;
        let bytes = client.get_bytes(&format!("{}/content", item_path(file_id))).await?;

        debug!("Downloaded a file: {} ({} bytes)", file_id, bytes.len());
        Ok(bytes)
    }

    async fn delete_file(&self, file_id: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Files).await?;
        let path = item_path(file_id);

        let file: DriveItem = client.get_json(&path).await?;
        client.delete(&path).await?;

        debug!("Deleted a file: {}", file.id);
        Ok(())
    }

    async fn copy_file(&self, file_id: &str, destination_folder_id: &str) -> OpResult<String> {
        let client = self.session.try_client(ServiceDomain::Files).await?;
        let request = CopyRequest {
            dest_folder_id: destination_folder_id,
        };

        let copied: DriveItem = client
            .post_json(&format!("{}/copy", item_path(file_id)), &request)
            .await?;
        if copied.id.is_empty() {
            return Err(OpError::invalid("Copy returned an item without an id"));
        }

        debug!("Copied file {} to folder {}", file_id, destination_folder_id);
        Ok(copied.id)
    }

    async fn rename_file(&self, file_id: &str, new_name: &str) -> OpResult<String> {
        let client = self.session.try_client(ServiceDomain::Files).await?;

        let renamed: DriveItem = client
            .patch_json(&item_path(file_id), &RenameRequest { name: new_name })
            .await?;

        debug!("Renamed a file: {}", file_id);
        Ok(renamed.name)
    }

    async fn list_folder_children(&self, folder_id: &str) -> OpResult<Vec<DriveItem>> {
        let client = self.session.try_client(ServiceDomain::Files).await?;
        let page: Page<DriveItem> = client
            .get_json(&format!("{}/children", item_path(folder_id)))
            .await?;

        if let Some(first) = page.value.first() {
            debug!("First child of {}: {}", folder_id, first.id);
        }
        Ok(page.value)
    }

    async fn create_folder(&self, name: &str, parent_folder_id: &str) -> OpResult<DriveItem> {
        let client = self.session.try_client(ServiceDomain::Files).await?;

        let added: DriveItem = client
            .post_json(&format!("{}/children", item_path(parent_folder_id)), &DriveItem::folder(name))
            .await?;
        // read back so the caller sees what the server stored
        let folder: DriveItem = client.get_json(&item_path(&added.id)).await?;

        debug!("Created a folder: {}", folder.id);
        Ok(folder)
    }

    async fn delete_folder(&self, folder_id: &str) -> OpResult<()> {
        let client = self.session.try_client(ServiceDomain::Files).await?;
        let path = item_path(folder_id);

        let folder: DriveItem = client.get_json(&path).await?;
        client.delete(&path).await?;

        debug!("Deleted a folder: {}", folder.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_items_carry_type() {
        let json = serde_json::to_value(DriveItem::folder("story-id")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "story-id", "type": "Folder"}));
        assert!(!DriveItem::file("a.txt").is_folder());
    }

    #[test]
    fn test_parse_children_page() {
        let body = r#"{"value": [
            {"id": "01ABC", "name": "Documents", "type": "Folder", "size": 0},
            {"id": "01DEF", "name": "notes.txt", "type": "File", "size": 12}
        ]}"#;
        let page: Page<DriveItem> = serde_json::from_str(body).unwrap();

        assert_eq!(page.value.len(), 2);
        assert!(page.value[0].is_folder());
        assert_eq!(page.value[1].size, Some(12));
    }
}
