use crate::errors::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 名前の最大文字数
pub const MAX_NAME_LENGTH: usize = 200;

/// リサイズ済み画像のキー接頭辞
pub const RESIZED_IMAGE_PREFIX: &str = "resize_";

/// 添付画像オブジェクトの拡張子
pub const IMAGE_EXTENSION: &str = ".png";

/// リサイズ後の画像幅（ピクセル）
pub const RESIZED_IMAGE_WIDTH: u32 = 150;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(id: String) -> Result<Self, DomainError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidTodoId("TodoIdが空です".to_string()));
        }
        uuid::Uuid::parse_str(trimmed)
            .map_err(|e| DomainError::InvalidTodoId(format!("{trimmed}: {e}")))?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 添付画像の参照（画像IDと公開URLは常に対で保持する）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub image_id: String,
    pub url: String,
}

/// ユーザーが所有するToDo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub user_id: String,
    pub todo_id: TodoId,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub due_date: String,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
}

impl TodoItem {
    /// 作成リクエストから新しいToDoを組み立てる
    pub fn new(user_id: &str, request: &CreateTodoRequest) -> Self {
        Self {
            user_id: user_id.to_string(),
            todo_id: TodoId::new(),
            created_at: Utc::now(),
            name: request.name.trim().to_string(),
            due_date: request.due_date.clone(),
            done: false,
            image_id: None,
            attachment_url: None,
        }
    }

    pub fn attachment(&self) -> Option<Attachment> {
        match (&self.image_id, &self.attachment_url) {
            (Some(image_id), Some(url)) if !image_id.is_empty() => Some(Attachment {
                image_id: image_id.clone(),
                url: url.clone(),
            }),
            _ => None,
        }
    }

    pub fn set_attachment(&mut self, attachment: Option<&Attachment>) {
        self.image_id = attachment.map(|a| a.image_id.clone());
        self.attachment_url = attachment.map(|a| a.url.clone());
    }

    pub fn apply_update(&mut self, update: &UpdateTodoRequest) {
        self.name = update.name.trim().to_string();
        self.due_date = update.due_date.clone();
        self.done = update.done;
    }
}

/// ToDo作成リクエスト
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub name: String,
    pub due_date: String,
}

impl CreateTodoRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_name(&self.name)
    }
}

/// ToDo更新リクエスト
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    pub name: String,
    pub due_date: String,
    pub done: bool,
    #[serde(default)]
    pub is_update_image: bool,
}

impl UpdateTodoRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_name(&self.name)
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::Validation("名前は必須です".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::Validation(format!(
            "名前は{MAX_NAME_LENGTH}文字以内で入力してください"
        )));
    }
    Ok(())
}

/// 画像IDからオブジェクトキーを作る
pub fn image_key(image_id: &str) -> String {
    format!("{image_id}{IMAGE_EXTENSION}")
}

/// リサイズ済み画像の画像ID
pub fn resized_image_id(image_id: &str) -> String {
    format!("{RESIZED_IMAGE_PREFIX}{image_id}")
}

/// アップロードされたオブジェクトキーから画像IDを取り出す。
/// リサイズ済みのキーや画像拡張子以外のキーは `None`。
pub fn image_id_from_key(key: &str) -> Option<&str> {
    if key.starts_with(RESIZED_IMAGE_PREFIX) {
        return None;
    }
    key.strip_suffix(IMAGE_EXTENSION)
        .filter(|image_id| !image_id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(name: &str) -> CreateTodoRequest {
        CreateTodoRequest {
            name: name.to_string(),
            due_date: "2024-05-01".to_string(),
        }
    }

    #[test]
    fn test_todo_id_from_string() {
        let id = TodoId::new();
        let parsed = TodoId::from_string(id.as_str().to_string()).unwrap();
        assert_eq!(parsed, id);

        assert!(TodoId::from_string("".to_string()).is_err());
        assert!(TodoId::from_string("not-a-uuid".to_string()).is_err());
    }

    #[test]
    fn test_new_todo_item() {
        let todo = TodoItem::new("user123", &create_request("  買い物  "));

        assert_eq!(todo.user_id, "user123");
        assert_eq!(todo.name, "買い物");
        assert_eq!(todo.due_date, "2024-05-01");
        assert!(!todo.done);
        assert!(todo.attachment().is_none());
    }

    #[test]
    fn test_name_validation() {
        assert!(create_request("牛乳を買う").validate().is_ok());
        assert!(create_request("   ").validate().is_err());
        assert!(create_request(&"あ".repeat(MAX_NAME_LENGTH)).validate().is_ok());
        assert!(create_request(&"あ".repeat(MAX_NAME_LENGTH + 1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_update_request_defaults() {
        let json = r#"{"name":"更新","dueDate":"2024-06-01","done":true}"#;
        let request: UpdateTodoRequest = serde_json::from_str(json).unwrap();
        assert!(request.done);
        assert!(!request.is_update_image);
    }

    #[test]
    fn test_attachment_set_and_clear() {
        let mut todo = TodoItem::new("user123", &create_request("写真"));
        let attachment = Attachment {
            image_id: "img1".to_string(),
            url: "https://bucket.s3.amazonaws.com/img1.png".to_string(),
        };

        todo.set_attachment(Some(&attachment));
        assert_eq!(todo.attachment(), Some(attachment));

        todo.set_attachment(None);
        assert!(todo.image_id.is_none());
        assert!(todo.attachment_url.is_none());
    }

    #[test]
    fn test_todo_item_serialization() {
        let todo = TodoItem::new("user123", &create_request("テスト"));
        let json = serde_json::to_value(&todo).unwrap();

        assert_eq!(json["userId"], "user123");
        assert_eq!(json["todoId"], todo.todo_id.as_str());
        assert_eq!(json["dueDate"], "2024-05-01");
        assert_eq!(json["done"], false);
        assert!(json.get("attachmentUrl").is_none());
    }

    #[test]
    fn test_image_key_helpers() {
        assert_eq!(image_key("abc"), "abc.png");
        assert_eq!(resized_image_id("abc"), "resize_abc");
        assert_eq!(image_id_from_key("abc.png"), Some("abc"));
        assert_eq!(image_id_from_key("resize_abc.png"), None);
        assert_eq!(image_id_from_key("abc.jpg"), None);
        assert_eq!(image_id_from_key(".png"), None);
    }
}
