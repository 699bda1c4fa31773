use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, SecondsFormat, Utc};
use domain::{PageCursor, TodoError, TodoId, TodoItem};
use std::collections::{BTreeMap, HashMap};

/// テーブルの属性名
pub mod attributes {
    pub const USER_ID: &str = "userId";
    pub const TODO_ID: &str = "todoId";
    pub const CREATED_AT: &str = "createdAt";
    pub const NAME: &str = "name";
    pub const DUE_DATE: &str = "dueDate";
    pub const DONE: &str = "done";
    pub const IMAGE_ID: &str = "imageId";
    pub const ATTACHMENT_URL: &str = "attachmentUrl";
}

use attributes::*;

/// インデックスのソートキーとして辞書順が時系列順になる形式で書き出す
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// ToDo を DynamoDB アイテムに変換
pub fn todo_to_item(todo: &TodoItem) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();

    item.insert(USER_ID.to_string(), AttributeValue::S(todo.user_id.clone()));
    item.insert(
        TODO_ID.to_string(),
        AttributeValue::S(todo.todo_id.as_str().to_string()),
    );
    item.insert(
        CREATED_AT.to_string(),
        AttributeValue::S(format_timestamp(&todo.created_at)),
    );
    item.insert(NAME.to_string(), AttributeValue::S(todo.name.clone()));
    // 空文字はインデックスのキーにできないため属性ごと省く
    if !todo.due_date.is_empty() {
        item.insert(DUE_DATE.to_string(), AttributeValue::S(todo.due_date.clone()));
    }
    item.insert(DONE.to_string(), AttributeValue::Bool(todo.done));

    if let Some(attachment) = todo.attachment() {
        item.insert(IMAGE_ID.to_string(), AttributeValue::S(attachment.image_id));
        item.insert(ATTACHMENT_URL.to_string(), AttributeValue::S(attachment.url));
    }

    item
}

fn required_string(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String, TodoError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| TodoError::Internal(format!("属性 {name} がありません")))
}

fn optional_string(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .filter(|s| !s.is_empty())
        .cloned()
}

/// DynamoDB アイテムから ToDo を復元
pub fn item_to_todo(item: &HashMap<String, AttributeValue>) -> Result<TodoItem, TodoError> {
    let todo_id = TodoId::from_string(required_string(item, TODO_ID)?)?;

    let created_at_raw = required_string(item, CREATED_AT)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TodoError::Internal(format!("createdAt が不正です: {created_at_raw} ({e})")))?;

    let done = item
        .get(DONE)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .unwrap_or(false);

    // 画像IDとURLは対で扱う
    let (image_id, attachment_url) = match (
        optional_string(item, IMAGE_ID),
        optional_string(item, ATTACHMENT_URL),
    ) {
        (Some(image_id), Some(url)) => (Some(image_id), Some(url)),
        _ => (None, None),
    };

    Ok(TodoItem {
        user_id: required_string(item, USER_ID)?,
        todo_id,
        created_at,
        name: required_string(item, NAME)?,
        due_date: optional_string(item, DUE_DATE).unwrap_or_default(),
        done,
        image_id,
        attachment_url,
    })
}

/// カーソルを ExclusiveStartKey に変換
pub fn cursor_to_key(cursor: &PageCursor) -> HashMap<String, AttributeValue> {
    cursor
        .key_map()
        .iter()
        .map(|(name, value)| (name.clone(), AttributeValue::S(value.clone())))
        .collect()
}

/// LastEvaluatedKey をカーソルに変換
pub fn key_to_cursor(key: &HashMap<String, AttributeValue>) -> Result<PageCursor, TodoError> {
    let mut map = BTreeMap::new();
    for (name, value) in key {
        let value = value
            .as_s()
            .map_err(|_| TodoError::Internal(format!("キー属性 {name} が文字列ではありません")))?;
        map.insert(name.clone(), value.clone());
    }
    Ok(PageCursor::from_key_map(map)?)
}
