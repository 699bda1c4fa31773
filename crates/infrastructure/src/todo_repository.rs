use crate::models::{attributes::*, cursor_to_key, item_to_todo, key_to_cursor, todo_to_item};
use crate::DynamoDbClient;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use domain::{
    Attachment, PageCursor, TodoError, TodoId, TodoItem, TodoOrder, TodoPage, TodoRepository,
    UpdateTodoRequest,
};
use shared::Config;
use tracing::{debug, info};

fn dynamodb_error<E>(operation: &str, error: E) -> TodoError
where
    E: std::error::Error + 'static,
{
    TodoError::DynamoDb(format!("{operation} 失敗: {}", DisplayErrorContext(error)))
}

/// ToDo テーブルのリポジトリ
#[derive(Clone)]
pub struct DynamoDbTodoRepository {
    db: DynamoDbClient,
    created_at_index: String,
    due_date_index: String,
}

impl DynamoDbTodoRepository {
    pub fn new(
        db: DynamoDbClient,
        created_at_index: impl Into<String>,
        due_date_index: impl Into<String>,
    ) -> Self {
        Self {
            db,
            created_at_index: created_at_index.into(),
            due_date_index: due_date_index.into(),
        }
    }

    pub fn from_config(db: DynamoDbClient, config: &Config) -> Self {
        Self::new(db, &config.created_at_index, &config.due_date_index)
    }

    fn index_name(&self, order: TodoOrder) -> &str {
        match order {
            TodoOrder::CreatedAt => &self.created_at_index,
            TodoOrder::DueDate => &self.due_date_index,
        }
    }

    fn user_key(user_id: &str) -> AttributeValue {
        AttributeValue::S(user_id.to_string())
    }

    fn todo_key(todo_id: &TodoId) -> AttributeValue {
        AttributeValue::S(todo_id.as_str().to_string())
    }
}

#[async_trait]
impl TodoRepository for DynamoDbTodoRepository {
    async fn list(
        &self,
        user_id: &str,
        order: TodoOrder,
        limit: u32,
        cursor: Option<&PageCursor>,
    ) -> Result<TodoPage, TodoError> {
        let index_name = self.index_name(order);
        info!(
            "ToDo一覧を取得中: user_id={}, index={}, limit={}",
            user_id, index_name, limit
        );

        let output = self
            .db
            .client()
            .query()
            .table_name(self.db.table_name())
            .index_name(index_name)
            .key_condition_expression("userId = :userId")
            .expression_attribute_values(":userId", Self::user_key(user_id))
            .limit(i32::try_from(limit).unwrap_or(i32::MAX))
            .scan_index_forward(false)
            .set_exclusive_start_key(cursor.map(cursor_to_key))
            .send()
            .await
            .map_err(|e| dynamodb_error("Query", e))?;

        let items = output
            .items
            .unwrap_or_default()
            .iter()
            .map(item_to_todo)
            .collect::<Result<Vec<_>, _>>()?;

        let next_key = match output.last_evaluated_key {
            Some(key) if !key.is_empty() => Some(key_to_cursor(&key)?),
            _ => None,
        };

        debug!(
            "ToDo一覧取得完了: {} 件, next_key={}",
            items.len(),
            next_key.is_some()
        );

        Ok(TodoPage { items, next_key })
    }

    async fn get(&self, user_id: &str, todo_id: &TodoId) -> Result<Option<TodoItem>, TodoError> {
        debug!("ToDoを取得中: user_id={}, todo_id={}", user_id, todo_id);

        let output = self
            .db
            .client()
            .get_item()
            .table_name(self.db.table_name())
            .key(USER_ID, Self::user_key(user_id))
            .key(TODO_ID, Self::todo_key(todo_id))
            .send()
            .await
            .map_err(|e| dynamodb_error("GetItem", e))?;

        output.item.as_ref().map(item_to_todo).transpose()
    }

    async fn put(&self, todo: &TodoItem) -> Result<(), TodoError> {
        info!(
            "ToDoを保存中: user_id={}, todo_id={}",
            todo.user_id, todo.todo_id
        );

        self.db
            .client()
            .put_item()
            .table_name(self.db.table_name())
            .set_item(Some(todo_to_item(todo)))
            .send()
            .await
            .map_err(|e| dynamodb_error("PutItem", e))?;

        Ok(())
    }

    async fn update(
        &self,
        user_id: &str,
        todo_id: &TodoId,
        update: &UpdateTodoRequest,
    ) -> Result<(), TodoError> {
        info!("ToDoを更新中: user_id={}, todo_id={}", user_id, todo_id);

        // name は予約語のため別名を使う
        let mut request = self
            .db
            .client()
            .update_item()
            .table_name(self.db.table_name())
            .key(USER_ID, Self::user_key(user_id))
            .key(TODO_ID, Self::todo_key(todo_id))
            .condition_expression("attribute_exists(todoId)")
            .expression_attribute_names("#n", NAME)
            .expression_attribute_values(":n", AttributeValue::S(update.name.trim().to_string()))
            .expression_attribute_values(":done", AttributeValue::Bool(update.done));

        request = if update.due_date.is_empty() {
            request.update_expression("SET #n = :n, done = :done REMOVE dueDate")
        } else {
            request
                .update_expression("SET #n = :n, dueDate = :dueDate, done = :done")
                .expression_attribute_values(
                    ":dueDate",
                    AttributeValue::S(update.due_date.clone()),
                )
        };

        request
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if missing {
                    TodoError::NotFound(todo_id.to_string())
                } else {
                    dynamodb_error("UpdateItem", e)
                }
            })?;

        Ok(())
    }

    async fn set_attachment(
        &self,
        user_id: &str,
        todo_id: &TodoId,
        attachment: Option<&Attachment>,
    ) -> Result<(), TodoError> {
        info!(
            "添付画像の参照を更新中: user_id={}, todo_id={}, image_id={:?}",
            user_id,
            todo_id,
            attachment.map(|a| a.image_id.as_str())
        );

        let mut request = self
            .db
            .client()
            .update_item()
            .table_name(self.db.table_name())
            .key(USER_ID, Self::user_key(user_id))
            .key(TODO_ID, Self::todo_key(todo_id))
            .condition_expression("attribute_exists(todoId)");

        request = match attachment {
            Some(attachment) => request
                .update_expression("SET attachmentUrl = :attachmentUrl, imageId = :imageId")
                .expression_attribute_values(
                    ":attachmentUrl",
                    AttributeValue::S(attachment.url.clone()),
                )
                .expression_attribute_values(
                    ":imageId",
                    AttributeValue::S(attachment.image_id.clone()),
                ),
            None => request.update_expression("REMOVE attachmentUrl, imageId"),
        };

        request.send().await.map_err(|e| {
            let missing = e
                .as_service_error()
                .map(|se| se.is_conditional_check_failed_exception())
                .unwrap_or(false);
            if missing {
                TodoError::NotFound(todo_id.to_string())
            } else {
                dynamodb_error("UpdateItem", e)
            }
        })?;

        Ok(())
    }

    async fn find_by_image_id(&self, image_id: &str) -> Result<Option<TodoItem>, TodoError> {
        info!("画像IDでToDoを検索中: image_id={}", image_id);

        // フィルタはページ単位で適用されるため、見つかるまで全ページを走査する
        let mut start_key = None;
        loop {
            let output = self
                .db
                .client()
                .scan()
                .table_name(self.db.table_name())
                .filter_expression("imageId = :imageId")
                .expression_attribute_values(":imageId", AttributeValue::S(image_id.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| dynamodb_error("Scan", e))?;

            let items = output.items.unwrap_or_default();
            if let Some(item) = items.first() {
                return item_to_todo(item).map(Some);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => {
                    debug!("画像IDに一致するToDoはありません: image_id={}", image_id);
                    return Ok(None);
                }
            }
        }
    }

    async fn delete(&self, user_id: &str, todo_id: &TodoId) -> Result<(), TodoError> {
        info!("ToDoを削除中: user_id={}, todo_id={}", user_id, todo_id);

        self.db
            .client()
            .delete_item()
            .table_name(self.db.table_name())
            .key(USER_ID, Self::user_key(user_id))
            .key(TODO_ID, Self::todo_key(todo_id))
            .send()
            .await
            .map_err(|e| dynamodb_error("DeleteItem", e))?;

        Ok(())
    }
}
