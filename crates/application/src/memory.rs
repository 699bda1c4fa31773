//! 開発・テスト用のインメモリ実装
//!
//! DynamoDB のインデックス問い合わせ（降順・Limit・ExclusiveStartKey）と
//! S3 のオブジェクト操作を最小限に再現する。

use async_trait::async_trait;
use chrono::SecondsFormat;
use domain::{
    image_key, Attachment, AttachmentStorage, PageCursor, TodoError, TodoId, TodoItem, TodoOrder,
    TodoPage, TodoRepository, UpdateTodoRequest,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, TodoError> {
    mutex
        .lock()
        .map_err(|_| TodoError::Internal("インメモリストアのロック取得に失敗".to_string()))
}

/// インデックスのソートキー値（createdAt はテーブルと同じ文字列表現）
fn sort_value(todo: &TodoItem, order: TodoOrder) -> String {
    match order {
        TodoOrder::CreatedAt => todo.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        TodoOrder::DueDate => todo.due_date.clone(),
    }
}

fn last_evaluated_key(todo: &TodoItem, order: TodoOrder) -> Result<PageCursor, TodoError> {
    let mut key = BTreeMap::new();
    key.insert("userId".to_string(), todo.user_id.clone());
    key.insert("todoId".to_string(), todo.todo_id.to_string());
    key.insert(order.sort_attribute().to_string(), sort_value(todo, order));
    Ok(PageCursor::from_key_map(key)?)
}

/// ToDo テーブルのインメモリ版
#[derive(Default)]
pub struct InMemoryTodoRepository {
    // (userId, todoId) -> ToDo
    todos: Mutex<HashMap<(String, String), TodoItem>>,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みの件数（テスト観測用）
    pub fn len(&self) -> usize {
        self.todos.lock().map(|todos| todos.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn list(
        &self,
        user_id: &str,
        order: TodoOrder,
        limit: u32,
        cursor: Option<&PageCursor>,
    ) -> Result<TodoPage, TodoError> {
        let todos = lock(&self.todos)?;

        // 期日が空の ToDo は期日インデックスに載らない
        let mut entries: Vec<(String, &TodoItem)> = todos
            .values()
            .filter(|todo| todo.user_id == user_id)
            .map(|todo| (sort_value(todo, order), todo))
            .filter(|(sort, _)| order == TodoOrder::CreatedAt || !sort.is_empty())
            .collect();
        entries.sort_by(|(a_sort, a), (b_sort, b)| {
            b_sort
                .cmp(a_sort)
                .then_with(|| b.todo_id.as_str().cmp(a.todo_id.as_str()))
        });

        let start = match cursor {
            Some(cursor) => {
                let sort = cursor.get(order.sort_attribute()).ok_or_else(|| {
                    TodoError::DynamoDb(format!(
                        "ExclusiveStartKey に {} がありません",
                        order.sort_attribute()
                    ))
                })?;
                let todo_id = cursor.get("todoId").unwrap_or_default();
                entries
                    .iter()
                    .position(|(s, todo)| {
                        (s.as_str(), todo.todo_id.as_str()) < (sort, todo_id)
                    })
                    .unwrap_or(entries.len())
            }
            None => 0,
        };

        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let items: Vec<TodoItem> = entries
            .iter()
            .skip(start)
            .take(limit)
            .map(|(_, todo)| (*todo).clone())
            .collect();

        // DynamoDB と同じく、Limit に達したら後続の有無にかかわらず再開キーを返す
        let next_key = match items.last() {
            Some(last) if items.len() == limit => Some(last_evaluated_key(last, order)?),
            _ => None,
        };

        Ok(TodoPage { items, next_key })
    }

    async fn get(&self, user_id: &str, todo_id: &TodoId) -> Result<Option<TodoItem>, TodoError> {
        let todos = lock(&self.todos)?;
        Ok(todos
            .get(&(user_id.to_string(), todo_id.to_string()))
            .cloned())
    }

    async fn put(&self, todo: &TodoItem) -> Result<(), TodoError> {
        lock(&self.todos)?.insert(
            (todo.user_id.clone(), todo.todo_id.to_string()),
            todo.clone(),
        );
        Ok(())
    }

    async fn update(
        &self,
        user_id: &str,
        todo_id: &TodoId,
        update: &UpdateTodoRequest,
    ) -> Result<(), TodoError> {
        let mut todos = lock(&self.todos)?;
        let todo = todos
            .get_mut(&(user_id.to_string(), todo_id.to_string()))
            .ok_or_else(|| TodoError::NotFound(todo_id.to_string()))?;
        todo.apply_update(update);
        Ok(())
    }

    async fn set_attachment(
        &self,
        user_id: &str,
        todo_id: &TodoId,
        attachment: Option<&Attachment>,
    ) -> Result<(), TodoError> {
        let mut todos = lock(&self.todos)?;
        let todo = todos
            .get_mut(&(user_id.to_string(), todo_id.to_string()))
            .ok_or_else(|| TodoError::NotFound(todo_id.to_string()))?;
        todo.set_attachment(attachment);
        Ok(())
    }

    async fn find_by_image_id(&self, image_id: &str) -> Result<Option<TodoItem>, TodoError> {
        let todos = lock(&self.todos)?;
        Ok(todos
            .values()
            .find(|todo| todo.image_id.as_deref() == Some(image_id))
            .cloned())
    }

    async fn delete(&self, user_id: &str, todo_id: &TodoId) -> Result<(), TodoError> {
        lock(&self.todos)?.remove(&(user_id.to_string(), todo_id.to_string()));
        Ok(())
    }
}

/// 添付画像バケットのインメモリ版
pub struct InMemoryAttachmentStorage {
    bucket: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_deletes: AtomicBool,
}

impl Default for InMemoryAttachmentStorage {
    fn default() -> Self {
        Self::new("todo-attachments-test")
    }
}

impl InMemoryAttachmentStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// オブジェクトを直接置く（アップロードの代わり）
    pub fn insert_object(&self, key: impl Into<String>, body: Vec<u8>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.into(), body);
        }
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// 以降の削除を失敗させる
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AttachmentStorage for InMemoryAttachmentStorage {
    fn attachment_url(&self, image_id: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, image_key(image_id))
    }

    async fn upload_url(&self, image_id: &str) -> Result<String, TodoError> {
        Ok(format!(
            "{}?X-Amz-Signature=in-memory",
            self.attachment_url(image_id)
        ))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, TodoError> {
        lock(&self.objects)?
            .get(key)
            .cloned()
            .ok_or_else(|| TodoError::Storage(format!("NoSuchKey: {key}")))
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), TodoError> {
        lock(&self.objects)?.insert(key.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), TodoError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(TodoError::Storage(format!("AccessDenied: {key}")));
        }
        // S3 と同じく存在しないキーの削除は成功扱い
        lock(&self.objects)?.remove(key);
        Ok(())
    }
}
