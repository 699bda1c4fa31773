use crate::thumbnail::resize_to_width;
use domain::{
    image_id_from_key, image_key, resized_image_id, Attachment, AttachmentStorage,
    CreateTodoRequest, DomainError, PageRequest, TodoError, TodoId, TodoItem, TodoPage,
    TodoRepository, UpdateTodoRequest, RESIZED_IMAGE_WIDTH,
};
use tracing::{debug, info, warn};

/// ToDo の更新結果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// 画像差し替え時のアップロードURL（差し替えなしは空文字）
    pub upload_url: String,
}

/// アップロード画像の処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageProcessOutcome {
    /// リサイズ済み・対象外のキーなので何もしなかった
    Skipped,
    /// リサイズ済み画像を保存した。`relinked` は ToDo の参照を付け替えたかどうか
    Resized {
        resized_image_id: String,
        relinked: bool,
    },
}

/// ToDo のビジネスロジック
pub struct TodoService<R, S> {
    repository: R,
    storage: S,
}

impl<R, S> TodoService<R, S>
where
    R: TodoRepository,
    S: AttachmentStorage,
{
    pub fn new(repository: R, storage: S) -> Self {
        Self {
            repository,
            storage,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// ToDo一覧を1ページ取得する
    pub async fn list_todos(
        &self,
        user_id: &str,
        request: PageRequest,
    ) -> Result<TodoPage, TodoError> {
        if let Some(cursor) = &request.cursor {
            if cursor.user_id() != user_id {
                return Err(DomainError::InvalidCursor(
                    "他のユーザーのカーソルは使用できません".to_string(),
                )
                .into());
            }
            if !cursor.matches_order(request.order) {
                return Err(DomainError::InvalidCursor(format!(
                    "並び順 {} とカーソルが一致しません",
                    request.order.sort_attribute()
                ))
                .into());
            }
        }

        let mut page = self
            .repository
            .list(user_id, request.order, request.limit, request.cursor.as_ref())
            .await?;

        // 再開キーの先が空なら最終ページとして扱う
        if let Some(next_key) = &page.next_key {
            let lookahead = self
                .repository
                .list(user_id, request.order, 1, Some(next_key))
                .await?;
            if lookahead.items.is_empty() {
                debug!("次ページが空のため nextKey を破棄: user_id={}", user_id);
                page.next_key = None;
            }
        }

        info!(
            "ToDo一覧取得: user_id={}, count={}, has_next={}",
            user_id,
            page.items.len(),
            page.next_key.is_some()
        );

        Ok(page)
    }

    pub async fn create_todo(
        &self,
        user_id: &str,
        request: CreateTodoRequest,
    ) -> Result<TodoItem, TodoError> {
        request.validate()?;

        let todo = TodoItem::new(user_id, &request);
        self.repository.put(&todo).await?;

        info!("ToDo作成: user_id={}, todo_id={}", user_id, todo.todo_id);
        Ok(todo)
    }

    pub async fn update_todo(
        &self,
        user_id: &str,
        todo_id: &TodoId,
        request: UpdateTodoRequest,
    ) -> Result<UpdateOutcome, TodoError> {
        request.validate()?;

        if request.is_update_image {
            self.delete_todo_image(user_id, todo_id).await?;
        }

        self.repository.update(user_id, todo_id, &request).await?;
        info!("ToDo更新: user_id={}, todo_id={}", user_id, todo_id);

        if !request.is_update_image {
            return Ok(UpdateOutcome::default());
        }

        let upload_url = self.create_attachment_upload_url(user_id, todo_id).await?;
        Ok(UpdateOutcome { upload_url })
    }

    /// 新しい画像IDを割り当てて、アップロード用の署名付きURLを返す
    pub async fn create_attachment_upload_url(
        &self,
        user_id: &str,
        todo_id: &TodoId,
    ) -> Result<String, TodoError> {
        if self.repository.get(user_id, todo_id).await?.is_none() {
            return Err(TodoError::NotFound(todo_id.to_string()));
        }

        let image_id = uuid::Uuid::new_v4().to_string();
        let attachment = Attachment {
            url: self.storage.attachment_url(&image_id),
            image_id: image_id.clone(),
        };
        self.repository
            .set_attachment(user_id, todo_id, Some(&attachment))
            .await?;

        let upload_url = self.storage.upload_url(&image_id).await?;
        info!(
            "アップロードURL発行: user_id={}, todo_id={}, image_id={}",
            user_id, todo_id, image_id
        );
        Ok(upload_url)
    }

    pub async fn delete_todo(&self, user_id: &str, todo_id: &TodoId) -> Result<(), TodoError> {
        let todo = self
            .repository
            .get(user_id, todo_id)
            .await?
            .ok_or_else(|| TodoError::NotFound(todo_id.to_string()))?;

        if let Some(attachment) = todo.attachment() {
            if let Err(e) = self
                .storage
                .delete_object(&image_key(&attachment.image_id))
                .await
            {
                warn!(
                    "添付画像の削除に失敗（ToDoの削除は続行）: todo_id={}, image_id={}, error={}",
                    todo_id, attachment.image_id, e
                );
            }
        }

        self.repository.delete(user_id, todo_id).await?;
        info!("ToDo削除: user_id={}, todo_id={}", user_id, todo_id);
        Ok(())
    }

    /// 添付画像を削除して参照を外す。画像がなければ何もしない。
    pub async fn delete_todo_image(
        &self,
        user_id: &str,
        todo_id: &TodoId,
    ) -> Result<(), TodoError> {
        let todo = self
            .repository
            .get(user_id, todo_id)
            .await?
            .ok_or_else(|| TodoError::NotFound(todo_id.to_string()))?;

        let Some(attachment) = todo.attachment() else {
            debug!("削除する添付画像なし: todo_id={}", todo_id);
            return Ok(());
        };

        self.storage
            .delete_object(&image_key(&attachment.image_id))
            .await?;
        self.repository
            .set_attachment(user_id, todo_id, None)
            .await?;

        info!(
            "添付画像削除: user_id={}, todo_id={}, image_id={}",
            user_id, todo_id, attachment.image_id
        );
        Ok(())
    }

    /// アップロードされた画像を縮小し、ToDo の参照をリサイズ済み画像に付け替える
    pub async fn process_uploaded_image(
        &self,
        key: &str,
    ) -> Result<ImageProcessOutcome, TodoError> {
        let Some(image_id) = image_id_from_key(key) else {
            debug!("処理対象外のキー: {}", key);
            return Ok(ImageProcessOutcome::Skipped);
        };

        let original = self.storage.get_object(key).await?;
        let resized = resize_to_width(&original, RESIZED_IMAGE_WIDTH)?;

        let resized_id = resized_image_id(image_id);
        self.storage
            .put_object(&image_key(&resized_id), resized)
            .await?;

        let relinked = match self.repository.find_by_image_id(image_id).await? {
            Some(todo) => {
                let attachment = Attachment {
                    url: self.storage.attachment_url(&resized_id),
                    image_id: resized_id.clone(),
                };
                self.repository
                    .set_attachment(&todo.user_id, &todo.todo_id, Some(&attachment))
                    .await?;
                true
            }
            None => {
                warn!("画像を参照するToDoがありません: image_id={}", image_id);
                false
            }
        };

        self.storage.delete_object(key).await?;

        info!(
            "画像リサイズ完了: key={}, resized_image_id={}, relinked={}",
            key, resized_id, relinked
        );
        Ok(ImageProcessOutcome::Resized {
            resized_image_id: resized_id,
            relinked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryAttachmentStorage, InMemoryTodoRepository};
    use domain::{PageCursor, TodoOrder};
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    type Service = TodoService<InMemoryTodoRepository, InMemoryAttachmentStorage>;

    fn service() -> Service {
        TodoService::new(
            InMemoryTodoRepository::new(),
            InMemoryAttachmentStorage::new("bucket"),
        )
    }

    fn create(name: &str, due_date: &str) -> CreateTodoRequest {
        CreateTodoRequest {
            name: name.to_string(),
            due_date: due_date.to_string(),
        }
    }

    fn update(name: &str, is_update_image: bool) -> UpdateTodoRequest {
        UpdateTodoRequest {
            name: name.to_string(),
            due_date: "2024-07-01".to_string(),
            done: true,
            is_update_image,
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([0, 120, 255, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    async fn create_many(service: &Service, user_id: &str, count: usize) {
        for i in 0..count {
            service
                .create_todo(user_id, create(&format!("todo{i}"), "2024-01-01"))
                .await
                .unwrap();
        }
    }

    async fn collect_pages(service: &Service, user_id: &str, limit: u32) -> Vec<TodoPage> {
        let mut pages = Vec::new();
        let mut cursor = None;
        loop {
            let page = service
                .list_todos(
                    user_id,
                    PageRequest {
                        limit,
                        order: TodoOrder::CreatedAt,
                        cursor,
                    },
                )
                .await
                .unwrap();
            cursor = page.next_key.clone();
            pages.push(page);
            if cursor.is_none() {
                return pages;
            }
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let service = service();
        let todo = service
            .create_todo("alice", create("牛乳を買う", "2024-05-01"))
            .await
            .unwrap();

        assert_eq!(todo.user_id, "alice");
        assert!(!todo.done);

        let page = service
            .list_todos("alice", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items, vec![todo]);
        assert!(page.next_key.is_none());

        let other = service
            .list_todos("bob", PageRequest::default())
            .await
            .unwrap();
        assert!(other.items.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let service = service();
        let result = service.create_todo("alice", create("  ", "2024-05-01")).await;
        assert!(matches!(
            result,
            Err(TodoError::Domain(DomainError::Validation(_)))
        ));
        assert!(service.repository().is_empty());
    }

    #[tokio::test]
    async fn test_paging_has_no_trailing_empty_page() {
        let service = service();
        create_many(&service, "alice", 4).await;

        let pages = collect_pages(&service, "alice", 2).await;
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.items.len() == 2));
        assert!(pages[1].next_key.is_none());
    }

    #[tokio::test]
    async fn test_paging_partial_last_page() {
        let service = service();
        create_many(&service, "alice", 5).await;

        let pages = collect_pages(&service, "alice", 2).await;
        let sizes: Vec<usize> = pages.iter().map(|p| p.items.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_foreign_cursor_is_rejected() {
        let service = service();
        create_many(&service, "alice", 3).await;

        let page = service
            .list_todos(
                "alice",
                PageRequest {
                    limit: 1,
                    ..PageRequest::default()
                },
            )
            .await
            .unwrap();
        let cursor: PageCursor = page.next_key.unwrap();

        let result = service
            .list_todos(
                "bob",
                PageRequest {
                    cursor: Some(cursor),
                    ..PageRequest::default()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(TodoError::Domain(DomainError::InvalidCursor(_)))
        ));
    }

    #[tokio::test]
    async fn test_cursor_from_other_order_is_rejected() {
        let service = service();
        create_many(&service, "alice", 3).await;

        let page = service
            .list_todos(
                "alice",
                PageRequest {
                    limit: 1,
                    order: TodoOrder::DueDate,
                    cursor: None,
                },
            )
            .await
            .unwrap();
        let cursor: PageCursor = page.next_key.unwrap();

        let result = service
            .list_todos(
                "alice",
                PageRequest {
                    limit: 1,
                    order: TodoOrder::CreatedAt,
                    cursor: Some(cursor),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(TodoError::Domain(DomainError::InvalidCursor(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_without_image() {
        let service = service();
        let todo = service
            .create_todo("alice", create("before", "2024-05-01"))
            .await
            .unwrap();

        let outcome = service
            .update_todo("alice", &todo.todo_id, update("after", false))
            .await
            .unwrap();
        assert_eq!(outcome.upload_url, "");

        let stored = service
            .repository()
            .get("alice", &todo.todo_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "after");
        assert_eq!(stored.due_date, "2024-07-01");
        assert!(stored.done);
    }

    #[tokio::test]
    async fn test_update_missing_todo_is_not_found() {
        let service = service();
        let result = service
            .update_todo("alice", &TodoId::new(), update("x", false))
            .await;
        assert!(matches!(result, Err(TodoError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_with_image_replaces_attachment() {
        let service = service();
        let todo = service
            .create_todo("alice", create("写真", "2024-05-01"))
            .await
            .unwrap();
        service
            .create_attachment_upload_url("alice", &todo.todo_id)
            .await
            .unwrap();
        let old = service
            .repository()
            .get("alice", &todo.todo_id)
            .await
            .unwrap()
            .unwrap()
            .attachment()
            .unwrap();
        service
            .storage()
            .insert_object(image_key(&old.image_id), png_bytes(10, 10));

        let outcome = service
            .update_todo("alice", &todo.todo_id, update("写真2", true))
            .await
            .unwrap();

        let current = service
            .repository()
            .get("alice", &todo.todo_id)
            .await
            .unwrap()
            .unwrap()
            .attachment()
            .unwrap();
        assert_ne!(current.image_id, old.image_id);
        assert!(outcome.upload_url.contains(&current.image_id));
        assert!(service.storage().object(&image_key(&old.image_id)).is_none());
    }

    #[tokio::test]
    async fn test_upload_url_sets_consistent_attachment() {
        let service = service();
        let todo = service
            .create_todo("alice", create("写真", "2024-05-01"))
            .await
            .unwrap();

        let url = service
            .create_attachment_upload_url("alice", &todo.todo_id)
            .await
            .unwrap();

        let stored = service
            .repository()
            .get("alice", &todo.todo_id)
            .await
            .unwrap()
            .unwrap();
        let attachment = stored.attachment().unwrap();
        assert!(uuid::Uuid::parse_str(&attachment.image_id).is_ok());
        assert_eq!(
            attachment.url,
            format!("https://bucket.s3.amazonaws.com/{}.png", attachment.image_id)
        );
        assert!(url.contains(&attachment.image_id));
    }

    #[tokio::test]
    async fn test_upload_url_for_missing_todo() {
        let service = service();
        let result = service
            .create_attachment_upload_url("alice", &TodoId::new())
            .await;
        assert!(matches!(result, Err(TodoError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_todo() {
        let service = service();
        let todo = service
            .create_todo("alice", create("消す", "2024-05-01"))
            .await
            .unwrap();

        service.delete_todo("alice", &todo.todo_id).await.unwrap();

        let page = service
            .list_todos("alice", PageRequest::default())
            .await
            .unwrap();
        assert!(page.items.is_empty());

        let again = service.delete_todo("alice", &todo.todo_id).await;
        assert!(matches!(again, Err(TodoError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_todo_survives_image_delete_failure() {
        let service = service();
        let todo = service
            .create_todo("alice", create("写真付き", "2024-05-01"))
            .await
            .unwrap();
        service
            .create_attachment_upload_url("alice", &todo.todo_id)
            .await
            .unwrap();
        service.storage().set_fail_deletes(true);

        service.delete_todo("alice", &todo.todo_id).await.unwrap();
        assert!(service.repository().is_empty());
    }

    #[tokio::test]
    async fn test_delete_todo_image() {
        let service = service();
        let todo = service
            .create_todo("alice", create("写真付き", "2024-05-01"))
            .await
            .unwrap();

        // 画像なしは何もしない
        service
            .delete_todo_image("alice", &todo.todo_id)
            .await
            .unwrap();

        service
            .create_attachment_upload_url("alice", &todo.todo_id)
            .await
            .unwrap();
        let image_id = service
            .repository()
            .get("alice", &todo.todo_id)
            .await
            .unwrap()
            .unwrap()
            .image_id
            .unwrap();
        service
            .storage()
            .insert_object(image_key(&image_id), png_bytes(4, 4));

        service
            .delete_todo_image("alice", &todo.todo_id)
            .await
            .unwrap();

        let stored = service
            .repository()
            .get("alice", &todo.todo_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.image_id.is_none());
        assert!(stored.attachment_url.is_none());
        assert!(service.storage().keys().is_empty());
    }

    #[tokio::test]
    async fn test_delete_todo_image_propagates_storage_error() {
        let service = service();
        let todo = service
            .create_todo("alice", create("写真付き", "2024-05-01"))
            .await
            .unwrap();
        service
            .create_attachment_upload_url("alice", &todo.todo_id)
            .await
            .unwrap();
        service.storage().set_fail_deletes(true);

        let result = service.delete_todo_image("alice", &todo.todo_id).await;
        assert!(matches!(result, Err(TodoError::Storage(_))));

        let stored = service
            .repository()
            .get("alice", &todo.todo_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.attachment().is_some());
    }

    #[tokio::test]
    async fn test_process_uploaded_image_relinks_todo() {
        let service = service();
        let todo = service
            .create_todo("alice", create("写真付き", "2024-05-01"))
            .await
            .unwrap();
        service
            .create_attachment_upload_url("alice", &todo.todo_id)
            .await
            .unwrap();
        let image_id = service
            .repository()
            .get("alice", &todo.todo_id)
            .await
            .unwrap()
            .unwrap()
            .image_id
            .unwrap();
        let key = image_key(&image_id);
        service.storage().insert_object(key.clone(), png_bytes(600, 300));

        let outcome = service.process_uploaded_image(&key).await.unwrap();
        let resized_id = format!("resize_{image_id}");
        assert_eq!(
            outcome,
            ImageProcessOutcome::Resized {
                resized_image_id: resized_id.clone(),
                relinked: true,
            }
        );

        assert_eq!(service.storage().keys(), vec![format!("{resized_id}.png")]);
        let resized = service
            .storage()
            .object(&format!("{resized_id}.png"))
            .unwrap();
        let decoded = image::load_from_memory(&resized).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (150, 75));

        let stored = service
            .repository()
            .get("alice", &todo.todo_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.image_id.as_deref(), Some(resized_id.as_str()));
        assert_eq!(
            stored.attachment_url.unwrap(),
            format!("https://bucket.s3.amazonaws.com/{resized_id}.png")
        );
    }

    #[tokio::test]
    async fn test_process_uploaded_image_without_owner() {
        let service = service();
        service
            .storage()
            .insert_object("orphan.png", png_bytes(300, 300));

        let outcome = service.process_uploaded_image("orphan.png").await.unwrap();
        assert_eq!(
            outcome,
            ImageProcessOutcome::Resized {
                resized_image_id: "resize_orphan".to_string(),
                relinked: false,
            }
        );
        assert_eq!(service.storage().keys(), vec!["resize_orphan.png"]);
    }

    #[tokio::test]
    async fn test_process_uploaded_image_skips_resized_and_foreign_keys() {
        let service = service();
        service
            .storage()
            .insert_object("resize_abc.png", png_bytes(150, 150));
        service.storage().insert_object("notes.txt", b"hi".to_vec());

        assert_eq!(
            service.process_uploaded_image("resize_abc.png").await.unwrap(),
            ImageProcessOutcome::Skipped
        );
        assert_eq!(
            service.process_uploaded_image("notes.txt").await.unwrap(),
            ImageProcessOutcome::Skipped
        );
        assert_eq!(service.storage().keys().len(), 2);
    }

    #[tokio::test]
    async fn test_process_uploaded_image_rejects_broken_image() {
        let service = service();
        service.storage().insert_object("broken.png", b"nope".to_vec());

        let result = service.process_uploaded_image("broken.png").await;
        assert!(matches!(result, Err(TodoError::Image(_))));
        assert!(service.storage().object("broken.png").is_some());
    }
}
