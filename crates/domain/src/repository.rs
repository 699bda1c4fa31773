//! ストレージ層の抽象
//!
//! ビジネスロジックはこのトレイト越しにテーブルとオブジェクトストレージを扱う。
//! 本番実装は `infrastructure`、テスト用のインメモリ実装は `application::memory`。

use crate::errors::TodoError;
use crate::pagination::{PageCursor, TodoOrder, TodoPage};
use crate::todo::{Attachment, TodoId, TodoItem, UpdateTodoRequest};
use async_trait::async_trait;

#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// ユーザーのToDoを並び順に従って降順で1ページ分取得する
    async fn list(
        &self,
        user_id: &str,
        order: TodoOrder,
        limit: u32,
        cursor: Option<&PageCursor>,
    ) -> Result<TodoPage, TodoError>;

    async fn get(&self, user_id: &str, todo_id: &TodoId) -> Result<Option<TodoItem>, TodoError>;

    async fn put(&self, todo: &TodoItem) -> Result<(), TodoError>;

    /// 名前・期日・完了フラグを更新する。存在しない場合は `NotFound`。
    async fn update(
        &self,
        user_id: &str,
        todo_id: &TodoId,
        update: &UpdateTodoRequest,
    ) -> Result<(), TodoError>;

    /// 添付画像の参照を設定する。`None` で参照を外す。
    async fn set_attachment(
        &self,
        user_id: &str,
        todo_id: &TodoId,
        attachment: Option<&Attachment>,
    ) -> Result<(), TodoError>;

    async fn find_by_image_id(&self, image_id: &str) -> Result<Option<TodoItem>, TodoError>;

    async fn delete(&self, user_id: &str, todo_id: &TodoId) -> Result<(), TodoError>;
}

#[async_trait]
pub trait AttachmentStorage: Send + Sync {
    /// 画像IDに対応する公開URL
    fn attachment_url(&self, image_id: &str) -> String;

    /// 画像アップロード用の署名付きURLを発行する
    async fn upload_url(&self, image_id: &str) -> Result<String, TodoError>;

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, TodoError>;

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), TodoError>;

    async fn delete_object(&self, key: &str) -> Result<(), TodoError>;
}
