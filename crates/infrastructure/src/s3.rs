use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use domain::{image_key, AttachmentStorage, TodoError};
use shared::Config;
use std::time::Duration;
use tracing::{debug, info};

fn storage_error<E>(operation: &str, error: E) -> TodoError
where
    E: std::error::Error + 'static,
{
    TodoError::Storage(format!("{operation} 失敗: {}", DisplayErrorContext(error)))
}

/// 添付画像を保存する S3 バケット
#[derive(Clone)]
pub struct S3AttachmentStorage {
    client: Client,
    bucket: String,
    upload_url_expiration: Duration,
}

impl S3AttachmentStorage {
    pub fn new(client: Client, bucket: impl Into<String>, upload_url_expiration: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            upload_url_expiration,
        }
    }

    /// 読み込み済みの SDK 設定を DynamoDB クライアントと共有する
    pub fn from_sdk_config(sdk_config: &SdkConfig, config: &Config) -> Self {
        Self::new(
            Client::new(sdk_config),
            &config.attachment_bucket,
            Duration::from_secs(config.signed_url_expiration_secs),
        )
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// バケット名と画像IDから公開URLを組み立てる
pub fn public_attachment_url(bucket: &str, image_id: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/{}", image_key(image_id))
}

#[async_trait]
impl AttachmentStorage for S3AttachmentStorage {
    fn attachment_url(&self, image_id: &str) -> String {
        public_attachment_url(&self.bucket, image_id)
    }

    async fn upload_url(&self, image_id: &str) -> Result<String, TodoError> {
        info!("署名付きアップロードURLを発行: image_id={}", image_id);

        let presigning = PresigningConfig::expires_in(self.upload_url_expiration)
            .map_err(|e| TodoError::Storage(format!("署名設定エラー: {e}")))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(image_key(image_id))
            .presigned(presigning)
            .await
            .map_err(|e| storage_error("PutObject 署名", e))?;

        Ok(request.uri().to_string())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, TodoError> {
        debug!("オブジェクトを取得中: bucket={}, key={}", self.bucket, key);

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("GetObject", e))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| TodoError::Storage(format!("オブジェクト本文の読み込みに失敗: {e}")))?;

        Ok(body.into_bytes().to_vec())
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), TodoError> {
        debug!(
            "オブジェクトを保存中: bucket={}, key={}, size={}",
            self.bucket,
            key,
            body.len()
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| storage_error("PutObject", e))?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), TodoError> {
        info!("オブジェクトを削除中: bucket={}, key={}", self.bucket, key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("DeleteObject", e))?;

        Ok(())
    }
}
