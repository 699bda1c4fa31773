use std::env;

/// Lambda 関数共通の設定（環境変数から読み込む）
#[derive(Debug, Clone)]
pub struct Config {
    pub todos_table: String,
    pub created_at_index: String,
    pub due_date_index: String,
    pub attachment_bucket: String,
    pub signed_url_expiration_secs: u64,
    pub environment: String,
    pub aws_region: String,
    pub dynamodb_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー検索関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let signed_url_expiration_secs = match lookup("SIGNED_URL_EXPIRATION") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                format!("SIGNED_URL_EXPIRATION が不正です: {raw} ({e})")
            })?,
            None => 300,
        };

        Ok(Config {
            todos_table: var("TODOS_TABLE", "todos-dev"),
            created_at_index: var("TODOS_CREATED_AT_INDEX", "CreatedAtIndex"),
            due_date_index: var("TODOS_DUE_DATE_INDEX", "DueDateIndex"),
            attachment_bucket: var("ATTACHMENT_S3_BUCKET", "todo-attachments-dev"),
            signed_url_expiration_secs,
            environment: var("ENVIRONMENT", "dev"),
            aws_region: var("AWS_REGION", "us-east-1"),
            dynamodb_endpoint: lookup("DYNAMODB_ENDPOINT").filter(|s| !s.trim().is_empty()),
        })
    }
}
