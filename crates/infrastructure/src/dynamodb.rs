use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::Client;
use shared::{AppError, Config};
use tracing::info;

/// 設定に従って AWS SDK の共通設定を読み込む
pub async fn load_sdk_config(config: &Config) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .load()
        .await
}

#[derive(Clone)]
pub struct DynamoDbClient {
    client: Client,
    table_name: String,
}

impl DynamoDbClient {
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        let sdk_config = load_sdk_config(config).await;
        Self::from_sdk_config(&sdk_config, config)
    }

    /// 読み込み済みの SDK 設定からクライアントを作る（S3 と共有するため）
    pub fn from_sdk_config(sdk_config: &SdkConfig, config: &Config) -> Result<Self, AppError> {
        if config.todos_table.trim().is_empty() {
            return Err(AppError::Configuration(
                "TODOS_TABLE が設定されていません".to_string(),
            ));
        }

        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        // DynamoDB Local 向けにはエンドポイントとダミー認証情報を差し込む
        if let Some(endpoint) = &config.dynamodb_endpoint {
            info!("DynamoDB エンドポイントを上書き: {}", endpoint);
            builder = builder
                .endpoint_url(endpoint)
                .credentials_provider(Credentials::new("local", "local", None, None, "static"));
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            table_name: config.todos_table.clone(),
        })
    }

    pub fn from_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sdk_config() -> SdkConfig {
        SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("ap-northeast-1"))
            .build()
    }

    #[test]
    fn test_from_sdk_config() {
        let config = Config::from_lookup(|key| match key {
            "TODOS_TABLE" => Some("Todos-test".to_string()),
            "DYNAMODB_ENDPOINT" => Some("http://localhost:8000".to_string()),
            _ => None,
        })
        .unwrap();

        let client = DynamoDbClient::from_sdk_config(&sdk_config(), &config).unwrap();
        assert_eq!(client.table_name(), "Todos-test");
        assert_eq!(
            client.client().config().region().map(|r| r.to_string()),
            Some("ap-northeast-1".to_string())
        );
    }

    #[test]
    fn test_from_sdk_config_requires_table() {
        let config =
            Config::from_lookup(|key| (key == "TODOS_TABLE").then(|| " ".to_string())).unwrap();
        assert!(matches!(
            DynamoDbClient::from_sdk_config(&sdk_config(), &config),
            Err(AppError::Configuration(_))
        ));
    }
}
