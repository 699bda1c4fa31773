use domain::{DomainError, TodoError};
use thiserror::Error;

/// 不正なページングパラメータに対する固定メッセージ
pub const INVALID_PARAMETERS_MESSAGE: &str = "invalid parameters";

/// アプリケーション全体で使用されるエラー型
#[derive(Debug, Clone, Error)]
pub enum AppError {
    // ドメインエラー
    #[error("Domain error: {0}")]
    Domain(DomainError),

    // インフラストラクチャエラー
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // 認証エラー
    #[error("Authentication failed: {0}")]
    Authentication(String),

    // ビジネスロジックエラー
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    // システムエラー
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// エラーの重要度
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 情報レベル
    Info,
    /// 警告レベル
    Warning,
    /// エラーレベル
    Error,
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        if error.is_invalid_parameter() {
            AppError::InvalidParameters(error.to_string())
        } else {
            AppError::Domain(error)
        }
    }
}

impl From<TodoError> for AppError {
    fn from(error: TodoError) -> Self {
        match error {
            TodoError::Validation(msg) => AppError::Validation(msg),
            TodoError::InvalidParameters(msg) => AppError::InvalidParameters(msg),
            TodoError::NotFound(msg) => AppError::NotFound(msg),
            TodoError::DynamoDb(msg) => AppError::DynamoDb(msg),
            TodoError::Storage(msg) => AppError::Storage(msg),
            TodoError::Image(msg) => AppError::Internal(format!("画像処理エラー: {msg}")),
            TodoError::Internal(msg) => AppError::Internal(msg),
            TodoError::Domain(e) => AppError::from(e),
        }
    }
}

impl AppError {
    /// エラーコードを取得
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Domain(_) => "DOMAIN_ERROR",
            AppError::DynamoDb(_) => "DYNAMODB_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Deserialization(_) => "DESERIALIZATION_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidParameters(_) => "INVALID_PARAMETERS",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::NotFound(_)
            | AppError::Validation(_)
            | AppError::InvalidParameters(_)
            | AppError::Deserialization(_)
            | AppError::Domain(_) => ErrorSeverity::Info,
            AppError::Authentication(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// HTTPステータスコードを取得
    pub fn http_status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Authentication(_) => 401,
            AppError::Domain(_)
            | AppError::Validation(_)
            | AppError::InvalidParameters(_)
            | AppError::Deserialization(_) => 400,
            _ => 500,
        }
    }

    /// ユーザー向けメッセージを取得
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidParameters(_) => INVALID_PARAMETERS_MESSAGE.to_string(),
            AppError::NotFound(_) => "リソースが見つかりません".to_string(),
            AppError::Authentication(_) => "認証に失敗しました".to_string(),
            AppError::Validation(msg) => format!("入力データが無効です: {msg}"),
            AppError::Domain(e) => format!("入力データが無効です: {e}"),
            AppError::Deserialization(_) => "リクエストボディが不正です".to_string(),
            _ => "予期しないエラーが発生しました".to_string(),
        }
    }

    /// エラーを重要度に応じたレベルでログに記録
    pub fn log(&self) {
        match self.severity() {
            ErrorSeverity::Error => {
                tracing::error!(error = %self, code = self.code(), "Error occurred");
            }
            ErrorSeverity::Warning => {
                tracing::warn!(error = %self, code = self.code(), "Warning occurred");
            }
            ErrorSeverity::Info => {
                tracing::info!(error = %self, code = self.code(), "Client error occurred");
            }
        }
    }
}
