use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Invalid TodoId: {0}")]
    InvalidTodoId(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid page cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid page limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid sort order: {0}")]
    InvalidOrder(String),
}

impl DomainError {
    /// ページングパラメータ由来のエラーかどうか
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidCursor(_) | DomainError::InvalidLimit(_) | DomainError::InvalidOrder(_)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum TodoError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Todo not found: {0}")]
    NotFound(String),

    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_classification() {
        assert!(DomainError::InvalidCursor("x".to_string()).is_invalid_parameter());
        assert!(DomainError::InvalidLimit("0".to_string()).is_invalid_parameter());
        assert!(DomainError::InvalidOrder("name".to_string()).is_invalid_parameter());
        assert!(!DomainError::Validation("name".to_string()).is_invalid_parameter());
        assert!(!DomainError::InvalidTodoId("".to_string()).is_invalid_parameter());
    }

    #[test]
    fn test_domain_error_converts_into_todo_error() {
        let error: TodoError = DomainError::InvalidTodoId("abc".to_string()).into();
        assert!(matches!(error, TodoError::Domain(DomainError::InvalidTodoId(_))));
        assert!(error.to_string().contains("abc"));
    }
}
