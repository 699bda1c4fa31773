use crate::errors::DomainError;
use crate::todo::TodoItem;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::collections::BTreeMap;

/// 一覧取得のデフォルト件数
pub const DEFAULT_PAGE_LIMIT: u32 = 9;

/// 一覧の並び順（いずれも降順）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TodoOrder {
    #[default]
    CreatedAt,
    DueDate,
}

impl TodoOrder {
    /// `orderBy` クエリパラメータを解釈する。未指定は作成日時順。
    pub fn parse(value: Option<&str>) -> Result<Self, DomainError> {
        match value.map(str::trim) {
            None | Some("") | Some("createdAt") => Ok(TodoOrder::CreatedAt),
            Some("dueDate") => Ok(TodoOrder::DueDate),
            Some(other) => Err(DomainError::InvalidOrder(other.to_string())),
        }
    }

    /// インデックスのソートキー属性名
    pub fn sort_attribute(&self) -> &'static str {
        match self {
            TodoOrder::CreatedAt => "createdAt",
            TodoOrder::DueDate => "dueDate",
        }
    }
}

/// `limit` クエリパラメータを解釈する。未指定はデフォルト件数。
pub fn parse_limit(value: Option<&str>) -> Result<u32, DomainError> {
    match value.map(str::trim) {
        None | Some("") => Ok(DEFAULT_PAGE_LIMIT),
        Some(raw) => match raw.parse::<u32>() {
            Ok(limit) if limit > 0 => Ok(limit),
            _ => Err(DomainError::InvalidLimit(raw.to_string())),
        },
    }
}

/// テーブルの再開位置（LastEvaluatedKey）を表す不透明なカーソル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(BTreeMap<String, String>);

impl PageCursor {
    pub fn from_key_map(key: BTreeMap<String, String>) -> Result<Self, DomainError> {
        for required in ["userId", "todoId"] {
            if !key.contains_key(required) {
                return Err(DomainError::InvalidCursor(format!(
                    "{required} が含まれていません"
                )));
            }
        }
        Ok(Self(key))
    }

    pub fn key_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn user_id(&self) -> &str {
        self.0.get("userId").map(String::as_str).unwrap_or_default()
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.0.get(attribute).map(String::as_str)
    }

    /// 指定した並び順のインデックスキーとちょうど一致するか
    pub fn matches_order(&self, order: TodoOrder) -> bool {
        let expected = ["userId", "todoId", order.sort_attribute()];
        self.0.len() == expected.len() && expected.iter().all(|key| self.0.contains_key(*key))
    }

    /// クエリパラメータにそのまま載せられる文字列へ変換
    pub fn encode(&self) -> String {
        // BTreeMap<String, String> のシリアライズは失敗しない
        let json = serde_json::to_vec(&self.0).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, DomainError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| DomainError::InvalidCursor(format!("base64デコードエラー: {e}")))?;
        let key: BTreeMap<String, String> = serde_json::from_slice(&bytes)
            .map_err(|e| DomainError::InvalidCursor(format!("JSONパースエラー: {e}")))?;
        Self::from_key_map(key)
    }

    /// `nextKey` クエリパラメータを解釈する。空文字は未指定扱い。
    pub fn parse(value: Option<&str>) -> Result<Option<Self>, DomainError> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(token) => Self::decode(token).map(Some),
        }
    }
}

/// 一覧取得のリクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub order: TodoOrder,
    pub cursor: Option<PageCursor>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            order: TodoOrder::default(),
            cursor: None,
        }
    }
}

/// 一覧取得の結果ページ
#[derive(Debug, Clone, Default)]
pub struct TodoPage {
    pub items: Vec<TodoItem>,
    pub next_key: Option<PageCursor>,
}
