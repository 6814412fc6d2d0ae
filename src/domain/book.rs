use serde::{Deserialize, Serialize};

use super::BookCode;

/// 書籍の貸出可否
///
/// 不変条件：Loanedは、その書籍を参照するActiveな貸出がちょうど1件ある場合に限る。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    /// 貸出可能
    Available,
    /// 貸出中
    Loaned,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Loaned => "loaned",
        }
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(BookStatus::Available),
            "loaned" => Ok(BookStatus::Loaned),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

/// 目録に登録された書籍
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub code: BookCode,
    pub title: String,
    pub author: String,
    pub cover_image_url: Option<String>,
    pub status: BookStatus,
}

impl Book {
    /// 新規登録された書籍は常に貸出可能
    pub fn catalogue(
        code: BookCode,
        title: String,
        author: String,
        cover_image_url: Option<String>,
    ) -> Self {
        Self {
            code,
            title,
            author,
            cover_image_url,
            status: BookStatus::Available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == BookStatus::Available
    }
}
