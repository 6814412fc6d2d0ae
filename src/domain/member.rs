use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DocumentId, MemberNumber};

/// 登録済み会員
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub number: MemberNumber,
    pub name: String,
    pub document_id: DocumentId,
    pub registered_at: DateTime<Utc>,
}

/// 採番前の会員
///
/// 会員番号はストアが挿入時に割り当てる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub name: String,
    pub document_id: DocumentId,
    pub registered_at: DateTime<Utc>,
}

impl NewMember {
    pub fn with_number(self, number: MemberNumber) -> Member {
        Member {
            number,
            name: self.name,
            document_id: self.document_id,
            registered_at: self.registered_at,
        }
    }
}
