use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, FineId, LoanId, MemberNumber};

/// 破損返却時に自動発行される罰金の理由
pub const DAMAGE_REASON: &str = "book returned damaged";

/// 罰金ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FineStatus {
    /// 未払い（新規貸出をブロックする）
    Pending,
    /// 支払済み
    Paid,
}

impl FineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FineStatus::Pending => "pending",
            FineStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for FineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FineStatus::Pending),
            "paid" => Ok(FineStatus::Paid),
            _ => Err(format!("Invalid fine status: {}", s)),
        }
    }
}

/// 罰金
///
/// 司書による手動発行、または破損返却の副作用として作成される。
/// Pending → Paidへ一度だけ遷移する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fine {
    pub id: FineId,
    pub member_number: MemberNumber,
    pub loan_id: Option<LoanId>,
    pub reason: String,
    pub amount: Amount,
    pub issued_at: DateTime<Utc>,
    pub status: FineStatus,
}

impl Fine {
    pub fn is_pending(&self) -> bool {
        self.status == FineStatus::Pending
    }
}
