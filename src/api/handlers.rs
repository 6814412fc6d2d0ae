use crate::application::{
    ServiceDependencies,
    loan::{issue_fine, list_fines, list_loans, return_loan, settle_fine, start_loan},
    registry::{
        dashboard_stats, get_book_detail, get_member_detail, list_books, list_members,
        register_book, register_member,
    },
};
use crate::domain::{
    BookCode, FineId, LoanId, MemberNumber,
    commands::{ReturnLoan, SettleFine},
};
use crate::ports::IdentityService;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    types::{
        BookDetailResponse, BookResponse, DashboardStatsResponse, FineListItemResponse,
        FineResponse, IssueFineRequest, ListFinesQuery, ListLoansQuery, LoanRecordResponse,
        LoanResponse, MemberDetailResponse, MemberResponse, RegisterBookRequest,
        RegisterMemberRequest, ReturnLoanRequest, ReturnLoanResponse, StartLoanRequest,
        parse_status_filter,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
    pub identity: Arc<dyn IdentityService>,
}

// ============================================================================
// Books
// ============================================================================

/// POST /books - 書籍を目録に登録
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let cmd = req.to_command()?;
    let book = register_book(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(book.into())))
}

/// GET /books - 目録コード順の書籍一覧
pub async fn get_books(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books = list_books(&state.service_deps).await?;

    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// GET /books/:code - 書籍詳細（貸出履歴付き）
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    ApiPath(code): ApiPath<String>,
) -> Result<Json<BookDetailResponse>, ApiError> {
    let code = BookCode::parse(&code)?;
    let detail = get_book_detail(&state.service_deps, code).await?;

    Ok(Json(detail.into()))
}

// ============================================================================
// Members
// ============================================================================

/// POST /members - 会員を登録
///
/// 会員番号はストアが採番する。身分証番号の重複は409。
pub async fn create_member(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    let cmd = req.to_command(Utc::now())?;
    let member = register_member(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(member.into())))
}

/// GET /members - 会員番号順の会員一覧
pub async fn get_members(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    let members = list_members(&state.service_deps).await?;

    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// GET /members/:number - 会員詳細（貸出中の貸出・未払い罰金付き）
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    ApiPath(number): ApiPath<i64>,
) -> Result<Json<MemberDetailResponse>, ApiError> {
    let detail = get_member_detail(&state.service_deps, MemberNumber::new(number)).await?;

    Ok(Json(detail.into()))
}

// ============================================================================
// Loans
// ============================================================================

/// POST /loans - 新しい貸出を作成
///
/// 強制されるビジネスルール（この順序で判定）:
/// - 会員が存在すること
/// - 会員に貸出中の貸出がないこと
/// - 会員に未払いの罰金がないこと
/// - 書籍が存在すること
/// - 書籍が貸出可能であること
pub async fn create_loan(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<StartLoanRequest>,
) -> Result<(StatusCode, Json<LoanRecordResponse>), ApiError> {
    let cmd = req.to_command(Utc::now())?;
    let loan = start_loan(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(loan.into())))
}

/// POST /loans/:id/return - 書籍を返却
///
/// ボディ `{"damaged": true}` の場合は破損の罰金を発行する。
/// 空のボディは破損なし。Content-Typeは問わないが、解釈できないボディは400。
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    ApiPath(loan_id): ApiPath<Uuid>,
    body: Bytes,
) -> Result<Json<ReturnLoanResponse>, ApiError> {
    let req = ReturnLoanRequest::from_body(&body).map_err(ApiError::BadRequest)?;

    let cmd = ReturnLoan {
        loan_id: LoanId::from_uuid(loan_id),
        damaged: req.damaged,
        returned_at: Utc::now(),
    };
    let outcome = return_loan(&state.service_deps, cmd).await?;

    Ok(Json(outcome.into()))
}

/// GET /loans - 貸出一覧（?status=active|returned）
pub async fn get_loans(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListLoansQuery>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(parse_status_filter)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let loans = list_loans(&state.service_deps, status).await?;

    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

// ============================================================================
// Fines
// ============================================================================

/// POST /fines - 罰金を発行
///
/// 金額を省略した場合は既定額。
pub async fn create_fine(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<IssueFineRequest>,
) -> Result<(StatusCode, Json<FineResponse>), ApiError> {
    let cmd = req.to_command(Utc::now())?;
    let fine = issue_fine(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(fine.into())))
}

/// POST /fines/:id/settle - 罰金を精算（支払済みでも成功）
pub async fn settle(
    State(state): State<Arc<AppState>>,
    ApiPath(fine_id): ApiPath<Uuid>,
) -> Result<Json<FineResponse>, ApiError> {
    let cmd = SettleFine {
        fine_id: FineId::from_uuid(fine_id),
    };
    let fine = settle_fine(&state.service_deps, cmd).await?;

    Ok(Json(fine.into()))
}

/// GET /fines - 罰金一覧（?member_number=）
pub async fn get_fines(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListFinesQuery>,
) -> Result<Json<Vec<FineListItemResponse>>, ApiError> {
    let fines = list_fines(
        &state.service_deps,
        query.member_number.map(MemberNumber::new),
    )
    .await?;

    Ok(Json(
        fines.into_iter().map(FineListItemResponse::from).collect(),
    ))
}

// ============================================================================
// Dashboard
// ============================================================================

/// GET /dashboard/stats
pub async fn get_dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStatsResponse>, ApiError> {
    let stats = dashboard_stats(&state.service_deps).await?;

    Ok(Json(stats.into()))
}
