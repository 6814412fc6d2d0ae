use chrono::{Duration, Utc};
use futures::future::join_all;
use lending_library::application::{
    ApplicationError, ServiceDependencies,
    loan::{issue_fine, list_fines, list_loans, return_loan, settle_fine, start_loan},
    lookup::UNKNOWN,
    registry::{dashboard_stats, get_book_detail, get_member_detail, list_members},
};
use lending_library::domain::{
    Amount, BookCode, BookStatus, DAMAGE_REASON, FineStatus, LoanId, LoanStatus, MemberNumber,
    commands::{IssueFine, RegisterMember, ReturnLoan, SettleFine, StartLoan},
};
use lending_library::ports::{FineFilter, LoanFilter};
use std::collections::HashSet;

mod common;

use common::{in_memory_deps, seed_book, seed_member};

// ============================================================================
// テスト用ヘルパー
// ============================================================================

fn start(book_code: &BookCode, member_number: MemberNumber) -> StartLoan {
    StartLoan {
        book_code: book_code.clone(),
        member_number,
        started_at: Utc::now(),
    }
}

fn give_back(loan_id: LoanId, damaged: bool) -> ReturnLoan {
    ReturnLoan {
        loan_id,
        damaged,
        returned_at: Utc::now(),
    }
}

/// ストア全体の不変条件を検証する
///
/// - 会員ごとのActiveな貸出は1件まで
/// - 書籍がLoanedであるのは、Activeな貸出がちょうど1件参照している場合に限る
async fn assert_invariants(deps: &ServiceDependencies) {
    let active = deps
        .store
        .find_loans(&LoanFilter::all().with_status(LoanStatus::Active))
        .await
        .unwrap();

    let mut members = HashSet::new();
    for loan in &active {
        assert!(
            members.insert(loan.member_number),
            "member {} has more than one active loan",
            loan.member_number
        );
    }

    for book in deps.store.find_books().await.unwrap() {
        let referencing = active.iter().filter(|l| l.book_code == book.code).count();
        match book.status {
            BookStatus::Loaned => assert_eq!(referencing, 1, "book {}", book.code),
            BookStatus::Available => assert_eq!(referencing, 0, "book {}", book.code),
        }
    }
}

// ============================================================================
// 貸出開始
// ============================================================================

#[tokio::test]
async fn test_start_loan_marks_book_loaned() {
    // Arrange
    let deps = in_memory_deps();
    let book = seed_book(&deps, "978-84-206-3312-1", "Ficciones").await;
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;

    // Act
    let loan = start_loan(&deps, start(&book.code, member.number))
        .await
        .unwrap();

    // Assert
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.returned_at, None);
    assert_eq!(loan.book_code, book.code);
    assert_eq!(loan.member_number, member.number);

    let stored = deps.store.find_book(&book.code).await.unwrap().unwrap();
    assert_eq!(stored.status, BookStatus::Loaned);
    assert_invariants(&deps).await;
}

#[tokio::test]
async fn test_second_loan_for_same_member_is_rejected_regardless_of_book() {
    // Arrange
    let deps = in_memory_deps();
    let first = seed_book(&deps, "A-1", "Ficciones").await;
    let second = seed_book(&deps, "A-2", "El Aleph").await;
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;
    start_loan(&deps, start(&first.code, member.number))
        .await
        .unwrap();

    // Act
    let result = start_loan(&deps, start(&second.code, member.number)).await;

    // Assert
    assert!(matches!(result, Err(ApplicationError::MemberHasActiveLoan)));
    let untouched = deps.store.find_book(&second.code).await.unwrap().unwrap();
    assert_eq!(untouched.status, BookStatus::Available);
    assert_invariants(&deps).await;
}

#[tokio::test]
async fn test_start_loan_rule_order() {
    let deps = in_memory_deps();
    let book = seed_book(&deps, "A-1", "Ficciones").await;
    let missing_book = BookCode::parse("missing").unwrap();
    let borrower = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let other = seed_member(&deps, "Tomás Ríos", "30999888").await;

    // 会員が存在しない場合は書籍の状態より先に判定される
    let result = start_loan(&deps, start(&missing_book, MemberNumber::new(999))).await;
    assert!(matches!(result, Err(ApplicationError::MemberNotFound)));

    // 書籍が存在しない
    let result = start_loan(&deps, start(&missing_book, other.number)).await;
    assert!(matches!(result, Err(ApplicationError::BookNotFound)));

    // 書籍が貸出中
    start_loan(&deps, start(&book.code, borrower.number))
        .await
        .unwrap();
    let result = start_loan(&deps, start(&book.code, other.number)).await;
    assert!(matches!(result, Err(ApplicationError::BookUnavailable)));

    // 未払い罰金は書籍の判定より先
    let fine = IssueFine::new(other.number, None, "lost card", None, Utc::now()).unwrap();
    issue_fine(&deps, fine).await.unwrap();
    let result = start_loan(&deps, start(&missing_book, other.number)).await;
    assert!(matches!(result, Err(ApplicationError::MemberHasPendingFine)));

    assert_invariants(&deps).await;
}

#[tokio::test]
async fn test_pending_fine_blocks_until_settled() {
    // Arrange
    let deps = in_memory_deps();
    let book = seed_book(&deps, "A-1", "Ficciones").await;
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let cmd = IssueFine::new(member.number, None, "late return", None, Utc::now()).unwrap();
    let fine = issue_fine(&deps, cmd).await.unwrap();

    // Act & Assert: 未払いの間は貸出不可
    let result = start_loan(&deps, start(&book.code, member.number)).await;
    assert!(matches!(result, Err(ApplicationError::MemberHasPendingFine)));

    // Act & Assert: 精算後は貸出可能
    settle_fine(&deps, SettleFine { fine_id: fine.id })
        .await
        .unwrap();
    let loan = start_loan(&deps, start(&book.code, member.number))
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_invariants(&deps).await;
}

// ============================================================================
// 返却
// ============================================================================

#[tokio::test]
async fn test_return_twice_is_rejected() {
    // Arrange
    let deps = in_memory_deps();
    let book = seed_book(&deps, "A-1", "Ficciones").await;
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let loan = start_loan(&deps, start(&book.code, member.number))
        .await
        .unwrap();

    // Act: 1回目
    let outcome = return_loan(&deps, give_back(loan.id, false)).await.unwrap();

    // Assert
    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert!(outcome.loan.returned_at.is_some());
    assert_eq!(outcome.fine, None);
    let stored = deps.store.find_book(&book.code).await.unwrap().unwrap();
    assert_eq!(stored.status, BookStatus::Available);

    // Act: 2回目
    let result = return_loan(&deps, give_back(loan.id, false)).await;

    // Assert
    assert!(matches!(result, Err(ApplicationError::LoanAlreadyReturned)));
    assert_invariants(&deps).await;
}

#[tokio::test]
async fn test_return_unknown_loan() {
    let deps = in_memory_deps();

    let result = return_loan(&deps, give_back(LoanId::new(), false)).await;

    assert!(matches!(result, Err(ApplicationError::LoanNotFound)));
}

#[tokio::test]
async fn test_damaged_return_issues_exactly_one_fine() {
    // Arrange
    let deps = in_memory_deps();
    let book = seed_book(&deps, "A-1", "Ficciones").await;
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let loan = start_loan(&deps, start(&book.code, member.number))
        .await
        .unwrap();

    // Act
    let outcome = return_loan(&deps, give_back(loan.id, true)).await.unwrap();

    // Assert
    let fine = outcome.fine.expect("damaged return must issue a fine");
    assert_eq!(fine.member_number, member.number);
    assert_eq!(fine.loan_id, Some(loan.id));
    assert_eq!(fine.amount, Amount::DAMAGE);
    assert_eq!(fine.reason, DAMAGE_REASON);
    assert_eq!(fine.status, FineStatus::Pending);

    let fines = deps
        .store
        .find_fines(&FineFilter::all().for_member(member.number))
        .await
        .unwrap();
    assert_eq!(fines, vec![fine]);

    // 破損の罰金は次の貸出をブロックする
    let result = start_loan(&deps, start(&book.code, member.number)).await;
    assert!(matches!(result, Err(ApplicationError::MemberHasPendingFine)));
}

#[tokio::test]
async fn test_undamaged_return_issues_no_fine() {
    let deps = in_memory_deps();
    let book = seed_book(&deps, "A-1", "Ficciones").await;
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let loan = start_loan(&deps, start(&book.code, member.number))
        .await
        .unwrap();

    return_loan(&deps, give_back(loan.id, false)).await.unwrap();

    let fines = deps.store.find_fines(&FineFilter::all()).await.unwrap();
    assert!(fines.is_empty());
}

// ============================================================================
// 罰金
// ============================================================================

#[tokio::test]
async fn test_issue_fine_for_unknown_member() {
    let deps = in_memory_deps();
    let cmd = IssueFine::new(MemberNumber::new(42), None, "late", None, Utc::now()).unwrap();

    let result = issue_fine(&deps, cmd).await;

    assert!(matches!(result, Err(ApplicationError::MemberNotFound)));
}

#[tokio::test]
async fn test_settle_fine_is_idempotent() {
    // Arrange
    let deps = in_memory_deps();
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let cmd = IssueFine::new(
        member.number,
        None,
        "torn page",
        Some(Amount::from_cents(2_550).unwrap()),
        Utc::now(),
    )
    .unwrap();
    let fine = issue_fine(&deps, cmd).await.unwrap();

    // Act
    let first = settle_fine(&deps, SettleFine { fine_id: fine.id })
        .await
        .unwrap();
    let second = settle_fine(&deps, SettleFine { fine_id: fine.id })
        .await
        .unwrap();

    // Assert
    assert_eq!(first.status, FineStatus::Paid);
    assert_eq!(second, first);
    assert_eq!(first.amount.cents(), 2_550);
}

#[tokio::test]
async fn test_settle_unknown_fine() {
    let deps = in_memory_deps();

    let result = settle_fine(
        &deps,
        SettleFine {
            fine_id: lending_library::domain::FineId::new(),
        },
    )
    .await;

    assert!(matches!(result, Err(ApplicationError::FineNotFound)));
}

#[tokio::test]
async fn test_list_fines_filters_by_member_and_enriches_name() {
    // Arrange
    let deps = in_memory_deps();
    let lucia = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let tomas = seed_member(&deps, "Tomás Ríos", "30999888").await;
    let now = Utc::now();
    for (member, offset) in [(lucia.number, 0), (tomas.number, 1), (lucia.number, 2)] {
        let cmd = IssueFine::new(member, None, "late", None, now + Duration::seconds(offset))
            .unwrap();
        issue_fine(&deps, cmd).await.unwrap();
    }

    // Act
    let all = list_fines(&deps, None).await.unwrap();
    let only_lucia = list_fines(&deps, Some(lucia.number)).await.unwrap();

    // Assert
    assert_eq!(all.len(), 3);
    assert_eq!(all[1].member_name, "Tomás Ríos");
    assert_eq!(only_lucia.len(), 2);
    assert!(only_lucia.iter().all(|view| view.member_name == "Lucía Pérez"));
    assert!(only_lucia[0].fine.issued_at < only_lucia[1].fine.issued_at);
}

// ============================================================================
// 一覧・詳細
// ============================================================================

#[tokio::test]
async fn test_list_loans_by_status_with_display_fields() {
    // Arrange
    let deps = in_memory_deps();
    let ficciones = seed_book(&deps, "A-1", "Ficciones").await;
    let aleph = seed_book(&deps, "A-2", "El Aleph").await;
    let lucia = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let tomas = seed_member(&deps, "Tomás Ríos", "30999888").await;

    let returned = start_loan(&deps, start(&ficciones.code, lucia.number))
        .await
        .unwrap();
    return_loan(&deps, give_back(returned.id, false))
        .await
        .unwrap();
    let active = start_loan(&deps, start(&aleph.code, tomas.number))
        .await
        .unwrap();

    // Act
    let all = list_loans(&deps, None).await.unwrap();
    let only_active = list_loans(&deps, Some(LoanStatus::Active)).await.unwrap();
    let only_returned = list_loans(&deps, Some(LoanStatus::Returned)).await.unwrap();

    // Assert
    assert_eq!(all.len(), 2);
    assert_eq!(only_active.len(), 1);
    assert_eq!(only_active[0].loan.id, active.id);
    assert_eq!(only_active[0].display.book_title, "El Aleph");
    assert_eq!(only_active[0].display.book_author, "Jorge Luis Borges");
    assert_eq!(only_active[0].display.member_name, "Tomás Ríos");
    assert_eq!(only_returned.len(), 1);
    assert_eq!(only_returned[0].loan.id, returned.id);
}

#[tokio::test]
async fn test_list_loans_with_missing_references_uses_placeholder() {
    // Arrange: ストアを経由せず参照先のない貸出を作る
    let deps = in_memory_deps();
    let mut tx = deps.store.begin().await.unwrap();
    let orphan = lending_library::domain::Loan {
        id: LoanId::new(),
        book_code: BookCode::parse("withdrawn").unwrap(),
        member_number: MemberNumber::new(77),
        started_at: Utc::now(),
        returned_at: None,
        status: LoanStatus::Active,
    };
    tx.insert_loan(&orphan).await.unwrap();
    tx.commit().await.unwrap();

    // Act
    let loans = list_loans(&deps, None).await.unwrap();

    // Assert
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].display.book_title, UNKNOWN);
    assert_eq!(loans[0].display.member_name, UNKNOWN);
}

#[tokio::test]
async fn test_member_detail_shows_active_loan_and_pending_fines() {
    // Arrange
    let deps = in_memory_deps();
    let book = seed_book(&deps, "A-1", "Ficciones").await;
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let loan = start_loan(&deps, start(&book.code, member.number))
        .await
        .unwrap();
    let cmd = IssueFine::new(member.number, Some(loan.id), "coffee stain", None, Utc::now())
        .unwrap();
    let fine = issue_fine(&deps, cmd).await.unwrap();

    // Act
    let detail = get_member_detail(&deps, member.number).await.unwrap();

    // Assert
    assert_eq!(detail.member, member);
    let active = detail.active_loan.expect("member has an active loan");
    assert_eq!(active.loan.id, loan.id);
    assert_eq!(active.display.book_title, "Ficciones");
    assert_eq!(detail.pending_fines, vec![fine]);

    let missing = get_member_detail(&deps, MemberNumber::new(999)).await;
    assert!(matches!(missing, Err(ApplicationError::MemberNotFound)));
}

#[tokio::test]
async fn test_book_detail_shows_loan_history() {
    // Arrange
    let deps = in_memory_deps();
    let book = seed_book(&deps, "A-1", "Ficciones").await;
    let lucia = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let tomas = seed_member(&deps, "Tomás Ríos", "30999888").await;
    let first = start_loan(&deps, start(&book.code, lucia.number))
        .await
        .unwrap();
    return_loan(&deps, give_back(first.id, false)).await.unwrap();
    let later = StartLoan {
        started_at: first.started_at + Duration::minutes(5),
        ..start(&book.code, tomas.number)
    };
    start_loan(&deps, later).await.unwrap();

    // Act
    let detail = get_book_detail(&deps, book.code.clone()).await.unwrap();

    // Assert
    assert_eq!(detail.book.status, BookStatus::Loaned);
    let names: Vec<_> = detail
        .loans
        .iter()
        .map(|view| view.display.member_name.as_str())
        .collect();
    assert_eq!(names, ["Lucía Pérez", "Tomás Ríos"]);

    let missing = get_book_detail(&deps, BookCode::parse("nope").unwrap()).await;
    assert!(matches!(missing, Err(ApplicationError::BookNotFound)));
}

#[tokio::test]
async fn test_dashboard_stats() {
    // Arrange
    let deps = in_memory_deps();
    let ficciones = seed_book(&deps, "A-1", "Ficciones").await;
    seed_book(&deps, "A-2", "El Aleph").await;
    seed_book(&deps, "A-3", "Historia universal de la infamia").await;
    let lucia = seed_member(&deps, "Lucía Pérez", "30111222").await;
    seed_member(&deps, "Tomás Ríos", "30999888").await;
    start_loan(&deps, start(&ficciones.code, lucia.number))
        .await
        .unwrap();
    let cmd = IssueFine::new(lucia.number, None, "late", None, Utc::now()).unwrap();
    issue_fine(&deps, cmd).await.unwrap();

    // Act
    let stats = dashboard_stats(&deps).await.unwrap();

    // Assert
    assert_eq!(stats.total_books, 3);
    assert_eq!(stats.available_books, 2);
    assert_eq!(stats.total_members, 2);
    assert_eq!(stats.active_loans, 1);
    assert_eq!(stats.pending_fines, 1);
}

// ============================================================================
// 会員登録
// ============================================================================

#[tokio::test]
async fn test_register_member_rejects_duplicate_document() {
    let deps = in_memory_deps();
    seed_member(&deps, "Lucía Pérez", "30111222").await;

    let cmd = RegisterMember::new("Someone Else", "30111222", Utc::now()).unwrap();
    let result = lending_library::application::registry::register_member(&deps, cmd).await;

    assert!(matches!(result, Err(ApplicationError::DuplicateDocumentId)));
    assert_eq!(list_members(&deps).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_book_rejects_duplicate_code() {
    let deps = in_memory_deps();
    seed_book(&deps, "A-1", "Ficciones").await;

    let cmd = lending_library::domain::commands::RegisterBook::new("A-1", "Other", "X", None)
        .unwrap();
    let result = lending_library::application::registry::register_book(&deps, cmd).await;

    assert!(matches!(result, Err(ApplicationError::DuplicateBookCode)));
}

// ============================================================================
// 並行実行
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_loan_for_same_member() {
    // Arrange
    let deps = in_memory_deps();
    let first = seed_book(&deps, "A-1", "Ficciones").await;
    let second = seed_book(&deps, "A-2", "El Aleph").await;
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;

    // Act: 異なる書籍への貸出を同時に実行
    let handles = [first.code.clone(), second.code.clone()].map(|code| {
        let deps = deps.clone();
        tokio::spawn(async move { start_loan(&deps, start(&code, member.number)).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    // Assert: ちょうど1件だけ成功する
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    let failure = results.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(failure, ApplicationError::MemberHasActiveLoan));
    assert_invariants(&deps).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_loan_for_same_book() {
    let deps = in_memory_deps();
    let book = seed_book(&deps, "A-1", "Ficciones").await;
    let mut numbers = Vec::new();
    for i in 0..8 {
        let member = seed_member(&deps, "Reader", &format!("DOC-{}", i)).await;
        numbers.push(member.number);
    }

    let handles = numbers.into_iter().map(|number| {
        let deps = deps.clone();
        let code = book.code.clone();
        tokio::spawn(async move { start_loan(&deps, start(&code, number)).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ApplicationError::BookUnavailable))
    );
    assert_invariants(&deps).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_returns_of_same_loan() {
    let deps = in_memory_deps();
    let book = seed_book(&deps, "A-1", "Ficciones").await;
    let member = seed_member(&deps, "Lucía Pérez", "30111222").await;
    let loan = start_loan(&deps, start(&book.code, member.number))
        .await
        .unwrap();

    let handles = (0..4).map(|_| {
        let deps = deps.clone();
        tokio::spawn(async move { return_loan(&deps, give_back(loan.id, true)).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    // 破損の罰金は1件だけ
    let fines = deps.store.find_fines(&FineFilter::all()).await.unwrap();
    assert_eq!(fines.len(), 1);
    assert_invariants(&deps).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_member_assigns_unique_numbers() {
    // Arrange
    let deps = in_memory_deps();
    const N: usize = 50;

    // Act
    let handles = (0..N).map(|i| {
        let deps = deps.clone();
        tokio::spawn(async move {
            let cmd = RegisterMember::new("Reader", &format!("DOC-{}", i), Utc::now()).unwrap();
            lending_library::application::registry::register_member(&deps, cmd).await
        })
    });
    let members: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    // Assert
    let numbers: HashSet<_> = members.iter().map(|m| m.number).collect();
    assert_eq!(numbers.len(), N);
    assert_eq!(list_members(&deps).await.unwrap().len(), N);
}
