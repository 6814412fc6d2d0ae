mod fine_service;
mod loan_service;

pub use fine_service::{issue_fine, list_fines, settle_fine};
pub use loan_service::{list_loans, return_loan, start_loan};
