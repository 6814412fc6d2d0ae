mod books;
mod dashboard;
mod members;

pub use books::{BookDetail, get_book_detail, list_books, register_book};
pub use dashboard::{DashboardStats, dashboard_stats};
pub use members::{MemberDetail, get_member_detail, list_members, register_member};
