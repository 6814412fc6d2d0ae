pub mod book;
pub mod commands;
pub mod errors;
pub mod fine;
pub mod loan;
pub mod member;
pub mod policy;
pub mod value_objects;

pub use book::*;
pub use errors::*;
pub use fine::*;
pub use loan::*;
pub use member::*;
pub use value_objects::{Amount, BookCode, DocumentId, FineId, LoanId, MemberNumber};
