pub mod entity_store;
pub mod identity;

pub use entity_store::{
    EntityStore, FineFilter, LoanFilter, StoreError, StoreTransaction, UniqueKey,
};
pub use identity::{AuthError, IdentityService, IssuedToken, Principal};
