pub mod errors;
pub mod loan;
pub mod lookup;
pub mod registry;

use crate::ports::EntityStore;
use std::sync::Arc;

pub use errors::{ApplicationError, Result};

/// サービスの依存関係
///
/// 振る舞いは持たず、各ユースケース関数に明示的に渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub store: Arc<dyn EntityStore>,
}

impl ServiceDependencies {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}
