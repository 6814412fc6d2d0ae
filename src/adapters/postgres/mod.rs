pub mod entity_store;

// パブリックに型を再エクスポート
pub use entity_store::EntityStore as PostgresEntityStore;
