mod database;
mod repository;

pub use database::Database;
pub use repository::SqliteBacktestRepository;
