pub mod atomic_database;
pub mod composition;
mod element;
pub mod errors;
