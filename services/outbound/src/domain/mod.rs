pub mod delivery;
pub mod health;
pub mod repository;
pub mod scope;
pub mod types;
