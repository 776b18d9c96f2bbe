pub mod contacts;
pub mod deliveries;
pub mod events;
pub mod health;
