pub mod delivery;
pub mod directory;
pub mod fanout;
pub mod health;
pub mod policy;
pub mod publish;
pub mod template;
