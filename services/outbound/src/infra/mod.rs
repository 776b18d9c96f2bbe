pub mod bus;
pub mod db;
pub mod renderer;
