pub mod config;
pub mod control;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod table;
