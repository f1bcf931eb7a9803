pub mod chat;
pub mod dispatch;
pub mod health;
pub mod models;
