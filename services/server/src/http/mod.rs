pub mod auth;
pub mod chat;
pub mod groups;
pub mod users;
