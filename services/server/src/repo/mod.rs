pub mod conversations;
pub mod groups;
pub mod messages;
pub mod receipts;
pub mod refresh_tokens;
pub mod users;
