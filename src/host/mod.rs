pub mod channel;
pub mod messages;
