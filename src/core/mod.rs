pub mod channel;
pub mod message;
pub mod provider;
pub mod record;
