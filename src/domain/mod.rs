pub mod event;
pub mod message;
