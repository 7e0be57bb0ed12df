pub mod api;
pub mod compose;
pub mod decoders;
pub mod gmail_client;

pub use api::MailService;

#[cfg(test)]
pub mod fake;
