pub mod credentials;
pub mod oauth;
pub mod service_account;
pub mod token_manager;
pub mod token_store;
pub mod tokens_file;

pub const GMAIL_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.modify",
];
