pub mod config;
pub mod context;
pub mod llm_client;
pub mod logging;
pub mod prompt;
pub mod response;
pub mod session;
pub mod tokens;
pub mod transcript;
