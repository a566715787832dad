pub mod logger;
pub mod secret;
