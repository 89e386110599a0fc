pub mod auth;

pub use auth::{api_key_middleware, load_or_create_api_key};
