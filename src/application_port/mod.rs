mod auth_service;
mod one_time_code_service;
mod public_error;
mod session_authority;
mod token_codec;

pub use auth_service::*;
pub use one_time_code_service::*;
pub use public_error::*;
pub use session_authority::*;
pub use token_codec::*;
