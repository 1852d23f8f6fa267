mod argon2_hasher;
mod auth_service_impl;
mod code_service_impl;
mod jwt_codec;
mod mailer_log;
mod mailer_queue;
mod mailer_smtp;
mod session_authority_impl;

pub use argon2_hasher::*;
pub use auth_service_impl::*;
pub use code_service_impl::*;
pub use jwt_codec::*;
pub use mailer_log::*;
pub use mailer_queue::*;
pub use mailer_smtp::*;
pub use session_authority_impl::*;
