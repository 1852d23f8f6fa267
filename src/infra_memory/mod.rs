mod mailer_memory;
mod principal_repo_memory;
mod revocation_store_memory;

pub use mailer_memory::*;
pub use principal_repo_memory::*;
pub use revocation_store_memory::*;
