// store

mod revocation_store;

pub use revocation_store::*;

// repo

mod principal_repo;

pub use principal_repo::*;

// outbound

mod mailer;

pub use mailer::*;
