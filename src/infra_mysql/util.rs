use crate::application_port::AuthError;
use sqlx::mysql::MySqlDatabaseError;

/// Maps a unique-key violation on `auth_principal` to the matching duplicate error.
pub fn dup_key_error(err: &sqlx::Error) -> Option<AuthError> {
    let sqlx::Error::Database(db) = err else {
        return None;
    };
    let mysql_err = db.try_downcast_ref::<MySqlDatabaseError>()?;
    if mysql_err.number() != 1062 {
        // ER_DUP_ENTRY
        return None;
    }
    if mysql_err.message().contains("username") {
        Some(AuthError::DuplicateUsername)
    } else {
        Some(AuthError::DuplicateEmail)
    }
}

pub fn repo_err(err: sqlx::Error) -> AuthError {
    dup_key_error(&err).unwrap_or_else(|| AuthError::Repository(err.to_string()))
}
