use super::util::repo_err;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool, Row};
use uuid::Uuid;

pub struct MySqlPrincipalRepo {
    pool: MySqlPool,
}

impl MySqlPrincipalRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlPrincipalRepo { pool }
    }

    #[inline]
    fn id_as_bytes(id: &PrincipalId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn id_from_bytes(id: &[u8]) -> Result<PrincipalId, AuthError> {
        Ok(PrincipalId(
            Uuid::from_slice(id).map_err(|e| AuthError::Repository(e.to_string()))?,
        ))
    }

    fn roles_to_column(roles: &[Role]) -> String {
        roles
            .iter()
            .map(Role::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn roles_from_column(raw: &str) -> Result<Vec<Role>, AuthError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Role>().map_err(|e| AuthError::Repository(e.to_string())))
            .collect()
    }

    fn row_to_principal(row: MySqlRow) -> Result<AuthPrincipal, AuthError> {
        let id_bytes: Vec<u8> = row.try_get("principal_id").map_err(repo_err)?;
        let email: String = row.try_get("email").map_err(repo_err)?;
        let username: String = row.try_get("username").map_err(repo_err)?;
        let password_hash: String = row.try_get("password_hash").map_err(repo_err)?;
        let email_verified: bool = row.try_get("email_verified").map_err(repo_err)?;
        let roles: String = row.try_get("roles").map_err(repo_err)?;

        Ok(AuthPrincipal {
            id: Self::id_from_bytes(&id_bytes)?,
            email: Subject::from_email(&email),
            username,
            password_hash,
            email_verified,
            roles: Self::roles_from_column(&roles)?,
        })
    }

    async fn fetch_principal(
        &self,
        query: Query<'_, MySql, MySqlArguments>,
    ) -> Result<Option<AuthPrincipal>, AuthError> {
        let row_opt = query.fetch_optional(&self.pool).await.map_err(repo_err)?;
        row_opt.map(Self::row_to_principal).transpose()
    }
}

#[async_trait::async_trait]
impl PrincipalRepo for MySqlPrincipalRepo {
    async fn create(&self, principal: &AuthPrincipal) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO auth_principal (principal_id, email, username, password_hash, email_verified, roles)
VALUES (?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(Self::id_as_bytes(&principal.id))
        .bind(principal.email.as_str())
        .bind(&principal.username)
        .bind(&principal.password_hash)
        .bind(principal.email_verified)
        .bind(Self::roles_to_column(&principal.roles))
        .execute(&self.pool)
        .await
        .map_err(repo_err)?;

        Ok(())
    }

    async fn update(&self, principal: &AuthPrincipal) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
UPDATE auth_principal
SET password_hash = ?, email_verified = ?, roles = ?
WHERE principal_id = ?
"#,
        )
        .bind(&principal.password_hash)
        .bind(principal.email_verified)
        .bind(Self::roles_to_column(&principal.roles))
        .bind(Self::id_as_bytes(&principal.id))
        .execute(&self.pool)
        .await
        .map_err(repo_err)?;

        if result.rows_affected() == 0 {
            // MySQL reports 0 for an unchanged row too; confirm it exists.
            if self.find_by_id(principal.id).await?.is_none() {
                return Err(AuthError::Repository(format!(
                    "principal {} not found",
                    principal.id
                )));
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<AuthPrincipal>, AuthError> {
        let query = sqlx::query(
            r#"
SELECT principal_id, email, username, password_hash, email_verified, roles
FROM auth_principal
WHERE principal_id = ?
"#,
        )
        .bind(Self::id_as_bytes(&id));
        self.fetch_principal(query).await
    }

    async fn find_by_email(&self, email: &Subject) -> Result<Option<AuthPrincipal>, AuthError> {
        let query = sqlx::query(
            r#"
SELECT principal_id, email, username, password_hash, email_verified, roles
FROM auth_principal
WHERE email = ?
"#,
        )
        .bind(email.as_str());
        self.fetch_principal(query).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<AuthPrincipal>, AuthError> {
        let query = sqlx::query(
            r#"
SELECT principal_id, email, username, password_hash, email_verified, roles
FROM auth_principal
WHERE username = ?
"#,
        )
        .bind(username);
        self.fetch_principal(query).await
    }
}
