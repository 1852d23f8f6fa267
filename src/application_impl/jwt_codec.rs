use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::error;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

impl JwtConfig {
    fn ttl(&self, class: TokenClass) -> Duration {
        match class {
            TokenClass::Access => self.access_ttl,
            TokenClass::Refresh => self.refresh_ttl,
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String, // keeps signatures distinct within one second
    cls: TokenClass,
}

fn encode_claims(claims: &Claims, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, key).map_err(|e| {
        error!(error = %e, "token encoding failed");
        TokenError::Encoding
    })
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::ImmatureSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_audience(&[cfg.audience.clone()]);
        validation.set_issuer(&[cfg.issuer.clone()]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss", "aud"]);

        JwtHs256Codec {
            encoding_key: EncodingKey::from_secret(&cfg.signing_key),
            decoding_key: DecodingKey::from_secret(&cfg.signing_key),
            validation,
            cfg,
        }
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue(&self, subject: &Subject, class: TokenClass) -> Result<IssuedToken, TokenError> {
        let iat = Utc::now().timestamp();
        let exp = iat + self.cfg.ttl(class).as_secs() as i64;
        let claims = Claims {
            sub: subject.to_string(),
            exp,
            iat,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: Self::gen_jti(),
            cls: class,
        };
        let token = encode_claims(&claims, &self.encoding_key)?;
        let signature = TokenSignature::of_compact(&token).ok_or(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            class,
            signature,
            issued_at: timestamp(iat).ok_or(TokenError::Encoding)?,
            expires_at: timestamp(exp).ok_or(TokenError::Encoding)?,
        })
    }

    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(map_decode_error)?;
        let signature = TokenSignature::of_compact(token).ok_or(TokenError::Malformed)?;
        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }
        // jsonwebtoken accepts `exp == now`; a token is only live while `exp > now`.
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedToken {
            subject: Subject::from_email(&claims.sub),
            class: claims.cls,
            signature,
            jti: claims.jti,
            issued_at: timestamp(claims.iat).ok_or(TokenError::Malformed)?,
            expires_at: timestamp(claims.exp).ok_or(TokenError::Malformed)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: &str) -> JwtConfig {
        JwtConfig {
            issuer: "token-authority".to_string(),
            audience: "test-client".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            signing_key: key.as_bytes().to_vec(),
        }
    }

    fn alice() -> Subject {
        Subject::from_email("alice@example.com")
    }

    #[test]
    fn issued_token_verifies_with_subject_and_class() {
        let codec = JwtHs256Codec::new(config("k1"));
        let issued = codec.issue(&alice(), TokenClass::Refresh).unwrap();
        let verified = codec.verify(&issued.token).unwrap();

        assert_eq!(verified.subject, alice());
        assert_eq!(verified.class, TokenClass::Refresh);
        assert_eq!(verified.signature, issued.signature);
        assert_eq!(issued.ttl(), Duration::from_secs(7 * 24 * 60 * 60));
    }

    #[test]
    fn tokens_for_same_subject_have_distinct_signatures() {
        let codec = JwtHs256Codec::new(config("k1"));
        let a = codec.issue(&alice(), TokenClass::Access).unwrap();
        let b = codec.issue(&alice(), TokenClass::Access).unwrap();
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn foreign_key_is_invalid_signature() {
        let ours = JwtHs256Codec::new(config("k1"));
        let theirs = JwtHs256Codec::new(config("k2"));
        let issued = theirs.issue(&alice(), TokenClass::Access).unwrap();
        assert_eq!(ours.verify(&issued.token).unwrap_err(), TokenError::InvalidSignature);
    }

    #[test]
    fn swapped_signature_is_invalid_signature() {
        let codec = JwtHs256Codec::new(config("k1"));
        let a = codec.issue(&alice(), TokenClass::Access).unwrap();
        let b = codec.issue(&Subject::from_email("bob@example.com"), TokenClass::Access).unwrap();
        let (head, _) = a.token.rsplit_once('.').unwrap();
        let forged = format!("{head}.{}", b.signature);
        assert_eq!(codec.verify(&forged).unwrap_err(), TokenError::InvalidSignature);
    }

    #[test]
    fn past_expiry_is_expired() {
        let cfg = config("k1");
        let codec = JwtHs256Codec::new(cfg.clone());
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "alice@example.com".to_string(),
            exp: now - 10,
            iat: now - 100,
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
            jti: "jti".to_string(),
            cls: TokenClass::Access,
        };
        let token = encode_claims(&claims, &EncodingKey::from_secret(&cfg.signing_key)).unwrap();
        assert_eq!(codec.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn zero_ttl_token_is_expired_at_once() {
        let mut cfg = config("k1");
        cfg.access_ttl = Duration::ZERO;
        let codec = JwtHs256Codec::new(cfg);
        let issued = codec.issue(&alice(), TokenClass::Access).unwrap();
        assert_eq!(codec.verify(&issued.token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let mut other = config("k1");
        other.audience = "someone-else".to_string();
        let issued = JwtHs256Codec::new(other).issue(&alice(), TokenClass::Access).unwrap();
        let codec = JwtHs256Codec::new(config("k1"));
        assert_eq!(codec.verify(&issued.token).unwrap_err(), TokenError::InvalidSignature);
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = JwtHs256Codec::new(config("k1"));
        assert_eq!(codec.verify("not-a-token").unwrap_err(), TokenError::Malformed);
        assert_eq!(codec.verify("").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn debug_redacts_signing_key() {
        let printed = format!("{:?}", config("super-secret"));
        assert!(!printed.contains("super-secret"));
    }
}
