use crate::music_store::{Account, AccountIdentity, MusicError, MusicResult};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Account id.
    sub: String,
    external_id: String,
    name: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Unix timestamp, seconds.
    pub expires_at: i64,
}

/// Issues and verifies HS256 bearer tokens naming an account.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: u64) -> Self {
        TokenIssuer {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds: (ttl_hours as i64).saturating_mul(3600),
        }
    }

    pub fn issue(&self, account: &Account) -> MusicResult<IssuedToken> {
        let now = chrono::Utc::now().timestamp();
        self.issue_at(account, now)
    }

    fn issue_at(&self, account: &Account, issued_at: i64) -> MusicResult<IssuedToken> {
        let claims = Claims {
            sub: account.id.to_string(),
            external_id: account.external_id.clone(),
            name: account.display_name.clone(),
            iat: issued_at,
            exp: issued_at + self.ttl_seconds,
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| MusicError::InvalidIdentity(format!("could not issue token: {}", e)))?;
        Ok(IssuedToken {
            access_token,
            token_type: "Bearer",
            expires_at: claims.exp,
        })
    }

    /// Fails with InvalidIdentity for expired, tampered or malformed tokens.
    pub fn verify(&self, token: &str) -> MusicResult<AccountIdentity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            MusicError::InvalidIdentity(format!("invalid token: {}", e))
        })?;

        let account_id = data.claims.sub.parse().map_err(|_| {
            MusicError::InvalidIdentity(format!("invalid subject '{}'", data.claims.sub))
        })?;
        Ok(AccountIdentity {
            account_id,
            external_id: data.claims.external_id,
            display_name: data.claims.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            id: 7,
            external_id: "google-7".to_string(),
            display_name: "Alice".to_string(),
            created: 0,
        }
    }

    #[test]
    fn issued_token_names_the_account() {
        let issuer = TokenIssuer::new("secret", 24);

        let token = issuer.issue(&account()).unwrap();
        let identity = issuer.verify(&token.access_token).unwrap();

        assert_eq!(identity, AccountIdentity::from(&account()));
        assert_eq!(token.token_type, "Bearer");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let token = TokenIssuer::new("secret", 24).issue(&account()).unwrap();

        let result = TokenIssuer::new("other", 24).verify(&token.access_token);

        assert!(matches!(result, Err(MusicError::InvalidIdentity(_))));
    }

    #[test]
    fn rejects_expired_token() {
        let issuer = TokenIssuer::new("secret", 1);
        let long_ago = chrono::Utc::now().timestamp() - 2 * 3600;

        let token = issuer.issue_at(&account(), long_ago).unwrap();

        assert!(issuer.verify(&token.access_token).is_err());
    }

    #[test]
    fn rejects_tampered_and_garbage_tokens() {
        let issuer = TokenIssuer::new("secret", 24);
        let token = issuer.issue(&account()).unwrap().access_token;
        let mut tampered = token.clone();
        tampered.push('x');

        assert!(issuer.verify(&tampered).is_err());
        assert!(issuer.verify("not-a-token").is_err());
        assert!(issuer.verify("").is_err());
    }
}
