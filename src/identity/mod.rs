//! Maps external identities to accounts and hands out bearer tokens for them.

mod token;

pub use token::{IssuedToken, TokenIssuer};

use crate::music_store::{Account, AccountIdentity, MusicError, MusicResult, MusicStore};
use crate::providers::IdentityProvider;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub account: Account,
    pub token: IssuedToken,
}

pub struct IdentityResolver {
    store: Arc<dyn MusicStore>,
    provider: Option<Arc<dyn IdentityProvider>>,
    tokens: TokenIssuer,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn MusicStore>,
        provider: Option<Arc<dyn IdentityProvider>>,
        tokens: TokenIssuer,
    ) -> Self {
        IdentityResolver {
            store,
            provider,
            tokens,
        }
    }

    /// Returns the account for the external identity, creating it on first sight.
    pub fn resolve(&self, external_id: &str, display_name: &str) -> MusicResult<Account> {
        self.store.resolve_account(external_id, display_name)
    }

    /// Full login: authorization code, provider profile, account, then our own token.
    pub async fn login_with_code(&self, code: &str) -> MusicResult<LoginOutcome> {
        if code.trim().is_empty() {
            return Err(MusicError::InvalidIdentity(
                "authorization code is missing".to_string(),
            ));
        }
        let provider = self.provider.as_ref().ok_or_else(|| {
            MusicError::ExternalServiceError("no identity provider configured".to_string())
        })?;

        let provider_token = provider.exchange_code(code).await?;
        let profile = provider.fetch_profile(&provider_token).await?;
        let account = self.resolve(&profile.external_id, &profile.display_name)?;
        let token = self.tokens.issue(&account)?;

        info!("Account {} logged in", account.id);
        Ok(LoginOutcome { account, token })
    }

    /// Verifies a bearer token. The account itself is not looked up.
    pub fn authenticate(&self, token: &str) -> MusicResult<AccountIdentity> {
        self.tokens.verify(token)
    }
}
