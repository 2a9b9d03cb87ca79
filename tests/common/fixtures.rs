//! Test collaborators and payloads

use super::constants::*;
use async_trait::async_trait;
use genmusic_server::music_store::{MusicError, MusicResult};
use genmusic_server::providers::{ExternalProfile, IdentityProvider};

/// Identity provider that knows two fixed users, keyed by authorization code.
pub struct FakeIdentityProvider;

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn exchange_code(&self, code: &str) -> MusicResult<String> {
        match code {
            TEST_USER_CODE | OTHER_USER_CODE => Ok(format!("provider-token-{}", code)),
            BROKEN_PROVIDER_CODE => Err(MusicError::ExternalServiceError(
                "provider unavailable".to_string(),
            )),
            _ => Err(MusicError::InvalidIdentity(format!(
                "unknown authorization code {}",
                code
            ))),
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> MusicResult<ExternalProfile> {
        let code = access_token.trim_start_matches("provider-token-");
        let (external_id, display_name) = match code {
            TEST_USER_CODE => (TEST_USER_EXTERNAL_ID, TEST_USER_NAME),
            OTHER_USER_CODE => (OTHER_USER_EXTERNAL_ID, OTHER_USER_NAME),
            _ => {
                return Err(MusicError::InvalidIdentity(
                    "unknown provider token".to_string(),
                ))
            }
        };
        Ok(ExternalProfile {
            external_id: external_id.to_string(),
            display_name: display_name.to_string(),
        })
    }
}

/// Smallest byte sequence recognized as a PNG image.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0, 0, 0, 0x0D, b'I', b'H', b'D', b'R']);
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}
