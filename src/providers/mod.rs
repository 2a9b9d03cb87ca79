//! External collaborators: identity provider, synthesis service and blob storage.

pub mod blob;
pub mod oauth;
pub mod synthesis;

pub use blob::{BlobStorage, LocalBlobStorage};
pub use oauth::{ExternalProfile, IdentityProvider, OAuthClient};
pub use synthesis::{
    HttpSynthesisClient, ImageInput, PlaceholderSynthesisProvider, SynthesisError,
    SynthesisProvider, SynthesizedAudio,
};
