use axum::extract::FromRef;

use crate::generation::GenerationOrchestrator;
use crate::identity::IdentityResolver;
use crate::listing::ListingService;
use crate::music_store::MusicStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedMusicStore = Arc<dyn MusicStore>;
pub type GuardedIdentityResolver = Arc<IdentityResolver>;
pub type GuardedOrchestrator = Arc<GenerationOrchestrator>;
pub type GuardedListingService = Arc<ListingService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub music_store: GuardedMusicStore,
    pub identity: GuardedIdentityResolver,
    pub orchestrator: GuardedOrchestrator,
    pub listing: GuardedListingService,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        music_store: GuardedMusicStore,
        identity: GuardedIdentityResolver,
        orchestrator: GuardedOrchestrator,
        listing: GuardedListingService,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_owned(),
            music_store,
            identity,
            orchestrator,
            listing,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedMusicStore {
    fn from_ref(input: &ServerState) -> Self {
        input.music_store.clone()
    }
}

impl FromRef<ServerState> for GuardedIdentityResolver {
    fn from_ref(input: &ServerState) -> Self {
        input.identity.clone()
    }
}

impl FromRef<ServerState> for GuardedOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.clone()
    }
}

impl FromRef<ServerState> for GuardedListingService {
    fn from_ref(input: &ServerState) -> Self {
        input.listing.clone()
    }
}
