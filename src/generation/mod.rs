//! Synthesis plus cataloging as one unit of work.

use crate::music_store::{
    AccountIdentity, CatalogEntry, MusicError, MusicResult, MusicStore, NewArtifact, Ownership,
};
use crate::providers::{BlobStorage, ImageInput, SynthesisProvider, SynthesizedAudio};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const IMAGE_FOLDER: &str = "images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Requested,
    ProviderCalled,
    ArtifactPersisted,
    OwnershipLinked,
    SkippedLinking,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub entry: CatalogEntry,
    pub ownership: Option<Ownership>,
    /// Every state the request went through, `Requested` first.
    pub states: Vec<GenerationState>,
}

struct GenerationRun {
    label: &'static str,
    states: Vec<GenerationState>,
}

impl GenerationRun {
    fn start(label: &'static str) -> Self {
        debug!("{} generation: {:?}", label, GenerationState::Requested);
        GenerationRun {
            label,
            states: vec![GenerationState::Requested],
        }
    }

    fn advance(&mut self, state: GenerationState) {
        debug!("{} generation: {:?}", self.label, state);
        self.states.push(state);
    }

    fn fail(mut self, err: MusicError) -> MusicError {
        self.advance(GenerationState::Failed);
        error!("{} generation failed after {:?}: {}", self.label, self.states, err);
        err
    }
}

pub struct GenerationOrchestrator {
    store: Arc<dyn MusicStore>,
    synthesis: Arc<dyn SynthesisProvider>,
    blobs: Arc<dyn BlobStorage>,
}

impl GenerationOrchestrator {
    pub fn new(
        store: Arc<dyn MusicStore>,
        synthesis: Arc<dyn SynthesisProvider>,
        blobs: Arc<dyn BlobStorage>,
    ) -> Self {
        GenerationOrchestrator {
            store,
            synthesis,
            blobs,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.synthesis.name()
    }

    /// Generates music from text prompts. The title follows the secondary prompt when given.
    pub async fn generate_from_text(
        &self,
        caller: Option<&AccountIdentity>,
        prompt: &str,
        secondary_prompt: Option<&str>,
    ) -> MusicResult<GenerationOutcome> {
        if prompt.trim().is_empty() {
            return Err(MusicError::InvalidArtifact(
                "prompt cannot be empty".to_string(),
            ));
        }

        let mut run = GenerationRun::start("Text");
        let audio = match self
            .synthesis
            .synthesize_from_text(prompt, secondary_prompt)
            .await
        {
            Ok(audio) => audio,
            Err(err) => {
                let err = MusicError::from(err);
                return Err(run.fail(MusicError::GenerationFailed(err.to_string())));
            }
        };
        run.advance(GenerationState::ProviderCalled);

        self.persist(run, caller, audio, None)
    }

    /// Generates music from an uploaded image. The image is kept in blob storage as the
    /// entry's thumbnail and removed again if the generation does not complete.
    pub async fn generate_from_image(
        &self,
        caller: Option<&AccountIdentity>,
        image: ImageInput,
    ) -> MusicResult<GenerationOutcome> {
        if image.bytes.is_empty() {
            return Err(MusicError::InvalidArtifact("image is empty".to_string()));
        }

        let mut run = GenerationRun::start("Image");
        let thumbnail = match self.blobs.store(&image.bytes, IMAGE_FOLDER).await {
            Ok(location) => location,
            Err(err) => return Err(run.fail(err)),
        };

        let audio = match self.synthesis.synthesize_from_image(&image).await {
            Ok(audio) => audio,
            Err(err) => {
                self.discard_blob(&thumbnail).await;
                let err = MusicError::from(err);
                return Err(run.fail(MusicError::GenerationFailed(err.to_string())));
            }
        };
        run.advance(GenerationState::ProviderCalled);

        let result = self.persist(run, caller, audio, Some(thumbnail.clone()));
        if result.is_err() {
            self.discard_blob(&thumbnail).await;
        }
        result
    }

    fn persist(
        &self,
        mut run: GenerationRun,
        caller: Option<&AccountIdentity>,
        audio: SynthesizedAudio,
        thumbnail: Option<String>,
    ) -> MusicResult<GenerationOutcome> {
        let artifact = NewArtifact::new(audio.audio_location, audio.title)
            .with_duration(audio.duration_seconds)
            .with_thumbnail(thumbnail);
        if let Err(err) = artifact.validate() {
            return Err(run.fail(MusicError::GenerationFailed(err.to_string())));
        }

        let owner = caller.map(|c| c.account_id);
        let persisted = match self.store.persist_artifact(&artifact, owner) {
            Ok(persisted) => persisted,
            Err(err) => return Err(run.fail(err)),
        };
        run.advance(GenerationState::ArtifactPersisted);
        run.advance(if persisted.ownership.is_some() {
            GenerationState::OwnershipLinked
        } else {
            GenerationState::SkippedLinking
        });
        run.advance(GenerationState::Completed);

        info!(
            "Generated entry {} \"{}\" via {}",
            persisted.entry.id,
            persisted.entry.title,
            self.synthesis.name()
        );
        Ok(GenerationOutcome {
            entry: persisted.entry,
            ownership: persisted.ownership,
            states: run.states,
        })
    }

    async fn discard_blob(&self, location: &str) {
        if let Err(err) = self.blobs.delete(location).await {
            warn!("Could not discard blob {}: {}", location, err);
        }
    }
}
