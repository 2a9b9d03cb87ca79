//! Generation, listing, collection and like routes.

use super::api_response::{created, ok, ok_message};
use super::metrics::{record_generation, record_like_action};
use super::session::Session;
use super::state::{GuardedListingService, GuardedMusicStore, GuardedOrchestrator, ServerState};
use crate::generation::GenerationOutcome;
use crate::music_store::{CatalogEntryId, MusicError, MusicResult};
use crate::providers::ImageInput;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const IMAGE_FIELD_NAMES: [&str; 2] = ["image", "file"];
const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "png", "gif", "bmp", "webp"];

#[derive(Deserialize, Debug)]
struct TextGenerationBody {
    prompt1: String,
    prompt2: Option<String>,
}

#[derive(Deserialize, Debug)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedMusic {
    id: CatalogEntryId,
    title: String,
    music_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_url: Option<String>,
    saved_to_collection: bool,
}

impl From<GenerationOutcome> for GeneratedMusic {
    fn from(outcome: GenerationOutcome) -> Self {
        GeneratedMusic {
            id: outcome.entry.id,
            title: outcome.entry.title,
            music_url: outcome.entry.audio_location,
            thumbnail_url: outcome.entry.thumbnail_location,
            saved_to_collection: outcome.ownership.is_some(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeStatus {
    music_id: CatalogEntryId,
    like_count: usize,
    pressed: bool,
}

fn generation_response(
    input: &str,
    started: Instant,
    result: MusicResult<GenerationOutcome>,
) -> Response {
    match result {
        Ok(outcome) => {
            record_generation(input, "completed", started.elapsed());
            created(GeneratedMusic::from(outcome))
        }
        Err(err) => {
            record_generation(input, err.code(), started.elapsed());
            err.into_response()
        }
    }
}

/// Turns an extractor rejection into the regular invalid-input error.
fn accept<T>(extracted: Result<T, impl std::fmt::Display>) -> MusicResult<T> {
    extracted.map_err(|rejection| {
        MusicError::InvalidArtifact(format!("malformed request: {}", rejection))
    })
}

async fn generate_from_text(
    session: Option<Session>,
    State(orchestrator): State<GuardedOrchestrator>,
    body: Result<Json<TextGenerationBody>, JsonRejection>,
) -> MusicResult<Response> {
    let Json(body) = accept(body)?;
    let started = Instant::now();
    let caller = session.as_ref().map(|s| &s.identity);
    let result = orchestrator
        .generate_from_text(caller, &body.prompt1, body.prompt2.as_deref())
        .await;
    Ok(generation_response("text", started, result))
}

fn invalid_upload(reason: impl std::fmt::Display) -> MusicError {
    MusicError::InvalidArtifact(format!("invalid image upload: {}", reason))
}

/// Pulls the image out of the multipart form and checks its size and type.
async fn read_image(mut multipart: Multipart) -> MusicResult<ImageInput> {
    while let Some(field) = multipart.next_field().await.map_err(invalid_upload)? {
        let is_image_field = field
            .name()
            .map(|name| IMAGE_FIELD_NAMES.contains(&name))
            .unwrap_or(false);
        if !is_image_field {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(invalid_upload)?;
        if bytes.is_empty() {
            return Err(invalid_upload("file is empty"));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(invalid_upload(format!(
                "file is larger than {} bytes",
                MAX_IMAGE_BYTES
            )));
        }
        let kind = infer::get(&bytes)
            .filter(|kind| ALLOWED_IMAGE_EXTENSIONS.contains(&kind.extension()))
            .ok_or_else(|| invalid_upload("unsupported file type"))?;

        debug!("Received image {} ({} bytes)", file_name, bytes.len());
        return Ok(ImageInput {
            bytes: bytes.to_vec(),
            file_name,
            mime_type: kind.mime_type().to_string(),
        });
    }
    Err(invalid_upload("no image field in form"))
}

async fn generate_from_image(
    session: Option<Session>,
    State(orchestrator): State<GuardedOrchestrator>,
    multipart: Multipart,
) -> Response {
    let started = Instant::now();
    let image = match read_image(multipart).await {
        Ok(image) => image,
        Err(err) => return err.into_response(),
    };
    let caller = session.as_ref().map(|s| &s.identity);
    let result = orchestrator.generate_from_image(caller, image).await;
    generation_response("image", started, result)
}

async fn get_recent(
    session: Option<Session>,
    State(listing): State<GuardedListingService>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> MusicResult<Response> {
    let Query(query) = accept(query)?;
    let viewer = session.as_ref().map(|s| &s.identity);
    Ok(ok(listing.recent(query.limit, viewer)?))
}

async fn get_popular(
    session: Option<Session>,
    State(listing): State<GuardedListingService>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> MusicResult<Response> {
    let Query(query) = accept(query)?;
    let viewer = session.as_ref().map(|s| &s.identity);
    Ok(ok(listing.popular(query.limit, viewer)?))
}

async fn get_my_collection(
    session: Session,
    State(listing): State<GuardedListingService>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> MusicResult<Response> {
    let Query(query) = accept(query)?;
    Ok(ok(listing.my_collection(session.account_id(), query.limit)?))
}

async fn get_music(
    session: Option<Session>,
    State(listing): State<GuardedListingService>,
    id: Result<Path<CatalogEntryId>, PathRejection>,
) -> MusicResult<Response> {
    let Path(id) = accept(id)?;
    let viewer = session.as_ref().map(|s| &s.identity);
    Ok(ok(listing.entry(id, viewer)?))
}

/// Removes the entry from the caller's collection. The catalog entry itself stays.
async fn delete_from_collection(
    session: Session,
    State(store): State<GuardedMusicStore>,
    id: Result<Path<CatalogEntryId>, PathRejection>,
) -> MusicResult<Response> {
    let Path(id) = accept(id)?;
    store.remove_ownership(session.account_id(), id)?;
    Ok(ok_message("Removed from your playlist"))
}

fn like_status(
    store: &GuardedMusicStore,
    music_id: CatalogEntryId,
    pressed: bool,
) -> MusicResult<LikeStatus> {
    Ok(LikeStatus {
        music_id,
        like_count: store.count_for(music_id)?,
        pressed,
    })
}

async fn like_music(
    session: Session,
    State(store): State<GuardedMusicStore>,
    id: Result<Path<CatalogEntryId>, PathRejection>,
) -> MusicResult<Response> {
    let Path(id) = accept(id)?;
    store.like(session.account_id(), id)?;
    let status = like_status(&store, id, true)?;
    record_like_action("like");
    Ok(created(status))
}

async fn unlike_music(
    session: Session,
    State(store): State<GuardedMusicStore>,
    id: Result<Path<CatalogEntryId>, PathRejection>,
) -> MusicResult<Response> {
    let Path(id) = accept(id)?;
    store.unlike(session.account_id(), id)?;
    let status = like_status(&store, id, false)?;
    record_like_action("unlike");
    Ok(ok(status))
}

pub fn make_music_routes(state: ServerState) -> Router {
    Router::new()
        .route("/generate-music", post(generate_from_text))
        .route(
            "/generate-music/image",
            post(generate_from_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
        .route("/playlist", get(get_recent))
        .route("/popular-playlist", get(get_popular))
        .route("/myplaylist", get(get_my_collection))
        .route("/music/{id}", get(get_music).delete(delete_from_collection))
        .route("/music/{id}/like", post(like_music).delete(unlike_music))
        .with_state(state)
}
