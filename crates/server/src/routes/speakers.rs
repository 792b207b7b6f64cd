use axum::{
    Json, Router,
    extract::{OriginalUri, Path, State},
    response::Response,
    routing::get,
};
use db::{
    graph::{ConferenceKey, EntityGraph, SpeakerKey},
    models::{
        conference::Conference,
        speaker::{Speaker, SpeakerPayload},
    },
    repositories::SpeakerRepository,
};
use deployment::Deployment;
use sqlx::SqliteConnection;

use super::{
    created, deleted, missing_id, params::eagerload_param, persisted_id, updated,
    validation::{missing_reference, require_existing, require_matching_id, require_new},
};
use crate::{DeploymentImpl, error::ApiError};

const ENTITY_NAME: &str = "speaker";

/// Adds the speaker and the conferences it is booked for to the graph.
async fn load_speaker(
    conn: &mut SqliteConnection,
    graph: &mut EntityGraph,
    speaker: Speaker,
) -> Result<SpeakerKey, ApiError> {
    let current = match speaker.id {
        Some(id) => Conference::find_by_speaker(&mut *conn, id).await?,
        None => Vec::new(),
    };
    let key = graph.insert_speaker(speaker);
    let conferences: Vec<ConferenceKey> = current
        .into_iter()
        .map(|conference| graph.insert_conference(conference))
        .collect();
    graph.set_speaker_conferences(key, conferences);
    Ok(key)
}

/// Resolves `{id}` references; every one of them must exist.
async fn load_conferences(
    conn: &mut SqliteConnection,
    graph: &mut EntityGraph,
    ids: &[i64],
) -> Result<Vec<ConferenceKey>, ApiError> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let found = Conference::find_by_ids(&mut *conn, &ids).await?;
    if let Some(missing) = ids
        .iter()
        .find(|id| !found.iter().any(|c| c.id == Some(**id)))
    {
        return Err(missing_reference("conference", *missing));
    }
    Ok(found
        .into_iter()
        .map(|conference| graph.insert_conference(conference))
        .collect())
}

/// Writes the speaker's join rows from the graph and reads it back eagerly.
async fn store_conferences(
    conn: &mut SqliteConnection,
    graph: &EntityGraph,
    key: SpeakerKey,
    id: i64,
) -> Result<Speaker, ApiError> {
    Speaker::replace_conferences(&mut *conn, id, &graph.speaker_conference_ids(key)).await?;
    SpeakerRepository::find_one_with_eager_relationships(&mut *conn, id)
        .await?
        .ok_or(ApiError::NotFound)
}

async fn create_speaker(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<SpeakerPayload>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to save Speaker : {:?}", payload);
    require_new(ENTITY_NAME, payload.id)?;

    let mut tx = deployment.db().pool.begin().await?;
    let mut graph = EntityGraph::new();
    let key = graph.insert_speaker(payload.to_speaker());
    if let Some(ids) = payload.conference_ids() {
        let conferences = load_conferences(&mut tx, &mut graph, &ids).await?;
        graph.set_speaker_conferences(key, conferences);
    }

    let saved = Speaker::create(&mut *tx, graph.speaker(key)).await?;
    let id = persisted_id(saved.id)?;
    graph.assign_speaker_id(key, id)?;
    let speaker = store_conferences(&mut tx, &graph, key, id).await?;
    tx.commit().await?;

    Ok(created(
        &deployment.config().app_name,
        ENTITY_NAME,
        "speakers",
        id,
        speaker,
    ))
}

async fn update_speaker(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
    Json(payload): Json<SpeakerPayload>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to update Speaker : {}, {:?}", id, payload);
    require_matching_id(ENTITY_NAME, id, payload.id)?;

    let mut tx = deployment.db().pool.begin().await?;
    require_existing(ENTITY_NAME, Speaker::exists(&mut *tx, id).await?)?;

    let mut graph = EntityGraph::new();
    let key = load_speaker(&mut tx, &mut graph, payload.to_speaker()).await?;
    let ids = payload.conference_ids().unwrap_or_default();
    let conferences = load_conferences(&mut tx, &mut graph, &ids).await?;
    graph.set_speaker_conferences(key, conferences);

    Speaker::update(&mut *tx, graph.speaker(key)).await?;
    let speaker = store_conferences(&mut tx, &graph, key, id).await?;
    tx.commit().await?;

    Ok(updated(&deployment.config().app_name, ENTITY_NAME, id, speaker))
}

async fn partial_update_speaker(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
    Json(payload): Json<SpeakerPayload>,
) -> Result<Response, ApiError> {
    tracing::debug!(
        "REST request to partial update Speaker partially : {}, {:?}",
        id,
        payload
    );
    require_matching_id(ENTITY_NAME, id, payload.id)?;

    let mut tx = deployment.db().pool.begin().await?;
    require_existing(ENTITY_NAME, Speaker::exists(&mut *tx, id).await?)?;
    let mut speaker = Speaker::find_by_id(&mut *tx, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    speaker.merge(&payload);

    let mut graph = EntityGraph::new();
    let key = load_speaker(&mut tx, &mut graph, speaker).await?;
    if let Some(ids) = payload.conference_ids() {
        let conferences = load_conferences(&mut tx, &mut graph, &ids).await?;
        graph.set_speaker_conferences(key, conferences);
    }

    Speaker::update(&mut *tx, graph.speaker(key)).await?;
    let speaker = store_conferences(&mut tx, &graph, key, id).await?;
    tx.commit().await?;

    Ok(updated(&deployment.config().app_name, ENTITY_NAME, id, speaker))
}

async fn get_all_speakers(
    State(deployment): State<DeploymentImpl>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Vec<Speaker>>, ApiError> {
    tracing::debug!("REST request to get all Speakers");
    let mut conn = deployment.db().pool.acquire().await?;
    let speakers = if eagerload_param(uri.query()) {
        SpeakerRepository::find_all_with_eager_relationships(&mut conn).await?
    } else {
        Speaker::find_all(&mut *conn).await?
    };
    Ok(Json(speakers))
}

async fn get_speaker(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<Json<Speaker>, ApiError> {
    tracing::debug!("REST request to get Speaker : {}", id);
    SpeakerRepository::find_one_with_eager_relationships(&deployment.db().pool, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn delete_speaker(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to delete Speaker : {}", id);
    Speaker::delete(&deployment.db().pool, id).await?;
    Ok(deleted(&deployment.config().app_name, ENTITY_NAME, id))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/speakers",
            get(get_all_speakers)
                .post(create_speaker)
                .put(missing_id)
                .patch(missing_id),
        )
        .route(
            "/speakers/{id}",
            get(get_speaker)
                .put(update_speaker)
                .patch(partial_update_speaker)
                .delete(delete_speaker),
        )
}
