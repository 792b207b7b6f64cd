use axum::{
    Json, Router,
    extract::{OriginalUri, Path, State},
    http::HeaderMap,
    response::Response,
    routing::get,
};
use db::{
    graph::{EntityGraph, SessionKey},
    models::{
        conference::Conference,
        session::{Session, SessionPayload},
        speaker::Speaker,
    },
    pagination::Page,
    repositories::SessionRepository,
};
use deployment::Deployment;
use sqlx::SqliteConnection;
use utils::headers::pagination_headers;

use super::{
    created, deleted, missing_id, params::list_params, persisted_id, updated,
    validation::{missing_reference, require_existing, require_matching_id, require_new, require_title},
};
use crate::{DeploymentImpl, error::ApiError};

const ENTITY_NAME: &str = "session";

/// Adds `session` to the graph together with the speaker and conference it
/// currently points at.
async fn load_session(
    conn: &mut SqliteConnection,
    graph: &mut EntityGraph,
    session: Session,
) -> Result<SessionKey, ApiError> {
    let speaker = match session.speaker_id {
        Some(id) => Speaker::find_by_id(&mut *conn, id).await?,
        None => None,
    };
    let conference = match session.conference_id {
        Some(id) => Conference::find_by_id(&mut *conn, id).await?,
        None => None,
    };

    let key = graph.insert_session(session);
    if let Some(speaker) = speaker {
        let speaker = graph.insert_speaker(speaker);
        graph.add_speaker_session(speaker, key);
    }
    if let Some(conference) = conference {
        let conference = graph.insert_conference(conference);
        graph.add_conference_session(conference, key);
    }
    Ok(key)
}

/// Points the session at the speaker and conference named in `payload`.
/// An absent reference detaches the session when `clear_absent` is set
/// (full update) and is left alone otherwise (merge-patch).
async fn apply_references(
    conn: &mut SqliteConnection,
    graph: &mut EntityGraph,
    key: SessionKey,
    payload: &SessionPayload,
    clear_absent: bool,
) -> Result<(), ApiError> {
    match payload.speaker {
        Some(reference) => {
            let speaker = Speaker::find_by_id(&mut *conn, reference.id)
                .await?
                .ok_or_else(|| missing_reference("speaker", reference.id))?;
            let speaker = graph.insert_speaker(speaker);
            graph.set_session_speaker(key, Some(speaker));
        }
        None if clear_absent => graph.set_session_speaker(key, None),
        None => {}
    }

    match payload.conference {
        Some(reference) => {
            let conference = Conference::find_by_id(&mut *conn, reference.id)
                .await?
                .ok_or_else(|| missing_reference("conference", reference.id))?;
            let conference = graph.insert_conference(conference);
            graph.set_session_conference(key, Some(conference));
        }
        None if clear_absent => graph.set_session_conference(key, None),
        None => {}
    }
    Ok(())
}

async fn create_session(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<SessionPayload>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to save Session : {:?}", payload);
    require_new(ENTITY_NAME, payload.id)?;
    require_title(ENTITY_NAME, payload.title.as_deref())?;

    let mut tx = deployment.db().pool.begin().await?;
    let mut graph = EntityGraph::new();
    let key = graph.insert_session(payload.to_session());
    apply_references(&mut tx, &mut graph, key, &payload, true).await?;

    let saved = Session::create(&mut *tx, &graph.session_record(key)).await?;
    let id = persisted_id(saved.id)?;
    graph.assign_session_id(key, id)?;
    let session = SessionRepository::find_one_with_references(&mut tx, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    tx.commit().await?;

    Ok(created(
        &deployment.config().app_name,
        ENTITY_NAME,
        "sessions",
        id,
        session,
    ))
}

async fn update_session(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
    Json(payload): Json<SessionPayload>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to update Session : {}, {:?}", id, payload);
    require_matching_id(ENTITY_NAME, id, payload.id)?;
    require_title(ENTITY_NAME, payload.title.as_deref())?;

    let mut tx = deployment.db().pool.begin().await?;
    require_existing(ENTITY_NAME, Session::exists(&mut *tx, id).await?)?;
    let mut session = Session::find_by_id(&mut *tx, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    session.overwrite(&payload);

    let mut graph = EntityGraph::new();
    let key = load_session(&mut tx, &mut graph, session).await?;
    apply_references(&mut tx, &mut graph, key, &payload, true).await?;
    Session::update(&mut *tx, &graph.session_record(key)).await?;

    let session = SessionRepository::find_one_with_references(&mut tx, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    tx.commit().await?;

    Ok(updated(&deployment.config().app_name, ENTITY_NAME, id, session))
}

async fn partial_update_session(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
    Json(payload): Json<SessionPayload>,
) -> Result<Response, ApiError> {
    tracing::debug!(
        "REST request to partial update Session partially : {}, {:?}",
        id,
        payload
    );
    require_matching_id(ENTITY_NAME, id, payload.id)?;
    if payload.title.is_some() {
        require_title(ENTITY_NAME, payload.title.as_deref())?;
    }

    let mut tx = deployment.db().pool.begin().await?;
    require_existing(ENTITY_NAME, Session::exists(&mut *tx, id).await?)?;
    let mut session = Session::find_by_id(&mut *tx, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    session.merge(&payload);

    let mut graph = EntityGraph::new();
    let key = load_session(&mut tx, &mut graph, session).await?;
    apply_references(&mut tx, &mut graph, key, &payload, false).await?;
    Session::update(&mut *tx, &graph.session_record(key)).await?;

    let session = SessionRepository::find_one_with_references(&mut tx, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    tx.commit().await?;

    Ok(updated(&deployment.config().app_name, ENTITY_NAME, id, session))
}

async fn get_all_sessions(
    State(deployment): State<DeploymentImpl>,
    OriginalUri(uri): OriginalUri,
) -> Result<(HeaderMap, Json<Vec<Session>>), ApiError> {
    tracing::debug!("REST request to get a page of Sessions");
    let params = list_params(uri.query(), deployment.config(), ENTITY_NAME)?;

    let mut conn = deployment.db().pool.acquire().await?;
    let total = Session::count(&mut *conn).await?;
    let content = Session::find_page(&mut *conn, &params.pageable).await?;
    let content = SessionRepository::fetch_references(&mut conn, content).await?;
    let page = Page::new(content, &params.pageable, total);

    let headers = pagination_headers(
        uri.path(),
        uri.query(),
        page.page,
        page.size,
        page.total_elements,
        page.total_pages(),
    );
    Ok((headers, Json(page.content)))
}

async fn get_session(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<Json<Session>, ApiError> {
    tracing::debug!("REST request to get Session : {}", id);
    let mut conn = deployment.db().pool.acquire().await?;
    SessionRepository::find_one_with_references(&mut conn, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn delete_session(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to delete Session : {}", id);
    Session::delete(&deployment.db().pool, id).await?;
    Ok(deleted(&deployment.config().app_name, ENTITY_NAME, id))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/sessions",
            get(get_all_sessions)
                .post(create_session)
                .put(missing_id)
                .patch(missing_id),
        )
        .route(
            "/sessions/{id}",
            get(get_session)
                .put(update_session)
                .patch(partial_update_session)
                .delete(delete_session),
        )
}
