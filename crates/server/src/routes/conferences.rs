use axum::{
    Json, Router,
    extract::{Path, State},
    response::Response,
    routing::get,
};
use db::models::{
    conference::{Conference, ConferencePayload},
    session::Session,
};
use deployment::Deployment;

use super::{
    created, deleted, missing_id, persisted_id, updated,
    validation::{require_existing, require_matching_id, require_new, require_title},
};
use crate::{DeploymentImpl, error::ApiError};

const ENTITY_NAME: &str = "conference";

async fn create_conference(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<ConferencePayload>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to save Conference : {:?}", payload);
    require_new(ENTITY_NAME, payload.id)?;
    require_title(ENTITY_NAME, payload.title.as_deref())?;

    let conference =
        Conference::create(&deployment.db().pool, &payload.into_conference()).await?;
    let id = persisted_id(conference.id)?;
    Ok(created(
        &deployment.config().app_name,
        ENTITY_NAME,
        "conferences",
        id,
        conference,
    ))
}

async fn update_conference(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
    Json(payload): Json<ConferencePayload>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to update Conference : {}, {:?}", id, payload);
    require_matching_id(ENTITY_NAME, id, payload.id)?;
    require_title(ENTITY_NAME, payload.title.as_deref())?;

    let mut tx = deployment.db().pool.begin().await?;
    require_existing(ENTITY_NAME, Conference::exists(&mut *tx, id).await?)?;
    let conference = Conference::update(&mut *tx, &payload.into_conference()).await?;
    tx.commit().await?;

    Ok(updated(&deployment.config().app_name, ENTITY_NAME, id, conference))
}

async fn partial_update_conference(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
    Json(payload): Json<ConferencePayload>,
) -> Result<Response, ApiError> {
    tracing::debug!(
        "REST request to partial update Conference partially : {}, {:?}",
        id,
        payload
    );
    require_matching_id(ENTITY_NAME, id, payload.id)?;
    if payload.title.is_some() {
        require_title(ENTITY_NAME, payload.title.as_deref())?;
    }

    let mut tx = deployment.db().pool.begin().await?;
    require_existing(ENTITY_NAME, Conference::exists(&mut *tx, id).await?)?;
    let mut conference = Conference::find_by_id(&mut *tx, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    conference.merge(payload);
    let conference = Conference::update(&mut *tx, &conference).await?;
    tx.commit().await?;

    Ok(updated(&deployment.config().app_name, ENTITY_NAME, id, conference))
}

async fn get_all_conferences(
    State(deployment): State<DeploymentImpl>,
) -> Result<Json<Vec<Conference>>, ApiError> {
    tracing::debug!("REST request to get all Conferences");
    let conferences = Conference::find_all(&deployment.db().pool).await?;
    Ok(Json(conferences))
}

async fn get_conference(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<Json<Conference>, ApiError> {
    tracing::debug!("REST request to get Conference : {}", id);
    Conference::find_by_id(&deployment.db().pool, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// The conference's side of the conference/session association.
async fn get_conference_sessions(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Session>>, ApiError> {
    tracing::debug!("REST request to get Sessions of Conference : {}", id);
    let mut conn = deployment.db().pool.acquire().await?;
    if !Conference::exists(&mut *conn, id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(Session::find_by_conference(&mut *conn, id).await?))
}

async fn delete_conference(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to delete Conference : {}", id);
    Conference::delete(&deployment.db().pool, id).await?;
    Ok(deleted(&deployment.config().app_name, ENTITY_NAME, id))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/conferences",
            get(get_all_conferences)
                .post(create_conference)
                .put(missing_id)
                .patch(missing_id),
        )
        .route(
            "/conferences/{id}",
            get(get_conference)
                .put(update_conference)
                .patch(partial_update_conference)
                .delete(delete_conference),
        )
        .route("/conferences/{id}/sessions", get(get_conference_sessions))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::*;

    #[tokio::test]
    async fn create_assigns_id_and_alerts() {
        let app = test_app().await;
        let (status, headers, body) = send(
            &app,
            "POST",
            "/api/conferences",
            Some(json!({"title": "DevCon", "date": "2024-05-01", "place": "Berlin"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_i64().expect("id assigned");
        assert_eq!(header(&headers, "location"), format!("/api/conferences/{id}"));
        assert_eq!(
            header(&headers, "x-conferenceapp-alert"),
            "conferenceApp.conference.created"
        );
        assert_eq!(header(&headers, "x-conferenceapp-params"), id.to_string());
        assert_eq!(body["date"], "2024-05-01");

        let (status, _, sessions) =
            send(&app, "GET", &format!("/api/conferences/{id}/sessions"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sessions, json!([]));
    }

    #[tokio::test]
    async fn create_rejects_existing_id_and_missing_title() {
        let app = test_app().await;
        let (status, headers, body) = send(
            &app,
            "POST",
            "/api/conferences",
            Some(json!({"id": 5, "title": "DevCon"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorKey"], "idexists");
        assert_eq!(body["entityName"], "conference");
        assert_eq!(header(&headers, "x-conferenceapp-error"), "error.idexists");
        assert_eq!(header(&headers, "x-conferenceapp-params"), "conference");

        let (status, _, body) =
            send(&app, "POST", "/api/conferences", Some(json!({"place": "Oslo"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorKey"], "titlerequired");

        let (_, _, all) = send(&app, "GET", "/api/conferences", None).await;
        assert_eq!(all, json!([]));
    }

    #[tokio::test]
    async fn full_update_overwrites_and_patch_merges() {
        let app = test_app().await;
        let (_, _, created) = send(
            &app,
            "POST",
            "/api/conferences",
            Some(json!({"title": "DevCon", "description": "yearly", "place": "Berlin"})),
        )
        .await;
        let id = created["id"].as_i64().unwrap();
        let uri = format!("/api/conferences/{id}");

        let (status, headers, body) = send(
            &app,
            "PATCH",
            &uri,
            Some(json!({"id": id, "place": "Lisbon"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            header(&headers, "x-conferenceapp-alert"),
            "conferenceApp.conference.updated"
        );
        assert_eq!(body["title"], "DevCon");
        assert_eq!(body["description"], "yearly");
        assert_eq!(body["place"], "Lisbon");

        let (status, _, body) =
            send(&app, "PUT", &uri, Some(json!({"id": id, "title": "RustConf"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "RustConf");
        assert_eq!(body["description"], json!(null));
        assert_eq!(body["place"], json!(null));

        let (status, _, fetched) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, body);
    }

    #[tokio::test]
    async fn update_id_rules() {
        let app = test_app().await;
        let (_, _, created) =
            send(&app, "POST", "/api/conferences", Some(json!({"title": "DevCon"}))).await;
        let id = created["id"].as_i64().unwrap();

        let (status, _, body) = send(
            &app,
            "PUT",
            &format!("/api/conferences/{id}"),
            Some(json!({"title": "DevCon"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorKey"], "idnull");

        let (_, _, body) = send(
            &app,
            "PATCH",
            &format!("/api/conferences/{id}"),
            Some(json!({"id": id + 1, "title": "DevCon"})),
        )
        .await;
        assert_eq!(body["errorKey"], "idinvalid");

        let (status, _, body) = send(
            &app,
            "PUT",
            "/api/conferences/999",
            Some(json!({"id": 999, "title": "Ghost"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorKey"], "idnotfound");

        let (_, _, body) = send(
            &app,
            "PATCH",
            &format!("/api/conferences/{id}"),
            Some(json!({"id": id, "title": ""})),
        )
        .await;
        assert_eq!(body["errorKey"], "titlerequired");
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let app = test_app().await;
        let (_, _, created) =
            send(&app, "POST", "/api/conferences", Some(json!({"title": "DevCon"}))).await;
        let uri = format!("/api/conferences/{}", created["id"]);

        let (status, headers, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(
            header(&headers, "x-conferenceapp-alert"),
            "conferenceApp.conference.deleted"
        );

        let (status, _, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!(null));
    }
}
