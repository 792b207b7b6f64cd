use axum::{
    Json, Router,
    extract::{OriginalUri, Path, State},
    http::HeaderMap,
    response::Response,
    routing::get,
};
use db::{
    graph::{AttendeeKey, EntityGraph, SessionKey},
    models::{
        attendee::{Attendee, AttendeePayload},
        session::Session,
    },
    repositories::AttendeeRepository,
};
use deployment::Deployment;
use sqlx::SqliteConnection;
use utils::headers::pagination_headers;

use super::{
    created, deleted, missing_id, params::list_params, persisted_id, updated,
    validation::{missing_reference, require_existing, require_matching_id, require_new},
};
use crate::{DeploymentImpl, error::ApiError};

const ENTITY_NAME: &str = "attendee";

async fn load_attendee(
    conn: &mut SqliteConnection,
    graph: &mut EntityGraph,
    attendee: Attendee,
) -> Result<AttendeeKey, ApiError> {
    let current = match attendee.id {
        Some(id) => Session::find_by_attendee(&mut *conn, id).await?,
        None => Vec::new(),
    };
    let key = graph.insert_attendee(attendee);
    let sessions: Vec<SessionKey> = current
        .into_iter()
        .map(|session| graph.insert_session(session))
        .collect();
    graph.set_attendee_sessions(key, sessions);
    Ok(key)
}

async fn load_sessions(
    conn: &mut SqliteConnection,
    graph: &mut EntityGraph,
    ids: &[i64],
) -> Result<Vec<SessionKey>, ApiError> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let found = Session::find_by_ids(&mut *conn, &ids).await?;
    if let Some(missing) = ids
        .iter()
        .find(|id| !found.iter().any(|s| s.id == Some(**id)))
    {
        return Err(missing_reference("session", *missing));
    }
    Ok(found
        .into_iter()
        .map(|session| graph.insert_session(session))
        .collect())
}

async fn store_sessions(
    conn: &mut SqliteConnection,
    graph: &EntityGraph,
    key: AttendeeKey,
    id: i64,
) -> Result<Attendee, ApiError> {
    Attendee::replace_sessions(&mut *conn, id, &graph.attendee_session_ids(key)).await?;
    AttendeeRepository::find_one_with_eager_relationships(&mut *conn, id)
        .await?
        .ok_or(ApiError::NotFound)
}

async fn create_attendee(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<AttendeePayload>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to save Attendee : {:?}", payload);
    require_new(ENTITY_NAME, payload.id)?;

    let mut tx = deployment.db().pool.begin().await?;
    let mut graph = EntityGraph::new();
    let key = graph.insert_attendee(payload.to_attendee());
    if let Some(ids) = payload.session_ids() {
        let sessions = load_sessions(&mut tx, &mut graph, &ids).await?;
        graph.set_attendee_sessions(key, sessions);
    }

    let saved = Attendee::create(&mut *tx, graph.attendee(key)).await?;
    let id = persisted_id(saved.id)?;
    graph.assign_attendee_id(key, id)?;
    let attendee = store_sessions(&mut tx, &graph, key, id).await?;
    tx.commit().await?;

    Ok(created(
        &deployment.config().app_name,
        ENTITY_NAME,
        "attendees",
        id,
        attendee,
    ))
}

async fn update_attendee(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
    Json(payload): Json<AttendeePayload>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to update Attendee : {}, {:?}", id, payload);
    require_matching_id(ENTITY_NAME, id, payload.id)?;

    let mut tx = deployment.db().pool.begin().await?;
    require_existing(ENTITY_NAME, Attendee::exists(&mut *tx, id).await?)?;

    let mut graph = EntityGraph::new();
    let key = load_attendee(&mut tx, &mut graph, payload.to_attendee()).await?;
    let ids = payload.session_ids().unwrap_or_default();
    let sessions = load_sessions(&mut tx, &mut graph, &ids).await?;
    graph.set_attendee_sessions(key, sessions);

    Attendee::update(&mut *tx, graph.attendee(key)).await?;
    let attendee = store_sessions(&mut tx, &graph, key, id).await?;
    tx.commit().await?;

    Ok(updated(&deployment.config().app_name, ENTITY_NAME, id, attendee))
}

async fn partial_update_attendee(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
    Json(payload): Json<AttendeePayload>,
) -> Result<Response, ApiError> {
    tracing::debug!(
        "REST request to partial update Attendee partially : {}, {:?}",
        id,
        payload
    );
    require_matching_id(ENTITY_NAME, id, payload.id)?;

    let mut tx = deployment.db().pool.begin().await?;
    require_existing(ENTITY_NAME, Attendee::exists(&mut *tx, id).await?)?;
    let mut attendee = Attendee::find_by_id(&mut *tx, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    attendee.merge(&payload);

    let mut graph = EntityGraph::new();
    let key = load_attendee(&mut tx, &mut graph, attendee).await?;
    if let Some(ids) = payload.session_ids() {
        let sessions = load_sessions(&mut tx, &mut graph, &ids).await?;
        graph.set_attendee_sessions(key, sessions);
    }

    Attendee::update(&mut *tx, graph.attendee(key)).await?;
    let attendee = store_sessions(&mut tx, &graph, key, id).await?;
    tx.commit().await?;

    Ok(updated(&deployment.config().app_name, ENTITY_NAME, id, attendee))
}

async fn get_all_attendees(
    State(deployment): State<DeploymentImpl>,
    OriginalUri(uri): OriginalUri,
) -> Result<(HeaderMap, Json<Vec<Attendee>>), ApiError> {
    tracing::debug!("REST request to get a page of Attendees");
    let params = list_params(uri.query(), deployment.config(), ENTITY_NAME)?;

    let mut conn = deployment.db().pool.acquire().await?;
    let page = if params.eagerload {
        AttendeeRepository::find_all_with_eager_relationships(&mut conn, &params.pageable).await?
    } else {
        AttendeeRepository::find_all(&mut conn, &params.pageable).await?
    };

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

async fn get_attendee(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<Json<Attendee>, ApiError> {
    tracing::debug!("REST request to get Attendee : {}", id);
    AttendeeRepository::find_one_with_eager_relationships(&deployment.db().pool, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn delete_attendee(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    tracing::debug!("REST request to delete Attendee : {}", id);
    Attendee::delete(&deployment.db().pool, id).await?;
    Ok(deleted(&deployment.config().app_name, ENTITY_NAME, id))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/attendees",
            get(get_all_attendees)
                .post(create_attendee)
                .put(missing_id)
                .patch(missing_id),
        )
        .route(
            "/attendees/{id}",
            get(get_attendee)
                .put(update_attendee)
                .patch(partial_update_attendee)
                .delete(delete_attendee),
        )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::routes::test_support::*;

    async fn create(app: &axum::Router, collection: &str, body: Value) -> Value {
        let (status, _, created) =
            send(app, "POST", &format!("/api/{collection}"), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        created
    }

    fn ids(value: &Value) -> Vec<i64> {
        value
            .as_array()
            .map(|items| items.iter().filter_map(|i| i["id"].as_i64()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn registration_round_trip() {
        let app = test_app().await;
        let intro = create(&app, "sessions", json!({"title": "Intro"})).await["id"]
            .as_i64()
            .unwrap();
        let outro = create(&app, "sessions", json!({"title": "Outro"})).await["id"]
            .as_i64()
            .unwrap();

        let (status, headers, attendee) = send(
            &app,
            "POST",
            "/api/attendees",
            Some(json!({
                "firstName": "Alan",
                "lastName": "Turing",
                "sessions": [{"id": outro}, {"id": intro}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = attendee["id"].as_i64().unwrap();
        assert_eq!(header(&headers, "location"), format!("/api/attendees/{id}"));
        assert_eq!(ids(&attendee["sessions"]), vec![intro, outro]);

        let uri = format!("/api/attendees/{id}");
        let (_, _, patched) = send(
            &app,
            "PATCH",
            &uri,
            Some(json!({"id": id, "telephone": "555-0100"})),
        )
        .await;
        assert_eq!(patched["lastName"], "Turing");
        assert_eq!(patched["telephone"], "555-0100");
        assert_eq!(ids(&patched["sessions"]), vec![intro, outro]);

        let (_, _, patched) = send(
            &app,
            "PATCH",
            &uri,
            Some(json!({"id": id, "sessions": [{"id": outro}]})),
        )
        .await;
        assert_eq!(ids(&patched["sessions"]), vec![outro]);

        // Deleting a session drops the registration, not the attendee.
        send(&app, "DELETE", &format!("/api/sessions/{outro}"), None).await;
        let (status, _, fetched) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["sessions"], json!([]));

        let (status, _, replaced) =
            send(&app, "PUT", &uri, Some(json!({"id": id, "firstName": "A."}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replaced["firstName"], "A.");
        assert_eq!(replaced["lastName"], json!(null));
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let app = test_app().await;
        let attendee = create(&app, "attendees", json!({"firstName": "Alan"})).await;
        let id = attendee["id"].as_i64().unwrap();

        let (status, _, body) = send(
            &app,
            "PUT",
            &format!("/api/attendees/{id}"),
            Some(json!({"id": id, "firstName": "Alan", "sessions": [{"id": 12}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorKey"], "idnotfound");
        assert_eq!(body["entityName"], "session");

        let (_, _, fetched) = send(&app, "GET", &format!("/api/attendees/{id}"), None).await;
        assert_eq!(fetched["firstName"], "Alan");
    }

    #[tokio::test]
    async fn paged_list_eager_and_lazy() {
        let app = test_app().await;
        let session = create(&app, "sessions", json!({"title": "Intro"})).await;
        for name in ["Carol", "Alice", "Bob"] {
            create(
                &app,
                "attendees",
                json!({"firstName": name, "sessions": [{"id": session["id"]}]}),
            )
            .await;
        }

        let (status, headers, page) =
            send(&app, "GET", "/api/attendees?sort=firstName,desc", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header(&headers, "x-total-count"), "3");
        assert_eq!(page[0]["firstName"], "Carol");
        assert_eq!(page[1]["firstName"], "Bob");
        assert_eq!(ids(&page[0]["sessions"]), vec![session["id"].as_i64().unwrap()]);

        let (_, _, lazy) = send(
            &app,
            "GET",
            "/api/attendees?sort=firstName,desc&page=1&eagerload=false",
            None,
        )
        .await;
        assert_eq!(lazy.as_array().unwrap().len(), 1);
        assert_eq!(lazy[0]["firstName"], "Alice");
        assert!(lazy[0].get("sessions").is_none());

        let (status, _, body) = send(&app, "GET", "/api/attendees?sort=age", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["entityName"], "attendee");
    }
}
