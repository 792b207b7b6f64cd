//! Response header helpers shared by every entity resource.
//!
//! Alerts travel as `X-<app>-alert` / `X-<app>-error` plus `X-<app>-params`,
//! and paged listings carry `X-Total-Count` and an RFC 5988 `Link` header.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use url::form_urlencoded;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

fn insert(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => tracing::warn!("Skipping invalid header {}: {}", name, value),
    }
}

pub fn alert(app_name: &str, message: &str, param: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, &format!("X-{app_name}-alert"), message);
    insert(
        &mut headers,
        &format!("X-{app_name}-params"),
        &form_urlencoded::byte_serialize(param.as_bytes()).collect::<String>(),
    );
    headers
}

pub fn entity_creation_alert(app_name: &str, entity_name: &str, id: &str) -> HeaderMap {
    alert(app_name, &format!("{app_name}.{entity_name}.created"), id)
}

pub fn entity_update_alert(app_name: &str, entity_name: &str, id: &str) -> HeaderMap {
    alert(app_name, &format!("{app_name}.{entity_name}.updated"), id)
}

pub fn entity_deletion_alert(app_name: &str, entity_name: &str, id: &str) -> HeaderMap {
    alert(app_name, &format!("{app_name}.{entity_name}.deleted"), id)
}

pub fn failure_alert(app_name: &str, entity_name: &str, error_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, &format!("X-{app_name}-error"), &format!("error.{error_key}"));
    insert(&mut headers, &format!("X-{app_name}-params"), entity_name);
    headers
}

/// Rewrites `page`/`size` in the request's query while keeping every other
/// parameter (sort, eagerload, ...).
fn page_link(path: &str, query: Option<&str>, page: i64, size: i64, rel: &str) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Some(query) = query {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key != "page" && key != "size" {
                serializer.append_pair(&key, &value);
            }
        }
    }
    serializer.append_pair("page", &page.to_string());
    serializer.append_pair("size", &size.to_string());
    format!("<{}?{}>; rel=\"{}\"", path, serializer.finish(), rel)
}

pub fn pagination_headers(
    path: &str,
    query: Option<&str>,
    page: i64,
    size: i64,
    total_elements: i64,
    total_pages: i64,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, TOTAL_COUNT_HEADER, &total_elements.to_string());

    let mut links = Vec::with_capacity(4);
    if page.saturating_add(1) < total_pages {
        links.push(page_link(path, query, page + 1, size, "next"));
    }
    if page > 0 {
        links.push(page_link(path, query, page - 1, size, "prev"));
    }
    let last_page = (total_pages - 1).max(0);
    links.push(page_link(path, query, last_page, size, "last"));
    links.push(page_link(path, query, 0, size, "first"));
    insert(&mut headers, "link", &links.join(","));

    headers
}
