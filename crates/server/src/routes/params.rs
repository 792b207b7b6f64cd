//! Query-string handling shared by the list endpoints.
//!
//! `sort` may repeat (`?sort=lastName,desc&sort=id`), which the stock
//! `Query` extractor cannot express, so the raw query is parsed here.

use db::pagination::{Order, Pageable};
use url::form_urlencoded;
use utils::config::AppConfig;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub pageable: Pageable,
    pub eagerload: bool,
}

/// `eagerload` is off only for a literal `false`, in any case.
fn flag(value: &str) -> bool {
    !value.trim().eq_ignore_ascii_case("false")
}

/// The `eagerload` flag alone, for lists that are not paged.
pub fn eagerload_param(query: Option<&str>) -> bool {
    form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .filter(|(key, _)| key == "eagerload")
        .last()
        .is_none_or(|(_, value)| flag(&value))
}

/// `page` is zero-based; `size` is clamped to `1..=max_page_size`. Numbers
/// that do not parse fall back to the defaults, a malformed `sort` does not.
/// A `page` whose end offset does not fit in an `i64` is rejected.
pub fn list_params(
    query: Option<&str>,
    config: &AppConfig,
    entity_name: &'static str,
) -> Result<ListParams, ApiError> {
    let mut page = 0;
    let mut size = config.default_page_size;
    let mut sort = Vec::new();
    let mut eagerload = true;

    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "page" => page = value.trim().parse::<i64>().unwrap_or(0).max(0),
            "size" => {
                size = value
                    .trim()
                    .parse()
                    .unwrap_or(config.default_page_size)
                    .clamp(1, config.max_page_size)
            }
            "sort" => {
                let order = Order::parse(&value).ok_or_else(|| {
                    ApiError::bad_request(
                        entity_name,
                        "sortinvalid",
                        format!("Malformed sort parameter: {value}"),
                    )
                })?;
                sort.push(order);
            }
            "eagerload" => eagerload = flag(&value),
            _ => {}
        }
    }

    if page.checked_add(1).and_then(|p| p.checked_mul(size)).is_none() {
        return Err(ApiError::bad_request(
            entity_name,
            "pageinvalid",
            format!("Page {page} is out of range"),
        ));
    }

    let mut pageable = Pageable::new(page, size);
    pageable.sort = sort;
    Ok(ListParams {
        pageable,
        eagerload,
    })
}
