use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("Unknown sort property: {0}")]
    InvalidSort(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
}

impl Order {
    /// Parses `property` or `property,asc|desc`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(',').map(str::trim);
        let property = parts.next().filter(|p| !p.is_empty())?.to_string();
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Direction::Asc,
            Some("desc") => Direction::Desc,
            Some(_) => return None,
        };
        Some(Order {
            property,
            direction,
        })
    }
}

/// Zero-based page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pageable {
    pub page: i64,
    pub size: i64,
    pub sort: Vec<Order>,
}

impl Pageable {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page: page.max(0),
            size: size.max(1),
            sort: Vec::new(),
        }
    }

    pub fn with_sort(mut self, order: Order) -> Self {
        self.sort.push(order);
        self
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }

    /// Builds an `ORDER BY` body from the requested orders.
    ///
    /// `columns` maps wire property names to column names; anything not
    /// listed is rejected so user input never reaches the SQL text. `id`
    /// is always appended as a tie-breaker.
    pub fn order_by(&self, columns: &[(&str, &str)]) -> Result<String, PaginationError> {
        let mut clauses = Vec::with_capacity(self.sort.len() + 1);
        let mut has_id = false;
        for order in &self.sort {
            let column = columns
                .iter()
                .find(|(property, _)| *property == order.property)
                .map(|(_, column)| *column)
                .ok_or_else(|| PaginationError::InvalidSort(order.property.clone()))?;
            has_id |= column == "id";
            clauses.push(format!("{} {}", column, order.direction.as_sql()));
        }
        if !has_id {
            clauses.push("id ASC".to_string());
        }
        Ok(clauses.join(", "))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pageable: &Pageable, total_elements: i64) -> Self {
        Self {
            content,
            page: pageable.page,
            size: pageable.size,
            total_elements,
        }
    }

    pub fn total_pages(&self) -> i64 {
        (self.total_elements + self.size - 1) / self.size
    }

    /// Swaps the content for a re-assembled list, keeping the paging metadata.
    pub fn with_content<U>(self, content: Vec<U>) -> Page<U> {
        Page {
            content,
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}
