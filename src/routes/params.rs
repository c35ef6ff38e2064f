use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    #[serde(alias = "per_page")]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Returns `(page, limit, offset)` with defaults applied and bounds enforced.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        // huge pages saturate to an offset past every row
        let offset = (page - 1).saturating_mul(limit);
        (page, limit, offset)
    }
}

// Query structs list page fields inline: serde_urlencoded cannot parse
// numbers through `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Exact brand match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<i64>,
    /// Case-insensitive substring over name or brand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(alias = "per_page", skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    /// `pending` or `completed`.
    pub status: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "per_page")]
    pub limit: Option<i64>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(page: i64, limit: i64) -> Pagination {
        Pagination {
            page: Some(page),
            limit: Some(limit),
        }
    }

    #[test]
    fn defaults_to_first_page_of_ten() {
        assert_eq!(Pagination::default().normalize(), (1, 10, 0));
    }

    #[test]
    fn clamps_out_of_range_values() {
        assert_eq!(pages(0, 0).normalize(), (1, 1, 0));
        assert_eq!(pages(3, 500).normalize(), (3, 100, 200));
        assert_eq!(pages(-4, 20).normalize(), (1, 20, 0));
    }

    #[test]
    fn huge_page_does_not_overflow_offset() {
        assert_eq!(pages(i64::MAX, 10).normalize(), (i64::MAX, 10, i64::MAX));
        assert_eq!(pages(i64::MAX / 2, 100).normalize().2, i64::MAX);

        let uri: axum::http::Uri = "/api/products?page=9223372036854775807&limit=10"
            .parse()
            .expect("uri");
        let axum::extract::Query(query) =
            axum::extract::Query::<ProductQuery>::try_from_uri(&uri).expect("parse");
        assert_eq!(query.pagination().normalize().2, i64::MAX);
    }

    #[test]
    fn product_query_serializes_only_set_fields() {
        let query = ProductQuery {
            brand: Some("Nike".into()),
            limit: Some(5),
            ..Default::default()
        };
        let json = serde_json::to_value(&query).expect("serialize");
        assert_eq!(json, serde_json::json!({ "brand": "Nike", "limit": 5 }));
    }

    #[test]
    fn per_page_is_accepted_as_limit() {
        let p: Pagination = serde_json::from_str(r#"{"page": 2, "per_page": 5}"#).expect("parse");
        assert_eq!(p.normalize(), (2, 5, 5));
    }
}
