//! HTTP route shapes: URL-to-URI reconstruction, `list` query parameters,
//! and the `/receive` request body.

use serde::{Deserialize, Serialize};
use substrate_backend::{ListOptions, SortBy, SortOrder};
use substrate_core::uri::Uri;
use substrate_error::SubstrateError;

/// Reconstruct a [`Uri`] from the `/:scheme/:authority/*path` route
/// segments every substrate route uses. `path` is the catch-all tail as
/// captured by the router (no leading slash); it is re-prefixed here.
pub fn uri_from_path_params(scheme: &str, authority: &str, path: &str) -> Result<Uri, SubstrateError> {
    let suffix = if path.is_empty() {
        String::new()
    } else {
        format!("/{path}")
    };
    Uri::parse(&format!("{scheme}://{authority}{suffix}"))
}

/// Query parameters accepted by `GET /list/:scheme/:authority/*path`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
    /// Substring filter on the URI.
    pub pattern: Option<String>,
    /// Sort key: `name` or `timestamp`.
    #[serde(rename = "sortBy")]
    pub sort_by: Option<SortBy>,
    /// Sort direction: `asc` or `desc`.
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<SortOrder>,
}

impl ListQuery {
    /// Convert into [`ListOptions`], filling in defaults for any field the
    /// caller omitted.
    pub fn into_options(self) -> ListOptions {
        let default = ListOptions::default();
        ListOptions {
            page: self.page.unwrap_or(default.page),
            limit: self.limit.unwrap_or(default.limit),
            pattern: self.pattern,
            sort_by: self.sort_by.unwrap_or(default.sort_by),
            sort_order: self.sort_order.unwrap_or(default.sort_order),
        }
    }
}

/// Body of `POST /receive`: `{ tx: [uri, data] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveRequest {
    /// The `[uri, data]` write message.
    pub tx: (String, serde_json::Value),
}
