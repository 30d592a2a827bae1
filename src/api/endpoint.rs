use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::envelope::ListShape;
use super::error::ApiError;
use super::transport::ApiRequest;
use crate::query::QueryState;

/// How one list resource talks: where it lives, what its paging parameters are
/// called, and where the rows sit in the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSpec {
    pub path: String,
    pub page_param: String,
    pub size_param: String,
    /// Logical filter name to the name the endpoint expects on the wire.
    pub filter_params: IndexMap<String, String>,
    pub shape: ListShape,
    pub requires_auth: bool,
}

impl Default for EndpointSpec {
    fn default() -> Self {
        Self {
            path: String::new(),
            page_param: "pageNumber".into(),
            size_param: "pageSize".into(),
            filter_params: IndexMap::new(),
            shape: ListShape::Paged,
            requires_auth: false,
        }
    }
}

impl EndpointSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn paging(mut self, page_param: &str, size_param: &str) -> Self {
        self.page_param = page_param.to_string();
        self.size_param = size_param.to_string();
        self
    }

    pub fn rename(mut self, filter: &str, wire: &str) -> Self {
        self.filter_params
            .insert(filter.to_string(), wire.to_string());
        self
    }

    pub fn flat(mut self) -> Self {
        self.shape = ListShape::Flat;
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn wire_name<'a>(&'a self, filter: &'a str) -> &'a str {
        self.filter_params
            .get(filter)
            .map(String::as_str)
            .unwrap_or(filter)
    }

    /// Builds the list request for `query`. Flat endpoints return everything in
    /// one response, so they get no paging parameters.
    pub fn list_request(
        &self,
        query: &QueryState,
        token: Option<&str>,
    ) -> Result<ApiRequest, ApiError> {
        if self.requires_auth && token.is_none() {
            return Err(ApiError::Unauthenticated);
        }
        let mut request = ApiRequest::get(self.path.clone());
        if self.shape == ListShape::Paged {
            request = request
                .param(self.page_param.clone(), query.page().to_string())
                .param(self.size_param.clone(), query.page_size().to_string());
        }
        for (name, value) in query.filters() {
            request = request.param(self.wire_name(name), value.to_param());
        }
        let bearer = if self.requires_auth { token } else { None };
        Ok(request.bearer(bearer.map(str::to_string)))
    }
}
