//! Normalization of the backend's response envelopes.
//!
//! Every endpoint wraps its payload as `{ statusCode, message, data }`, but list
//! endpoints disagree on where the rows live. The shape is endpoint
//! configuration; callers always get a [`PageResult`].

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnNull};

use super::error::ApiError;
use super::transport::ApiResponse;
use crate::pagination::{clamp_page, total_pages, PageResult};

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    fn ensure_success(&self, http_status: u16, range: RangeInclusive<u16>) -> Result<(), ApiError> {
        let status = self.status_code.unwrap_or(http_status);
        if range.contains(&status) {
            return Ok(());
        }
        let message = self.message.trim();
        Err(ApiError::Server {
            status,
            message: (!message.is_empty()).then(|| message.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListShape {
    /// `data: { items, totalCount, totalPages, pageNumber }`, paged by the server.
    #[default]
    Paged,
    /// `data: [...]`, the whole list; pages are cut client-side.
    Flat,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagedData {
    #[serde(default)]
    items: Vec<Value>,
    total_count: Option<u64>,
    total_pages: Option<u32>,
    page_number: Option<u32>,
}

/// Turns a list response into a page of raw rows.
pub fn normalize_list(
    response: ApiResponse,
    shape: ListShape,
    page: u32,
    page_size: u32,
) -> Result<PageResult<Value>, ApiError> {
    let envelope: Envelope<Value> = serde_json::from_value(response.body)?;
    envelope.ensure_success(response.status, 200..=299)?;
    let Some(data) = envelope.data.filter(|data| !data.is_null()) else {
        return Ok(PageResult::empty(page));
    };

    match shape {
        ListShape::Paged => {
            let paged: PagedData = serde_json::from_value(data)?;
            let total_count = paged.total_count.unwrap_or(paged.items.len() as u64);
            let computed = total_pages(total_count, page_size);
            if let Some(reported) = paged.total_pages {
                if reported != computed {
                    tracing::warn!(
                        reported,
                        computed,
                        "server page count disagrees with totalCount"
                    );
                }
            }
            Ok(PageResult {
                items: paged.items,
                total_count,
                total_pages: computed,
                page: paged.page_number.unwrap_or(page),
            })
        }
        ListShape::Flat => {
            let Value::Array(rows) = data else {
                return Err(ApiError::Decode("expected data to be an array".into()));
            };
            let total_count = rows.len() as u64;
            let pages = total_pages(total_count, page_size);
            let current = clamp_page(page, pages);
            let start = (current as usize - 1) * page_size as usize;
            let items = rows
                .into_iter()
                .skip(start)
                .take(page_size as usize)
                .collect();
            Ok(PageResult {
                items,
                total_count,
                total_pages: pages,
                page: current,
            })
        }
    }
}

/// Success is decided by `statusCode` alone, in `200..=201`.
pub fn mutation_result(response: ApiResponse) -> Result<Option<Value>, ApiError> {
    let envelope: Envelope<Value> = match response.body {
        Value::Null => Envelope {
            status_code: None,
            message: String::new(),
            data: None,
        },
        body => serde_json::from_value(body)?,
    };
    envelope.ensure_success(response.status, 200..=201)?;
    Ok(envelope.data.filter(|data| !data.is_null()))
}

/// Whole-collection payload from `data`. Missing or null `data` is empty.
pub fn collection_result(response: ApiResponse) -> Result<Vec<Value>, ApiError> {
    let envelope: Envelope<Value> = serde_json::from_value(response.body)?;
    envelope.ensure_success(response.status, 200..=299)?;
    match envelope.data {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(rows)) => Ok(rows),
        Some(_) => Err(ApiError::Decode("expected data to be an array".into())),
    }
}

/// Single-record payload from `data`.
pub fn record_result(response: ApiResponse) -> Result<Value, ApiError> {
    let envelope: Envelope<Value> = serde_json::from_value(response.body)?;
    envelope.ensure_success(response.status, 200..=299)?;
    envelope
        .data
        .filter(|data| !data.is_null())
        .ok_or_else(|| ApiError::Decode("response has no data".into()))
}
