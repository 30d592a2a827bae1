use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

use crate::api::ApiError;
use crate::validation;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

static DATE_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date pattern"));
static INT_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{1,18}$").expect("valid integer pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Flag(bool),
    Int(i64),
    Text(String),
    Date(Date),
}

impl FilterValue {
    /// Interprets a raw command-line value: `YYYY-MM-DD` is a date, `true`/`false`
    /// a flag, a canonical integer literal an integer, anything else text.
    /// Literals that would not survive the round trip (`007`, `+5`, `-0`) stay
    /// text so the value reaches the server unchanged.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let trimmed = raw.trim();
        if DATE_LITERAL.is_match(trimmed) {
            let date = Date::parse(trimmed, DATE_FORMAT)
                .map_err(|err| ApiError::validation("date", err.to_string()))?;
            return Ok(FilterValue::Date(date));
        }
        match trimmed {
            "true" => return Ok(FilterValue::Flag(true)),
            "false" => return Ok(FilterValue::Flag(false)),
            _ => {}
        }
        if INT_LITERAL.is_match(trimmed) {
            if let Ok(value) = trimmed.parse::<i64>() {
                if value.to_string() == trimmed {
                    return Ok(FilterValue::Int(value));
                }
            }
        }
        Ok(FilterValue::Text(trimmed.to_string()))
    }

    pub fn to_param(&self) -> String {
        match self {
            FilterValue::Flag(flag) => flag.to_string(),
            FilterValue::Int(value) => value.to_string(),
            FilterValue::Text(text) => text.clone(),
            FilterValue::Date(date) => date
                .format(DATE_FORMAT)
                .unwrap_or_else(|_| date.to_string()),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param())
    }
}

/// Splits `name=value` into a filter assignment.
pub fn parse_assignment(raw: &str) -> Result<(String, FilterValue), ApiError> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(ApiError::validation("filter", format!("expected name=value, got '{raw}'")));
    };
    let name = name.trim();
    validation::required("filter name", name)?;
    Ok((name.to_string(), FilterValue::parse(value)?))
}

/// Filters plus page position for one list.
///
/// Every filter mutation moves back to page 1, even when the new value equals
/// the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    filters: IndexMap<String, FilterValue>,
    page: u32,
    page_size: u32,
}

impl QueryState {
    pub fn new(page_size: u32) -> Self {
        Self {
            filters: IndexMap::new(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn filters(&self) -> &IndexMap<String, FilterValue> {
        &self.filters
    }

    pub fn filter(&self, name: &str) -> Option<&FilterValue> {
        self.filters.get(name)
    }

    pub fn set_filter(&mut self, name: impl Into<String>, value: FilterValue) {
        self.filters.insert(name.into(), value);
        self.page = 1;
    }

    pub fn clear_filter(&mut self, name: &str) {
        self.filters.shift_remove(name);
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.page = 1;
    }

    /// Sets both bounds of a date range, rejecting a start after the end.
    pub fn set_date_range(
        &mut self,
        from_name: &str,
        to_name: &str,
        from: Option<Date>,
        to: Option<Date>,
    ) -> Result<(), ApiError> {
        if let (Some(from), Some(to)) = (from, to) {
            validation::date_order(from_name, from, to)?;
        }
        match from {
            Some(date) => self.filters.insert(from_name.to_string(), FilterValue::Date(date)),
            None => self.filters.shift_remove(from_name),
        };
        match to {
            Some(date) => self.filters.insert(to_name.to_string(), FilterValue::Date(date)),
            None => self.filters.shift_remove(to_name),
        };
        self.page = 1;
        Ok(())
    }

    /// Page numbers below 1 become 1; the upper bound is enforced by the
    /// controller once the total is known.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }
}

/// Independent query states for multi-tab screens such as the statistics
/// dashboards.
#[derive(Debug, Clone)]
pub struct TabbedQueries {
    page_size: u32,
    tabs: IndexMap<String, QueryState>,
    active: Option<String>,
}

impl TabbedQueries {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            tabs: IndexMap::new(),
            active: None,
        }
    }

    pub fn switch_to(&mut self, tab: &str) -> &mut QueryState {
        self.active = Some(tab.to_string());
        self.tab_mut(tab)
    }

    pub fn tab_mut(&mut self, tab: &str) -> &mut QueryState {
        let page_size = self.page_size;
        self.tabs
            .entry(tab.to_string())
            .or_insert_with(|| QueryState::new(page_size))
    }

    pub fn tab(&self, tab: &str) -> Option<&QueryState> {
        self.tabs.get(tab)
    }

    pub fn active(&self) -> Option<(&str, &QueryState)> {
        let name = self.active.as_deref()?;
        self.tabs.get(name).map(|state| (name, state))
    }

    pub fn tab_names(&self) -> impl Iterator<Item = &str> {
        self.tabs.keys().map(String::as_str)
    }
}
