//! Declarative HTTP/JSON search source
//!
//! Builds requests from templated parameters, pulls records out of the
//! response by path, and derives the next cursor from the configured
//! cursor kind.

use super::types::{Cursor, Page, Query, SearchSource};
use crate::config::{CursorDefinition, RequestDefinition, ResponseDefinition, SourceDefinition};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::template::{self, TemplateContext};
use crate::types::{value_at, JsonValue, Record};
use async_trait::async_trait;
use tracing::{debug, warn};

/// A search source described entirely by configuration
#[derive(Debug)]
pub struct JsonSearchSource {
    name: String,
    base_url: String,
    request: RequestDefinition,
    response: ResponseDefinition,
    cursor: CursorDefinition,
    client: HttpClient,
}

impl JsonSearchSource {
    /// Create a source from its parts
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        request: RequestDefinition,
        response: ResponseDefinition,
        cursor: CursorDefinition,
        client: HttpClient,
    ) -> Result<Self> {
        url::Url::parse(base_url)?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            request,
            response,
            cursor,
            client,
        })
    }

    /// Create a source from a loaded definition
    pub fn from_definition(def: &SourceDefinition) -> Result<Self> {
        let client = HttpClient::with_config(def.http.to_client_config())?;
        Self::new(
            def.name.clone(),
            &def.base_url,
            def.request.clone(),
            def.response.clone(),
            def.cursor.clone(),
            client,
        )
    }

    /// Render the request URL for a query
    fn url(&self, ctx: &TemplateContext) -> Result<String> {
        let path = template::render(&self.request.path, ctx)?;
        if path.is_empty() || path.starts_with('/') {
            Ok(format!("{}{path}", self.base_url))
        } else {
            Ok(format!("{}/{path}", self.base_url))
        }
    }

    /// Build the query-string parameters for a query
    fn build_params(&self, query: &Query, ctx: &TemplateContext) -> Result<Vec<(String, String)>> {
        let mut params = Vec::with_capacity(self.request.params.len() + 2);

        for (key, value) in &self.request.params {
            let references_window = template::extract_variables(value)
                .iter()
                .any(|var| var.starts_with("window"));
            if references_window && query.window.is_none() {
                continue;
            }

            let rendered = template::render(value, ctx)?;
            // Missing optional attributes (e.g. no region) drop the parameter
            if rendered.is_empty() {
                continue;
            }
            params.push((key.clone(), rendered));
        }

        if let Some(param) = &self.request.page_size_param {
            params.push((param.clone(), query.page_size.to_string()));
        }

        match (&self.cursor, &query.cursor) {
            (CursorDefinition::None, _) => {}
            (CursorDefinition::Token { param, .. }, Some(cursor)) => {
                params.push((param.clone(), cursor.to_string()));
            }
            (CursorDefinition::Token { .. }, None) => {}
            (CursorDefinition::Offset { param }, cursor) => {
                let offset = cursor.as_ref().map_or_else(|| "0".to_string(), ToString::to_string);
                params.push((param.clone(), offset));
            }
            (CursorDefinition::Page { param, start }, cursor) => {
                let page = cursor.as_ref().map_or_else(|| start.to_string(), ToString::to_string);
                params.push((param.clone(), page));
            }
        }

        Ok(params)
    }

    /// Pull records out of a response body
    fn extract_records(&self, body: &JsonValue) -> Result<Vec<Record>> {
        let items = if self.response.records_path.is_empty() {
            Some(body)
        } else {
            value_at(body, &self.response.records_path)
        };

        let items = match items {
            None | Some(JsonValue::Null) => {
                debug!("{}: no records at '{}'", self.name, self.response.records_path);
                return Ok(Vec::new());
            }
            Some(JsonValue::Array(items)) => items,
            Some(_) => {
                return Err(Error::RecordExtraction {
                    path: self.response.records_path.clone(),
                    message: "expected an array of records".to_string(),
                })
            }
        };

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let JsonValue::Object(fields) = item else {
                warn!("{}: skipping non-object record", self.name);
                continue;
            };
            let id = fields
                .get(&self.response.id_path)
                .or_else(|| value_at(item, &self.response.id_path))
                .and_then(scalar_to_string);
            match id {
                Some(id) if !id.is_empty() => records.push(Record::new(id, fields.clone())),
                _ => warn!(
                    "{}: skipping record without '{}'",
                    self.name, self.response.id_path
                ),
            }
        }
        Ok(records)
    }

    /// Read the self-reported total, if configured
    fn extract_total(&self, body: &JsonValue) -> Option<u64> {
        let path = self.response.total_path.as_deref()?;
        match value_at(body, path)? {
            JsonValue::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Derive the cursor for the page after this one
    fn next_cursor(
        &self,
        query: &Query,
        body: &JsonValue,
        count: usize,
        total: Option<u64>,
    ) -> Option<Cursor> {
        if let Some(path) = &self.response.end_path {
            if value_at(body, path).and_then(JsonValue::as_bool) == Some(true) {
                return None;
            }
        }

        // The page size is only known when it was sent; otherwise the API
        // picks its own and only an empty page or the total can end paging
        let sent_size = self
            .request
            .page_size_param
            .as_ref()
            .map(|_| u64::from(query.page_size));
        let short_page = sent_size.is_some_and(|size| (count as u64) < size);

        match &self.cursor {
            CursorDefinition::None => None,
            CursorDefinition::Token { path, .. } => value_at(body, path)
                .and_then(scalar_to_string)
                .filter(|token| !token.is_empty())
                .map(Cursor::Token),
            CursorDefinition::Offset { .. } => {
                let current = match &query.cursor {
                    Some(Cursor::Offset(offset)) => *offset,
                    _ => 0,
                };
                let next = current + count as u64;
                if count == 0 || short_page || total.is_some_and(|t| next >= t) {
                    None
                } else {
                    Some(Cursor::Offset(next))
                }
            }
            CursorDefinition::Page { start, .. } => {
                let current = match &query.cursor {
                    Some(Cursor::Page(page)) => *page,
                    _ => *start,
                };
                let pages_done = u64::from(current.saturating_sub(*start)) + 1;
                let seen = pages_done * sent_size.unwrap_or(count as u64);
                if count == 0 || short_page || total.is_some_and(|t| seen >= t) {
                    None
                } else {
                    Some(Cursor::Page(current + 1))
                }
            }
        }
    }
}

#[async_trait]
impl SearchSource for JsonSearchSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_page(&self, query: &Query) -> Result<Page> {
        let ctx = TemplateContext::for_query(query, &self.request.window_format);
        let url = self.url(&ctx)?;
        let params = self.build_params(query, &ctx)?;

        let response = self
            .client
            .get_json(&url, &params, &self.request.headers)
            .await?;

        if response.is_not_found() {
            debug!("{}: {} not found, empty page", self.name, query.label());
            return Ok(Page::empty().with_rate_limit(response.rate_limit));
        }

        let records = self.extract_records(&response.body)?;
        let total = self.extract_total(&response.body);
        let next = self.next_cursor(query, &response.body, records.len(), total);

        debug!(
            "{}: {} -> {} records, total {:?}, next {:?}",
            self.name,
            query.label(),
            records.len(),
            total,
            next
        );

        Ok(Page::new(records)
            .with_next(next)
            .with_total(total)
            .with_rate_limit(response.rate_limit))
    }
}

/// Render a scalar JSON value as an identity string
fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
