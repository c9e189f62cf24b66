//! Per-request options for the authenticated dispatcher
//!
//! Options are applied by reference so the same request can be rebuilt for the
//! retry after a token refresh.

use std::collections::BTreeMap;

use reqwest::RequestBuilder;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

/// Request body forwarded to the proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Text(String),
    Bytes(Vec<u8>),
}

/// Headers, query and body for one proxied call.
///
/// Header names are stored lowercased, matching how `HeaderMap` compares them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    headers: BTreeMap<String, String>,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header, replacing any earlier value under the same name in any
    /// casing. A caller-supplied `Authorization` header is replaced by the
    /// bearer token at dispatch.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut name = name.into();
        name.make_ascii_lowercase();
        self.headers.insert(name, value.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(text.into()));
        self
    }

    pub fn bytes(mut self, bytes: Vec<u8>) -> Self {
        self.body = Some(RequestBody::Bytes(bytes));
        self
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Caller headers plus `Authorization: Bearer <token>`.
    ///
    /// Header names are case-insensitive, so a caller `authorization` entry in
    /// any casing is overwritten rather than duplicated.
    pub(crate) fn header_map(&self, access_token: &str) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len() + 1);
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidRequest(format!("header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidRequest(format!("header {name} value: {e}")))?;
            map.insert(name, value);
        }

        let mut bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| Error::InvalidRequest("access token is not a valid header value".into()))?;
        bearer.set_sensitive(true);
        map.insert(AUTHORIZATION, bearer);
        Ok(map)
    }

    /// Attach headers, query and body to `builder`.
    pub(crate) fn apply(
        &self,
        builder: RequestBuilder,
        access_token: &str,
    ) -> Result<RequestBuilder> {
        let headers = self.header_map(access_token)?;
        let has_content_type = headers.contains_key(CONTENT_TYPE);
        let mut builder = builder.headers(headers);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }

        builder = match &self.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            Some(RequestBody::Text(text)) if has_content_type => builder.body(text.clone()),
            Some(RequestBody::Text(text)) => builder
                .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(text.clone()),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
        };
        Ok(builder)
    }
}
