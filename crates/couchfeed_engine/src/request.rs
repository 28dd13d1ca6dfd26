//! `_changes` request construction.

use crate::config::{FeedOptions, Heartbeat};
use crate::error::{FeedError, FeedResult};
use crate::transport::{FeedRequest, Method};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use couchfeed_protocol::Seq;
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use url::Url;

/// Builds `_changes` requests for one database.
///
/// Pure: the same options and cursor always produce the same request.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: Url,
    authorization: Option<String>,
    options: FeedOptions,
}

impl RequestBuilder {
    /// Creates a builder for the database at `db_url`.
    ///
    /// Credentials embedded in the URL are moved into a Basic auth header.
    pub fn new(db_url: &str, options: FeedOptions) -> FeedResult<Self> {
        let mut endpoint = Url::parse(db_url)
            .map_err(|e| FeedError::InvalidConfig(format!("invalid database url {db_url:?}: {e}")))?;

        let authorization = basic_auth(&endpoint);
        if authorization.is_some() {
            endpoint
                .set_username("")
                .and_then(|_| endpoint.set_password(None))
                .map_err(|_| {
                    FeedError::InvalidConfig(format!("cannot strip credentials from {db_url:?}"))
                })?;
        }

        endpoint
            .path_segments_mut()
            .map_err(|_| FeedError::InvalidConfig(format!("{db_url:?} cannot be a base url")))?
            .pop_if_empty()
            .push("_changes");
        endpoint.set_query(None);
        endpoint.set_fragment(None);

        Ok(Self {
            endpoint,
            authorization,
            options,
        })
    }

    /// Returns the options this builder was created with.
    pub fn options(&self) -> &FeedOptions {
        &self.options
    }

    /// Returns the `_changes` endpoint (no query, no credentials).
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the query parameters for a request resuming at `cursor`.
    ///
    /// `cursor` wins over the configured `since` once any position was seen.
    pub fn query_pairs(&self, cursor: Option<&Seq>) -> Vec<(String, String)> {
        let o = &self.options;
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                pairs.push((key.to_string(), value));
            }
        };

        push("since", cursor.or(o.since.as_ref()).map(Seq::to_query_value));
        push("filter", o.filter.clone());
        push("conflicts", o.conflicts.map(|v| v.to_string()));
        push("descending", o.descending.map(|v| v.to_string()));
        push("include_docs", o.include_docs.map(|v| v.to_string()));
        push("attachments", o.attachments.map(|v| v.to_string()));
        push("att_encoding_info", o.att_encoding_info.map(|v| v.to_string()));
        push("limit", o.limit.map(|v| v.to_string()));
        push("style", o.style.map(|v| v.as_str().to_string()));
        push("timeout", o.timeout.map(|v| v.to_string()));
        push("seq_interval", o.seq_interval.map(|v| v.to_string()));
        push("feed", Some(o.feed.as_str().to_string()));
        if let Heartbeat::Interval(_) = o.heartbeat {
            push(
                "heartbeat",
                o.heartbeat.interval().map(|i| i.as_millis().to_string()),
            );
        }
        for (key, value) in &o.params {
            push(key.as_str(), Some(value.clone()));
        }

        pairs
    }

    /// Returns the JSON body, if the options call for one.
    ///
    /// `doc_ids` takes priority over `selector`.
    pub fn body(&self) -> Option<Value> {
        if !self.options.doc_ids.is_empty() {
            return Some(json!({ "doc_ids": self.options.doc_ids }));
        }
        match &self.options.selector {
            Some(Value::Object(selector)) if !selector.is_empty() => {
                Some(json!({ "selector": selector }))
            }
            _ => None,
        }
    }

    /// Builds the request for the current cursor.
    pub fn build(&self, cursor: Option<&Seq>) -> FeedRequest {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .extend_pairs(self.query_pairs(cursor));

        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        let body = self.body().map(|b| b.to_string().into_bytes());
        if body.is_some() {
            headers.push(("Content-Type".into(), "application/json".into()));
        }
        if let Some(auth) = &self.authorization {
            headers.push(("Authorization".into(), auth.clone()));
        }

        FeedRequest {
            method: if body.is_some() {
                Method::Post
            } else {
                Method::Get
            },
            url,
            headers,
            body,
        }
    }
}

fn basic_auth(url: &Url) -> Option<String> {
    if url.username().is_empty() && url.password().is_none() {
        return None;
    }
    let user = percent_decode_str(url.username()).decode_utf8_lossy();
    let pass = percent_decode_str(url.password().unwrap_or("")).decode_utf8_lossy();
    Some(format!("Basic {}", STANDARD.encode(format!("{user}:{pass}"))))
}
