//! Visitor identification.
//!
//! Identity is issued elsewhere; this module only reads it back, from the
//! `visitor_id` cookie first and the `x-visitor-id` header second.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use derby_types::VisitorId;

use crate::error::ObserverError;

/// Cookie carrying the visitor identity.
pub const VISITOR_COOKIE: &str = "visitor_id";

/// Header fallback for clients that cannot set cookies.
pub const VISITOR_HEADER: &str = "x-visitor-id";

/// Read the visitor identity from request headers, if any.
pub fn visitor_from_headers(headers: &HeaderMap) -> Option<VisitorId> {
    cookie_value(headers, VISITOR_COOKIE)
        .or_else(|| {
            headers
                .get(VISITOR_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(VisitorId::from)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Extractor that requires a visitor identity.
///
/// Rejects with [`ObserverError::MissingVisitor`] when neither the cookie
/// nor the header is present.
#[derive(Debug, Clone)]
pub struct Visitor(pub VisitorId);

impl<S: Send + Sync> FromRequestParts<S> for Visitor {
    type Rejection = ObserverError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        visitor_from_headers(&parts.headers)
            .map(Self)
            .ok_or(ObserverError::MissingVisitor)
    }
}
