//! Request/response shapes private to the client, plus the credential type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque API credential, sent verbatim as the `Authorization` header.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

/// List envelope; the service uses `data` or `items` depending on endpoint.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Page<T> {
    #[serde(default, alias = "items")]
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PublicPageRequest {
    pub with_public_page: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct WhatToTestRequest<'a> {
    pub what_to_test: &'a str,
}
