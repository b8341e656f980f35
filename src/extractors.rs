use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::net::SocketAddr;

use crate::error::AppError;
use crate::posts::domain::Identity;

pub const FINGERPRINT_HEADER: &str = "x-fingerprint";

/// Who is calling, as far as anti-abuse is concerned. Browsers send a
/// fingerprint header; the peer address is the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub fingerprint: Option<String>,
    pub peer: Option<String>,
}

impl ClientIdentity {
    /// Header fingerprint, then the form's fingerprint field, then the peer.
    pub fn key(&self, form_fingerprint: Option<&str>) -> String {
        self.fingerprint
            .clone()
            .or_else(|| non_blank(form_fingerprint))
            .or_else(|| self.peer.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Posts written by people always carry a key, so they are never
    /// mistaken for the agent's.
    pub fn identity(&self, form_fingerprint: Option<&str>) -> Identity {
        Identity::Human(self.key(form_fingerprint))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let fingerprint = non_blank(
            parts
                .headers
                .get(FINGERPRINT_HEADER)
                .and_then(|v| v.to_str().ok()),
        );

        let peer = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientIdentity { fingerprint, peer })
    }
}
