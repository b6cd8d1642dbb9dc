//! Sessions
//!
//! A page is opened from a chat link that carries the session token and, in
//! some flows, an order id and a workflow resume URL. The session itself
//! lives in the backend and is looked up by token.

use jiff::Timestamp;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    checkout::CheckoutContext,
    transport::{Transport, TransportError, endpoint},
};

/// Errors that can occur while resolving the page's session.
///
/// All of them end the flow: the customer is sent to the error page.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The page URL had no `token` parameter.
    #[error("no session token in page URL")]
    MissingToken,

    /// The backend does not know the token.
    #[error("Session not found or expired")]
    NotFound,

    /// The session exists but has expired.
    #[error("Session not found or expired")]
    Expired,

    /// The backend could not be reached or answered with an error.
    #[error("Failed to fetch session")]
    Unavailable(#[source] TransportError),

    /// The backend's answer was not a session.
    #[error("Failed to fetch session")]
    Decode(#[source] serde_json::Error),

    /// The session endpoint could not be built.
    #[error("invalid session endpoint: {0}")]
    InvalidEndpoint(String),
}

impl SessionError {
    /// Error page on `frontend` carrying this error's message.
    ///
    /// # Errors
    ///
    /// Returns a message if `frontend` cannot carry a path.
    pub fn redirect_url(&self, frontend: &Url) -> Result<Url, String> {
        let mut url = endpoint(frontend, &["error"])?;

        url.query_pairs_mut()
            .append_pair("message", &self.to_string());

        Ok(url)
    }
}

/// Session record kept by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Backend identifier.
    pub id: i64,

    /// Opaque token from the chat link.
    pub token: String,

    /// Customer phone number.
    pub phone: String,

    /// Conversation state name.
    pub state: String,

    /// Order attached to the session, if any.
    pub order_id: Option<i64>,

    /// Confirmed delivery address, if any.
    pub address: Option<String>,

    /// Creation time.
    pub created_at: Timestamp,

    /// Last update time.
    pub updated_at: Timestamp,

    /// Expiry time.
    pub expires_at: Timestamp,
}

impl Session {
    /// Whether the session has expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// Query parameters the ordering pages understand.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageParams {
    /// `token`
    pub token: Option<String>,

    /// `order_id`
    pub order_id: Option<String>,

    /// `resumeUrl`
    pub resume_url: Option<Url>,
}

impl PageParams {
    /// Reads the parameters from a page URL. Empty values count as absent;
    /// a resume URL that does not parse is ignored.
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();

        for (name, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }

            match name.as_ref() {
                "token" => params.token = Some(value.into_owned()),
                "order_id" => params.order_id = Some(value.into_owned()),
                "resumeUrl" => match Url::parse(&value) {
                    Ok(resume) => params.resume_url = Some(resume),
                    Err(error) => warn!(%error, "ignoring invalid resumeUrl"),
                },
                _ => {}
            }
        }

        params
    }

    /// The session token, required by pages that need a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingToken`] if there is none.
    pub fn require_token(&self) -> Result<&str, SessionError> {
        self.token.as_deref().ok_or(SessionError::MissingToken)
    }

    /// Identifiers to send with a checkout from this page.
    pub fn checkout_context(&self) -> CheckoutContext {
        CheckoutContext {
            order_id: self.order_id.clone(),
            session_token: self.token.clone(),
            resume_url: self.resume_url.clone(),
        }
    }
}

/// Looks sessions up on the backend API.
#[derive(Debug, Clone)]
pub struct SessionClient<T> {
    transport: T,
    api_url: Url,
}

impl<T: Transport> SessionClient<T> {
    /// Client for the API at `api_url`.
    pub fn new(transport: T, api_url: Url) -> Self {
        Self { transport, api_url }
    }

    /// Fetches the session for `token` (`GET {api}/api/sessions/{token}`).
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotFound`]: the backend answered 404.
    /// - [`SessionError::Expired`]: the session's expiry has passed.
    /// - [`SessionError::Unavailable`]: any other transport failure.
    /// - [`SessionError::Decode`]: the answer was not a session.
    pub async fn fetch(&self, token: &str) -> Result<Session, SessionError> {
        let url = endpoint(&self.api_url, &["api", "sessions", token])
            .map_err(SessionError::InvalidEndpoint)?;

        let body = self.transport.get_json(&url).await.map_err(|error| {
            if error.is_not_found() {
                SessionError::NotFound
            } else {
                warn!(%error, "session lookup failed");
                SessionError::Unavailable(error)
            }
        })?;

        let session: Session = serde_json::from_value(body).map_err(SessionError::Decode)?;

        if session.is_expired_at(Timestamp::now()) {
            return Err(SessionError::Expired);
        }

        debug!(session_id = session.id, state = %session.state, "session resolved");

        Ok(session)
    }
}
