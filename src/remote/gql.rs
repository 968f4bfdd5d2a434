use std::time::Duration;

use reqwest::blocking::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::result::{Error, Result};

pub const GQL_ENDPOINT: &str = "https://gql.twitch.tv/gql";

/// Client id of the public web player
pub const DEFAULT_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

/// Client for the platform's private query endpoint
#[derive(Debug, Clone)]
pub struct GqlClient {
    http: Client,
    endpoint: String,
    client_id: String,
}

#[derive(Debug, Serialize)]
struct QueryDocument<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<QueryError>,
}

#[derive(Debug, Deserialize)]
struct QueryError {
    message: String,
}

/// Body of a 4xx answer
#[derive(Debug, Deserialize)]
struct Rejection {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl GqlClient {
    pub fn new(client_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            endpoint: GQL_ENDPOINT.to_owned(),
            client_id: client_id.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The underlying HTTP client, configured with the request timeout
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Run a query and deserialize its `data` field
    pub fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        trace!("Query: {query} with {variables}");

        let response = self
            .http
            .post(&self.endpoint)
            .header("Client-ID", &self.client_id)
            .json(&QueryDocument { query, variables })
            .send()?;

        let status = response.status();
        debug!("Query endpoint answered {status}");

        // Server errors are transport-level failures for the caller to classify
        let response = if status.is_server_error() {
            response.error_for_status()?
        } else {
            response
        };

        let body = response.text()?;
        interpret(status.as_u16(), &body)
    }
}

/// Turn a query endpoint answer into its data or a [`Error::QueryRejected`]
fn interpret<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    if (400..500).contains(&status) {
        let message = serde_json::from_str::<Rejection>(body)
            .ok()
            .and_then(|r| r.message.or(r.error))
            .unwrap_or_else(|| body.trim().to_owned());

        return Err(Error::QueryRejected { status, message });
    }

    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if !envelope.errors.is_empty() {
        let message = envelope
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");

        return Err(Error::QueryRejected { status, message });
    }

    envelope.data.ok_or_else(|| Error::QueryRejected {
        status,
        message: "answer has no data".to_owned(),
    })
}
