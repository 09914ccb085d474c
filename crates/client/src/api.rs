//! Transport to the resource HTTP surface.

use std::time::Duration;

use async_trait::async_trait;
use db::models::{document::Document, resource::ResourceKind};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;
use utils::response::{Ack, ApiResponse, DefaultObj, Item, Items};
use uuid::Uuid;

use crate::config::ClientConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
    #[error("invalid url: {0}")]
    Url(String),
    /// The server answered with `success: false`.
    #[error("{0}")]
    Rejected(String),
}

fn map_reqwest_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport(e.to_string())
    }
}

pub type ItemResponse = ApiResponse<Item<Document>>;
pub type ItemsResponse = ApiResponse<Items<Document>>;
pub type DefaultResponse = ApiResponse<DefaultObj<Map<String, Value>>>;

/// Calls the client store makes against the server. Every method resolves
/// with the decoded envelope, including `success: false` envelopes; `Err` is
/// reserved for transport and decoding failures.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn fetch_single(&self, kind: ResourceKind, id: Uuid) -> Result<ItemResponse, ClientError>;

    async fn fetch_list(
        &self,
        kind: ResourceKind,
        ref_key: &str,
        ref_id: &str,
    ) -> Result<ItemsResponse, ClientError>;

    async fn fetch_all(&self, kind: ResourceKind) -> Result<ItemsResponse, ClientError>;

    async fn fetch_default(&self, kind: ResourceKind) -> Result<DefaultResponse, ClientError>;

    async fn create(&self, kind: ResourceKind, body: Value) -> Result<ItemResponse, ClientError>;

    async fn update(
        &self,
        kind: ResourceKind,
        id: Uuid,
        body: Value,
    ) -> Result<ItemResponse, ClientError>;

    async fn delete(&self, kind: ResourceKind, id: Uuid)
    -> Result<ApiResponse<Ack>, ClientError>;
}

/// [`ResourceApi`] over HTTP. Every call is sent exactly once.
#[derive(Debug, Clone)]
pub struct HttpResourceApi {
    http: Client,
    base_url: Url,
}

impl HttpResourceApi {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("yote-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// `<base>/api/<plural>/<segments...>`, each segment percent-encoded.
    pub fn url(&self, kind: ResourceKind, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .push("api")
            .push(kind.plural())
            .extend(segments.iter().copied().filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(res: Response) -> Result<ApiResponse<T>, ClientError> {
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }
        res.json::<ApiResponse<T>>()
            .await
            .map_err(|e| ClientError::Serde(e.to_string()))
    }

    async fn send<T: DeserializeOwned>(
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, ClientError> {
        let res = request.send().await.map_err(map_reqwest_error)?;
        Self::read(res).await
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<ApiResponse<T>, ClientError> {
        debug!(%url, "GET");
        Self::send(self.http.get(url)).await
    }
}

#[async_trait]
impl ResourceApi for HttpResourceApi {
    async fn fetch_single(&self, kind: ResourceKind, id: Uuid) -> Result<ItemResponse, ClientError> {
        self.get(self.url(kind, &[&id.to_string()])?).await
    }

    async fn fetch_list(
        &self,
        kind: ResourceKind,
        ref_key: &str,
        ref_id: &str,
    ) -> Result<ItemsResponse, ClientError> {
        self.get(self.url(kind, &["by-ref", ref_key, ref_id])?).await
    }

    async fn fetch_all(&self, kind: ResourceKind) -> Result<ItemsResponse, ClientError> {
        self.get(self.url(kind, &[])?).await
    }

    async fn fetch_default(&self, kind: ResourceKind) -> Result<DefaultResponse, ClientError> {
        self.get(self.url(kind, &["default"])?).await
    }

    async fn create(&self, kind: ResourceKind, body: Value) -> Result<ItemResponse, ClientError> {
        let url = self.url(kind, &[])?;
        debug!(%url, "POST");
        Self::send(self.http.post(url).json(&body)).await
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: Uuid,
        body: Value,
    ) -> Result<ItemResponse, ClientError> {
        let url = self.url(kind, &[&id.to_string()])?;
        debug!(%url, "PUT");
        Self::send(self.http.put(url).json(&body)).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<ApiResponse<Ack>, ClientError> {
        let url = self.url(kind, &[&id.to_string()])?;
        debug!(%url, "DELETE");
        Self::send(self.http.delete(url)).await
    }
}
