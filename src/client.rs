//! Byte sources for answer streams.

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use reqwest::Client;
use tracing::debug;

use crate::error::{AssemblerError, Result};
use crate::wire::AgentRequest;

/// Raw body chunks of one streamed answer.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>>>;

/// Opens the byte stream of an answer for a request.
pub trait AnswerSource: Send + Sync + 'static {
    fn open(&self, request: AgentRequest) -> BoxFuture<'static, Result<ChunkStream>>;
}

/// HTTP client for the agent's streaming endpoint.
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl AgentClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into(), token: None }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AnswerSource for AgentClient {
    fn open(&self, request: AgentRequest) -> BoxFuture<'static, Result<ChunkStream>> {
        let client = self.client.clone();
        let url = self.endpoint.clone();
        let token = self.token.clone();

        async move {
            debug!(url = %url, "opening answer stream");
            let mut builder = client
                .post(&url)
                .header("Accept", "text/event-stream")
                .json(&request);
            if let Some(token) = token {
                builder = builder.bearer_auth(token);
            }

            let response = builder.send().await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(AssemblerError::Http { status, url, body });
            }

            let chunks = response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(AssemblerError::from));
            Ok(chunks.boxed())
        }
        .boxed()
    }
}

/// Replays fixed chunks; useful for tests and offline demos.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    chunks: Vec<Vec<u8>>,
}

impl ScriptedSource {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self { chunks: chunks.into_iter().map(Into::into).collect() }
    }
}

impl AnswerSource for ScriptedSource {
    fn open(&self, _request: AgentRequest) -> BoxFuture<'static, Result<ChunkStream>> {
        let chunks = self.chunks.clone();
        async move { Ok(futures_util::stream::iter(chunks.into_iter().map(Ok)).boxed()) }.boxed()
    }
}
