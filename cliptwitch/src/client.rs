//! HTTP client for the Twitch GraphQL clips API

use crate::error::{Error, Result};
use crate::graphql::{
    self, ClipsCriteria, ClipsVariables, CursorLocation, GqlRequest, GqlResponse, PlaybackData,
    PlaybackVariables, UserData,
};
use crate::models::{FetchResult, PaginationCursor, TimeFilter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Default GraphQL endpoint
pub const DEFAULT_ENDPOINT: &str = "https://gql.twitch.tv/gql";

/// Public client identifier used by the Twitch web player
pub const DEFAULT_CLIENT_ID: &str = "kd1unb4b3q4t58fwlpcbzcbnm76a8fp";

/// Default timeout for API requests
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "cliptwitch/0.1.0";

/// Largest page the listing query accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// How the clip listing query is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Persisted query referenced by hash; cursors are read from edges
    #[default]
    Persisted,
    /// Literal query text; cursors are read from `pageInfo.endCursor`
    Literal,
}

impl QueryMode {
    fn cursor_location(self) -> CursorLocation {
        match self {
            QueryMode::Persisted => CursorLocation::LastEdge,
            QueryMode::Literal => CursorLocation::PageInfo,
        }
    }
}

/// Twitch clips client
///
/// # Example
///
/// ```no_run
/// use cliptwitch::{TimeFilter, TwitchClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = TwitchClient::new().await?;
///     let page = client.fetch_page("somechannel", 20, TimeFilter::LastWeek, None).await?;
///     for clip in &page.clips {
///         println!("{} ({} views)", clip.title, clip.view_count);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TwitchClient {
    client: Client,
    endpoint: String,
    client_id: String,
    query_mode: QueryMode,
    timeout: Duration,
}

impl TwitchClient {
    /// Create a new client with default settings
    pub async fn new() -> Result<Self> {
        Self::builder().build().await
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// GraphQL endpoint this client posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn query_mode(&self) -> QueryMode {
        self.query_mode
    }

    /// Fetch one page of clips for a channel
    ///
    /// `page_size` is clamped to `1..=100`. A channel that does not exist
    /// yields an empty page; transport failures, non-success statuses,
    /// malformed bodies and declared GraphQL errors are returned as errors.
    pub async fn fetch_page(
        &self,
        channel: &str,
        page_size: u32,
        filter: TimeFilter,
        cursor: Option<&PaginationCursor>,
    ) -> Result<FetchResult> {
        let variables = ClipsVariables {
            login: channel,
            limit: page_size.clamp(1, MAX_PAGE_SIZE),
            criteria: ClipsCriteria { filter },
            cursor: cursor.map(PaginationCursor::as_str),
        };

        tracing::debug!(
            channel = %channel,
            filter = %filter,
            limit = variables.limit,
            cursor = cursor.map(PaginationCursor::preview).unwrap_or("-"),
            "Fetching clips page"
        );

        let response: GqlResponse<UserData> = match self.query_mode {
            QueryMode::Persisted => {
                let body = GqlRequest::persisted(
                    graphql::CLIPS_OPERATION,
                    graphql::CLIPS_QUERY_HASH,
                    variables,
                );
                self.post_json(&body).await?
            }
            QueryMode::Literal => {
                let body =
                    GqlRequest::literal(graphql::CLIPS_OPERATION, graphql::CLIPS_QUERY, variables);
                self.post_json(&body).await?
            }
        };

        let page = graphql::clips_page(response, channel, self.query_mode.cursor_location())?;

        tracing::debug!(
            channel = %channel,
            filter = %filter,
            clips = page.clips.len(),
            has_next_page = page.has_next_page,
            "Clips page received"
        );

        Ok(page)
    }

    /// Resolve the signed, directly playable video URL of a clip
    ///
    /// `Ok(None)` means the clip is not playable (missing record, source,
    /// signature or token); `Err` is a transport or protocol failure.
    pub async fn resolve_playback_url(&self, slug: &str) -> Result<Option<String>> {
        tracing::debug!(slug = %slug, "Resolving playback URL");

        let body = [GqlRequest::persisted(
            graphql::PLAYBACK_OPERATION,
            graphql::PLAYBACK_QUERY_HASH,
            PlaybackVariables { slug },
        )];
        let responses: Vec<GqlResponse<PlaybackData>> = self.post_json(&body).await?;
        let url = graphql::playback_url(responses)?;

        if url.is_none() {
            tracing::warn!(slug = %slug, "No playable source for clip");
        }
        Ok(url)
    }

    async fn post_json<B, T>(&self, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Client-ID", &self.client_id)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = message.chars().take(200).collect::<String>();
            tracing::warn!(status = status.as_u16(), "GraphQL endpoint returned an error status");
            return Err(Error::Status {
                code: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Builder for configuring a TwitchClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    endpoint: String,
    client_id: String,
    query_mode: QueryMode,
    timeout: Duration,
    user_agent: String,
    proxy: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            query_mode: QueryMode::default(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the GraphQL endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the `Client-ID` header value
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn query_mode(mut self, mode: QueryMode) -> Self {
        self.query_mode = mode;
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a proxy URL
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Build the client
    pub async fn build(self) -> Result<TwitchClient> {
        url::Url::parse(&self.endpoint)?;

        let client = if let Some(client) = self.client {
            client
        } else {
            let mut builder = Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout);

            if let Some(proxy_url) = &self.proxy {
                let proxy = reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::other(format!("Invalid proxy: {}", e)))?;
                builder = builder.proxy(proxy);
            }

            builder.build()?
        };

        Ok(TwitchClient {
            client,
            endpoint: self.endpoint,
            client_id: self.client_id,
            query_mode: self.query_mode,
            timeout: self.timeout,
        })
    }
}
