//! GraphQL request bodies, raw response shapes and their normalization
//!
//! The clips API answers the same logical question with slightly different
//! shapes depending on how it is queried: the persisted `ClipsCards__User`
//! operation only carries a cursor on each edge, while a literal query can ask
//! for `pageInfo.endCursor`. Each shape gets its own cursor extractor; both end
//! up as a [`FetchResult`].

use crate::error::{Error, Result};
use crate::models::{Broadcaster, Clip, Curator, FetchResult, Game, PaginationCursor, TimeFilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Operation name of the clip listing query
pub const CLIPS_OPERATION: &str = "ClipsCards__User";

/// Persisted query hash of the clip listing query
pub const CLIPS_QUERY_HASH: &str =
    "1cd671bfa12cec480499c087319f26d21925e9695d1f80225aae6a4354f23088";

/// Operation name of the single clip playback lookup
pub const PLAYBACK_OPERATION: &str = "ClipsDownloadButton";

/// Persisted query hash of the playback lookup
pub const PLAYBACK_QUERY_HASH: &str =
    "9c0a5b51612a41b06bfb93065deb6fd7bb7e011db2beb6e5e5d7588ae7f3ff4b";

/// Literal form of the clip listing query
pub const CLIPS_QUERY: &str = r#"query ClipsCards__User($login: String!, $limit: Int, $cursor: Cursor, $criteria: UserClipsInput) {
  user(login: $login) {
    clips(first: $limit, after: $cursor, criteria: $criteria) {
      pageInfo { hasNextPage endCursor }
      edges {
        cursor
        node {
          id slug url title viewCount durationSeconds createdAt thumbnailURL
          curator { login displayName }
          game { id name }
          broadcaster { login displayName }
        }
      }
    }
  }
}"#;

// ============================================================================
// Requests
// ============================================================================

/// A single GraphQL operation as posted to the endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlRequest<V> {
    pub operation_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<&'static str>,
    pub variables: V,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

impl<V> GqlRequest<V> {
    /// Reference a query stored server-side by hash
    pub fn persisted(operation_name: &'static str, hash: &'static str, variables: V) -> Self {
        Self {
            operation_name,
            query: None,
            variables,
            extensions: Some(Extensions {
                persisted_query: PersistedQuery {
                    version: 1,
                    sha256_hash: hash,
                },
            }),
        }
    }

    /// Send the query text itself
    pub fn literal(operation_name: &'static str, query: &'static str, variables: V) -> Self {
        Self {
            operation_name,
            query: Some(query),
            variables,
            extensions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extensions {
    pub persisted_query: PersistedQuery,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQuery {
    pub version: u32,
    pub sha256_hash: &'static str,
}

/// Variables of the clip listing query
#[derive(Debug, Clone, Serialize)]
pub struct ClipsVariables<'a> {
    pub login: &'a str,
    pub limit: u32,
    pub criteria: ClipsCriteria,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClipsCriteria {
    pub filter: TimeFilter,
}

/// Variables of the playback lookup
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackVariables<'a> {
    pub slug: &'a str,
}

// ============================================================================
// Responses
// ============================================================================

/// Envelope shared by every GraphQL answer
#[derive(Debug, Deserialize)]
pub struct GqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GqlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GqlError {
    pub message: String,
}

impl<T> GqlResponse<T> {
    /// Turn declared errors into [`Error::GraphQl`], otherwise hand back the data
    pub fn into_data(self) -> Result<Option<T>> {
        match self.errors {
            Some(errors) if !errors.is_empty() => Err(Error::GraphQl(
                errors.into_iter().map(|e| e.message).collect(),
            )),
            _ => Ok(self.data),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserData {
    pub user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
pub struct UserNode {
    pub clips: Option<ClipConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipConnection {
    pub edges: Option<Vec<ClipEdge>>,
    pub page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ClipEdge {
    pub cursor: Option<String>,
    pub node: Option<ClipNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipNode {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub view_count: Option<u64>,
    pub duration_seconds: Option<f64>,
    pub created_at: Option<String>,
    #[serde(rename = "thumbnailURL")]
    pub thumbnail_url: Option<String>,
    pub curator: Option<UserRef>,
    pub game: Option<GameNode>,
    pub broadcaster: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub login: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GameNode {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackData {
    pub clip: Option<PlaybackClip>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackClip {
    pub video_qualities: Option<Vec<VideoQuality>>,
    pub playback_access_token: Option<AccessToken>,
}

#[derive(Debug, Deserialize)]
pub struct VideoQuality {
    #[serde(rename = "sourceURL")]
    pub source_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccessToken {
    pub signature: Option<String>,
    pub value: Option<String>,
}

// ============================================================================
// Normalization
// ============================================================================

/// Where a response shape carries its next-page cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorLocation {
    /// Only on edges: use the last edge that has one
    LastEdge,
    /// On `pageInfo.endCursor`, with the last edge as a fallback
    PageInfo,
}

/// Cursor of the last edge carrying a non-empty cursor
pub fn last_edge_cursor(edges: &[ClipEdge]) -> Option<PaginationCursor> {
    edges
        .iter()
        .rev()
        .filter_map(|edge| edge.cursor.as_deref())
        .find(|cursor| !cursor.is_empty())
        .map(PaginationCursor::new)
}

/// Cursor advertised on the page info, falling back to the edges
pub fn page_info_cursor(
    page_info: Option<&PageInfo>,
    edges: &[ClipEdge],
) -> Option<PaginationCursor> {
    page_info
        .and_then(|info| info.end_cursor.as_deref())
        .filter(|cursor| !cursor.is_empty())
        .map(PaginationCursor::new)
        .or_else(|| last_edge_cursor(edges))
}

impl ClipConnection {
    /// Normalize one page of edges into a [`FetchResult`]
    ///
    /// A page whose cursor cannot be extracted is reported as the last page.
    pub fn into_fetch_result(self, channel: &str, location: CursorLocation) -> FetchResult {
        let edges = self.edges.unwrap_or_default();
        let end_cursor = match location {
            CursorLocation::LastEdge => last_edge_cursor(&edges),
            CursorLocation::PageInfo => page_info_cursor(self.page_info.as_ref(), &edges),
        };
        let has_next_page =
            self.page_info.map(|info| info.has_next_page).unwrap_or(false) && end_cursor.is_some();

        let total = edges.len();
        let clips: Vec<Clip> = edges
            .into_iter()
            .filter_map(|edge| edge.node)
            .filter_map(|node| node.into_clip(channel))
            .collect();

        if clips.len() < total {
            tracing::debug!(
                channel = %channel,
                dropped = total - clips.len(),
                "Dropped incomplete clip nodes"
            );
        }

        FetchResult {
            clips,
            has_next_page,
            end_cursor,
        }
    }
}

/// Normalize a clip listing response
///
/// Declared GraphQL errors fail the whole page. A missing user or clip
/// connection is an empty page.
pub fn clips_page(
    response: GqlResponse<UserData>,
    channel: &str,
    location: CursorLocation,
) -> Result<FetchResult> {
    let connection = response
        .into_data()?
        .and_then(|data| data.user)
        .and_then(|user| user.clips);

    match connection {
        Some(connection) => Ok(connection.into_fetch_result(channel, location)),
        None => {
            tracing::warn!(channel = %channel, "No user data found for channel");
            Ok(FetchResult::empty())
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ClipNode {
    /// Convert into a [`Clip`]
    ///
    /// Nodes without an id, without any way to derive a slug, or without a
    /// parseable creation date are dropped.
    pub fn into_clip(self, channel: &str) -> Option<Clip> {
        let id = non_empty(self.id)?;
        let slug = non_empty(self.slug);
        let url = match (non_empty(self.url), slug.as_deref()) {
            (Some(url), _) => url,
            (None, Some(slug)) => clip_page_url(channel, slug),
            (None, None) => return None,
        };
        if slug.is_none() && Clip::slug_from_url(&url).is_none() {
            return None;
        }

        let created_at = match self.created_at.as_deref().map(DateTime::parse_from_rfc3339) {
            Some(Ok(at)) => at.with_timezone(&Utc),
            _ => {
                tracing::debug!(clip = %id, "Clip without a valid creation date");
                return None;
            }
        };

        let curator = self.curator.and_then(|c| {
            let login = non_empty(c.login)?;
            Some(Curator {
                display_name: non_empty(c.display_name).unwrap_or_else(|| login.clone()),
                login,
            })
        });

        let game = self.game.and_then(|g| {
            Some(Game {
                id: non_empty(g.id),
                name: non_empty(g.name)?,
            })
        });

        let broadcaster = self
            .broadcaster
            .and_then(|b| {
                let login = non_empty(b.login)?;
                Some(Broadcaster {
                    display_name: non_empty(b.display_name).unwrap_or_else(|| login.clone()),
                    login,
                })
            })
            .or_else(|| {
                Some(Broadcaster {
                    display_name: channel.to_string(),
                    login: channel.to_string(),
                })
            });

        Some(Clip {
            id,
            slug,
            title: self.title.unwrap_or_default(),
            created_at,
            view_count: self.view_count.unwrap_or(0),
            duration_seconds: self.duration_seconds.unwrap_or(0.0),
            thumbnail_url: non_empty(self.thumbnail_url),
            url,
            curator,
            game,
            broadcaster,
        })
    }
}

/// Watch page URL of a clip
pub fn clip_page_url(channel: &str, slug: &str) -> String {
    format!("https://www.twitch.tv/{}/clip/{}", channel, slug)
}

/// Build the signed playable URL out of a playback lookup
///
/// Returns `None` when the source URL, the signature or the token is missing.
pub fn assemble_playback_url(clip: PlaybackClip) -> Option<String> {
    let source = clip
        .video_qualities
        .unwrap_or_default()
        .into_iter()
        .find_map(|quality| non_empty(quality.source_url))?;
    let token = clip.playback_access_token?;
    let signature = non_empty(token.signature)?;
    let value = non_empty(token.value)?;

    let mut url = match Url::parse(&source) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(source = %source, error = %e, "Unparseable clip source URL");
            return None;
        }
    };
    url.query_pairs_mut()
        .append_pair("sig", &signature)
        .append_pair("token", &value);
    Some(url.to_string())
}

/// Normalize a batched playback lookup response
pub fn playback_url(responses: Vec<GqlResponse<PlaybackData>>) -> Result<Option<String>> {
    let Some(first) = responses.into_iter().next() else {
        return Ok(None);
    };
    Ok(first
        .into_data()?
        .and_then(|data| data.clip)
        .and_then(assemble_playback_url))
}
