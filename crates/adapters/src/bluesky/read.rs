//! Bluesky read adapter for fetching an account's feed

use async_trait::async_trait;
use poem_enricher_domain::{FeedPage, PostSource, PostSourceError, RawPost};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::OnceCell;

/// Default PDS entryway
pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";

/// Feed options for the author feed request
#[derive(Debug, Clone, Copy)]
pub struct FeedOptions {
    /// Include the account's replies to other posts
    pub include_replies: bool,
    /// Include posts the account reposted
    pub include_reposts: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            include_replies: true,
            include_reposts: false,
        }
    }
}

/// Bluesky post source authenticated with an app password
pub struct BlueskyPostSource {
    client: Client,
    identifier: String,
    app_password: SecretString,
    base_url: String,
    options: FeedOptions,
    session: OnceCell<Session>,
}

#[derive(Debug, Clone)]
struct Session {
    access_jwt: SecretString,
    did: String,
}

impl BlueskyPostSource {
    pub fn new(identifier: String, app_password: SecretString, options: FeedOptions) -> Self {
        Self::with_base_url(
            identifier,
            app_password,
            DEFAULT_SERVICE_URL.to_string(),
            options,
        )
    }

    pub fn with_base_url(
        identifier: String,
        app_password: SecretString,
        base_url: String,
        options: FeedOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            identifier,
            app_password,
            base_url: base_url.trim_end_matches('/').to_string(),
            options,
            session: OnceCell::new(),
        }
    }

    /// Log in once per source and reuse the session
    async fn session(&self) -> Result<&Session, PostSourceError> {
        self.session.get_or_try_init(|| self.create_session()).await
    }

    async fn create_session(&self) -> Result<Session, PostSourceError> {
        let url = format!("{}/xrpc/com.atproto.server.createSession", self.base_url);
        let request = CreateSessionRequest {
            identifier: &self.identifier,
            password: self.app_password.expose_secret(),
        };

        tracing::info!(identifier = %self.identifier, "Authenticating with Bluesky");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PostSourceError::Network(e.to_string()))?;

        let response = check_status(response, "create session").await?;

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PostSourceError::Api(e.to_string()))?;

        if session.access_jwt.is_empty() || session.did.is_empty() {
            return Err(PostSourceError::Auth(
                "Session response is missing accessJwt or did".to_string(),
            ));
        }

        Ok(Session {
            access_jwt: SecretString::new(session.access_jwt.into()),
            did: session.did,
        })
    }

    /// The logged-in account is addressed by DID, anything else as given
    fn actor<'a>(&'a self, account: &'a str, session: &'a Session) -> &'a str {
        if account.is_empty() || account.eq_ignore_ascii_case(&self.identifier) {
            &session.did
        } else {
            account
        }
    }

    fn to_raw_post(item: FeedItem) -> RawPost {
        let record = item.post.record;

        let mut tags: Vec<String> = record.tags;
        for facet in record.facets {
            for feature in facet.features {
                if let Some(tag) = feature.tag {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
            }
        }

        RawPost {
            content: record.text,
            published_at: record.created_at,
            tags: tags.join(" "),
            uri: item.post.uri,
            cid: item.post.cid,
            ..Default::default()
        }
    }
}

/// Map non-success responses to source errors
async fn check_status(response: Response, context: &str) -> Result<Response, PostSourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|ts| {
                let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
                Duration::from_secs(ts.saturating_sub(now))
            });
        return Err(PostSourceError::RateLimited(retry_after));
    }

    let body = response.text().await.unwrap_or_default();
    let error = serde_json::from_str::<XrpcError>(&body).unwrap_or_default();

    let auth_failure = status == StatusCode::UNAUTHORIZED
        || matches!(
            error.error.as_deref(),
            Some("AuthenticationRequired" | "ExpiredToken" | "InvalidToken" | "AuthFactorTokenRequired")
        );

    if auth_failure {
        return Err(PostSourceError::Auth(format!(
            "{} failed: {}",
            context,
            error.message.unwrap_or(body)
        )));
    }

    Err(PostSourceError::Api(format!(
        "{} failed with {}: {}",
        context, status, body
    )))
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    #[serde(default)]
    access_jwt: String,
    #[serde(default)]
    did: String,
}

#[derive(Deserialize, Default)]
struct XrpcError {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct AuthorFeedResponse {
    #[serde(default)]
    feed: Vec<FeedItem>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct FeedItem {
    post: FeedPost,
    /// Present when the item is a repost or a pin
    reason: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct FeedPost {
    uri: String,
    cid: String,
    record: PostRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostRecord {
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    facets: Vec<Facet>,
}

#[derive(Deserialize)]
struct Facet {
    #[serde(default)]
    features: Vec<FacetFeature>,
}

#[derive(Deserialize)]
struct FacetFeature {
    tag: Option<String>,
}

#[async_trait]
impl PostSource for BlueskyPostSource {
    async fn fetch_page(
        &self,
        account: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<FeedPage, PostSourceError> {
        let session = self.session().await?;
        let actor = self.actor(account, session);

        let filter = if self.options.include_replies {
            "posts_with_replies"
        } else {
            "posts_no_replies"
        };

        let mut query: Vec<(&str, String)> = vec![
            ("actor", actor.to_string()),
            ("limit", limit.to_string()),
            ("filter", filter.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        tracing::debug!(actor = %actor, cursor = ?cursor, limit = limit, "Fetching author feed page");

        let url = format!("{}/xrpc/app.bsky.feed.getAuthorFeed", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", session.access_jwt.expose_secret()),
            )
            .query(&query)
            .send()
            .await
            .map_err(|e| PostSourceError::Network(e.to_string()))?;

        let response = check_status(response, "get author feed").await?;

        let feed: AuthorFeedResponse = response
            .json()
            .await
            .map_err(|e| PostSourceError::Api(e.to_string()))?;

        let total = feed.feed.len();
        let include_reposts = self.options.include_reposts;
        let posts: Vec<RawPost> = feed
            .feed
            .into_iter()
            .filter(|item| include_reposts || item.reason.is_none())
            .map(Self::to_raw_post)
            .collect();

        if posts.len() < total {
            tracing::debug!(skipped = total - posts.len(), "Skipped reposts");
        }

        Ok(FeedPage {
            posts,
            cursor: feed.cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_session(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .and(body_json(serde_json::json!({
                "identifier": "poet.bsky.social",
                "password": "app-pass"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accessJwt": "jwt-token",
                "refreshJwt": "refresh",
                "handle": "poet.bsky.social",
                "did": "did:plc:poet"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    fn source(server: &MockServer) -> BlueskyPostSource {
        BlueskyPostSource::with_base_url(
            "poet.bsky.social".to_string(),
            SecretString::new("app-pass".into()),
            server.uri(),
            FeedOptions::default(),
        )
    }

    fn feed_item(n: u32, created_at: &str) -> serde_json::Value {
        serde_json::json!({
            "post": {
                "uri": format!("at://did:plc:poet/app.bsky.feed.post/{}", n),
                "cid": format!("bafy{}", n),
                "author": {"did": "did:plc:poet", "handle": "poet.bsky.social"},
                "record": {
                    "$type": "app.bsky.feed.post",
                    "text": format!("poem number {} #haiku", n),
                    "createdAt": created_at,
                    "tags": ["micropoem"],
                    "facets": [{
                        "index": {"byteStart": 14, "byteEnd": 20},
                        "features": [{"$type": "app.bsky.richtext.facet#tag", "tag": "haiku"}]
                    }]
                },
                "indexedAt": created_at
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_page_maps_posts() {
        let server = MockServer::start().await;
        mount_session(&server).await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .and(header("Authorization", "Bearer jwt-token"))
            .and(query_param("actor", "did:plc:poet"))
            .and(query_param("limit", "2"))
            .and(query_param("filter", "posts_with_replies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cursor": "next-1",
                "feed": [
                    feed_item(2, "2024-03-10T12:00:00.000Z"),
                    feed_item(1, "2024-03-10T08:00:00.000Z")
                ]
            })))
            .mount(&server)
            .await;

        let page = source(&server)
            .fetch_page("poet.bsky.social", None, 2)
            .await
            .unwrap();

        assert_eq!(page.cursor.as_deref(), Some("next-1"));
        assert_eq!(page.posts.len(), 2);
        let first = &page.posts[0];
        assert_eq!(first.content, "poem number 2 #haiku");
        assert_eq!(first.published_at, "2024-03-10T12:00:00.000Z");
        assert_eq!(first.tags, "micropoem haiku");
        assert_eq!(first.uri, "at://did:plc:poet/app.bsky.feed.post/2");
        assert_eq!(first.cid, "bafy2");
    }

    #[tokio::test]
    async fn test_session_is_reused_and_cursor_forwarded() {
        let server = MockServer::start().await;
        mount_session(&server).await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .and(query_param("cursor", "next-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "feed": [feed_item(0, "2024-03-09T08:00:00.000Z")]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cursor": "next-1",
                "feed": [feed_item(1, "2024-03-10T08:00:00.000Z")]
            })))
            .mount(&server)
            .await;

        let source = source(&server);
        let first = source.fetch_page("poet.bsky.social", None, 100).await.unwrap();
        let second = source
            .fetch_page("poet.bsky.social", first.cursor.as_deref(), 100)
            .await
            .unwrap();

        assert_eq!(first.posts[0].cid, "bafy1");
        assert_eq!(second.posts[0].cid, "bafy0");
        assert!(second.cursor.is_none());
    }

    #[tokio::test]
    async fn test_reposts_are_skipped_by_default() {
        let server = MockServer::start().await;
        mount_session(&server).await;

        let mut repost = feed_item(7, "2023-01-01T00:00:00.000Z");
        repost["reason"] = serde_json::json!({
            "$type": "app.bsky.feed.defs#reasonRepost",
            "by": {"did": "did:plc:poet"}
        });

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cursor": "c",
                "feed": [feed_item(8, "2024-03-10T08:00:00.000Z"), repost]
            })))
            .mount(&server)
            .await;

        let page = source(&server)
            .fetch_page("poet.bsky.social", None, 100)
            .await
            .unwrap();

        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].cid, "bafy8");
    }

    #[tokio::test]
    async fn test_invalid_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "AuthenticationRequired",
                "message": "Invalid identifier or password"
            })))
            .mount(&server)
            .await;

        let result = source(&server).fetch_page("poet.bsky.social", None, 10).await;

        assert!(matches!(result, Err(PostSourceError::Auth(msg)) if msg.contains("Invalid identifier")));
    }

    #[tokio::test]
    async fn test_expired_token_is_auth_error() {
        let server = MockServer::start().await;
        mount_session(&server).await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "ExpiredToken",
                "message": "Token has expired"
            })))
            .mount(&server)
            .await;

        let result = source(&server).fetch_page("poet.bsky.social", None, 10).await;

        assert!(matches!(result, Err(PostSourceError::Auth(_))));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        mount_session(&server).await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = source(&server).fetch_page("poet.bsky.social", None, 10).await;

        assert!(matches!(result, Err(PostSourceError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_other_account_is_passed_through() {
        let server = MockServer::start().await;
        mount_session(&server).await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .and(query_param("actor", "other.bsky.social"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "feed": []
            })))
            .mount(&server)
            .await;

        let page = source(&server)
            .fetch_page("other.bsky.social", None, 10)
            .await
            .unwrap();

        assert!(page.posts.is_empty());
        assert!(page.cursor.is_none());
    }
}
