//! The Mastodon capability: timelines as proxied RSS.
//!
//! Old podcast and feed clients predate every social API; the closest
//! thing they understand is RSS. This capability pulls a caller's
//! timeline from the Mastodon API and republishes it as a feed, which
//! then rides the same rewriting pipeline as any other feed.

use crate::capability::Capability;
use crate::context::{GatewayContext, MASTO_SERVICE};
use crate::error::{GatewayError, GatewayResult};
use crate::request::{Request, Response};
use async_trait::async_trait;
use chrono::{DateTime, Duration};
use feedgate_codec::Codec;
use feedgate_rewrite::{FeedRewriter, XmlDocument, XmlElement};
use feedgate_store::{EncryptedStore, StoredEntry};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use url::Url;

const PATH_PREFIX: &str = "/masto";
const CREDENTIALS_KEY_PREFIX: &str = "masto-credentials-";

/// Most statuses a timeline feed will carry before entry caps apply.
const STATUS_LIMIT: usize = 100;
/// Most API pages fetched per timeline request.
const PAGE_LIMIT: usize = 5;
const PAGE_SIZE: &str = "40";

/// Per-caller Mastodon account: instance URL and access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MastodonCredentials {
    server: String,
    token: String,
}

fn credentials_key(caller: &str) -> String {
    format!("{CREDENTIALS_KEY_PREFIX}{caller}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timeline {
    Home,
    Local,
    Public,
}

impl Timeline {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "home" => Some(Self::Home),
            "local" => Some(Self::Local),
            "public" => Some(Self::Public),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Local => "local",
            Self::Public => "public",
        }
    }

    fn api_path(self) -> &'static str {
        match self {
            Self::Home => "api/v1/timelines/home",
            Self::Local | Self::Public => "api/v1/timelines/public",
        }
    }
}

/// One status as returned by the Mastodon API. Only the fields the feed
/// needs; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
struct Status {
    id: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    account: Account,
    #[serde(default)]
    reblog: Option<Box<Status>>,
    #[serde(default)]
    media_attachments: Vec<MediaAttachment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Account {
    #[serde(default)]
    acct: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MediaAttachment {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Republishes Mastodon timelines as RSS.
pub struct MastodonCapability {
    context: Arc<GatewayContext>,
}

impl MastodonCapability {
    /// Creates the capability over the shared context.
    #[must_use]
    pub fn new(context: Arc<GatewayContext>) -> Self {
        Self { context }
    }

    async fn save_credentials(
        &self,
        request: &Request,
        store: &EncryptedStore,
        caller: &str,
    ) -> GatewayResult<Response> {
        let server = request
            .param("server")
            .ok_or_else(|| GatewayError::Validation("server parameter is required".to_string()))?;
        let token = request
            .param("token")
            .ok_or_else(|| GatewayError::Validation("token parameter is required".to_string()))?;
        let server = Url::parse(server.trim()).map_err(|_| {
            GatewayError::Validation("server parameter is not an absolute URL".to_string())
        })?;

        let credentials = MastodonCredentials {
            server: server.to_string(),
            token,
        };
        let entry = StoredEntry::with_key(
            credentials_key(caller),
            "mastodon account",
            serde_json::to_string(&credentials)?,
            MASTO_SERVICE,
            caller,
        );
        store.put(entry).await?.ok_or_else(|| {
            GatewayError::Internal("store refused the credentials".to_string())
        })?;
        info!(server = %server, "saved mastodon credentials");
        Ok(Response::text(StatusCode::OK, "saved"))
    }

    async fn account_status(
        &self,
        request: &Request,
        store: &EncryptedStore,
        caller: &str,
    ) -> GatewayResult<Response> {
        if request.param("action").as_deref() == Some("delete") {
            store.delete(&credentials_key(caller)).await?;
            return Ok(Response::text(StatusCode::OK, "deleted"));
        }

        let status = match store.get(&credentials_key(caller)).await? {
            Some(entry) => {
                let server = serde_json::from_str::<MastodonCredentials>(&entry.value)
                    .map(|credentials| credentials.server)
                    .unwrap_or_default();
                json!({ "configured": true, "server": server })
            }
            None => json!({ "configured": false }),
        };
        Ok(Response::json(StatusCode::OK, status.to_string()))
    }

    async fn timeline(
        &self,
        codec: &Codec,
        store: &EncryptedStore,
        caller: &str,
        name: &str,
    ) -> GatewayResult<Response> {
        let timeline = Timeline::parse(name)
            .ok_or_else(|| GatewayError::Validation(format!("unknown timeline: {name}")))?;
        let entry = store.get(&credentials_key(caller)).await?.ok_or_else(|| {
            GatewayError::NotFound("no mastodon account is configured".to_string())
        })?;
        let credentials: MastodonCredentials = serde_json::from_str(&entry.value)
            .map_err(|_| GatewayError::Internal("stored credentials are unreadable".to_string()))?;
        let server = Url::parse(&credentials.server)
            .map_err(|_| GatewayError::Internal("stored server URL is invalid".to_string()))?;

        let statuses = self
            .fetch_statuses(&server, &credentials.token, timeline)
            .await?;

        let host = server.host_str().unwrap_or("mastodon").to_string();
        let document = timeline_rss(&host, server.as_str(), timeline, &statuses);
        let raw = document.serialize()?;

        let cap = self
            .context
            .config
            .policy
            .entry_cap(codec.is_legacy_client());
        let rewriter = FeedRewriter::new(codec, cap).with_retention(
            Duration::days(self.context.config.rss_retention_days),
            Duration::days(self.context.config.atom_retention_days),
        );
        let rewritten = rewriter.rewrite(&raw).await?;

        Ok(Response::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .with_body(rewritten))
    }

    /// Pulls statuses page by page until the limit, the page cap, or the
    /// end of the timeline.
    async fn fetch_statuses(
        &self,
        server: &Url,
        token: &str,
        timeline: Timeline,
    ) -> GatewayResult<Vec<Status>> {
        let mut statuses: Vec<Status> = Vec::new();
        let mut max_id: Option<String> = None;

        for _ in 0..PAGE_LIMIT {
            let mut url = server
                .join(timeline.api_path())
                .map_err(|err| GatewayError::Internal(format!("api url: {err}")))?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("limit", PAGE_SIZE);
                if timeline == Timeline::Local {
                    pairs.append_pair("local", "true");
                }
                if let Some(id) = &max_id {
                    pairs.append_pair("max_id", id);
                }
            }

            let request =
                Request::get(url).with_header(AUTHORIZATION, &format!("Bearer {token}"));
            let response = self.context.fetcher().fetch(request).await?;
            if !response.status.is_success() {
                return Err(GatewayError::Upstream(format!(
                    "mastodon api answered {}",
                    response.status
                )));
            }
            let page: Vec<Status> = serde_json::from_slice(&response.body).map_err(|err| {
                GatewayError::Upstream(format!("mastodon api returned unparseable JSON: {err}"))
            })?;

            let Some(last) = page.last() else {
                break;
            };
            max_id = Some(last.id.clone());
            statuses.extend(page);
            if statuses.len() >= STATUS_LIMIT {
                statuses.truncate(STATUS_LIMIT);
                break;
            }
        }

        Ok(statuses)
    }
}

fn display_name(account: &Account) -> String {
    if account.display_name.trim().is_empty() {
        format!("@{}", account.acct)
    } else {
        account.display_name.clone()
    }
}

/// Escapes a value for interpolation into an HTML attribute.
fn attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

fn attachment_html(kind: &str, source: &str, description: Option<&str>) -> String {
    let source = attr(source);
    match kind {
        "image" | "gifv" => {
            let alt = attr(description.unwrap_or(""));
            format!("<p><img src=\"{source}\" alt=\"{alt}\"></p>")
        }
        "video" => format!("<p><video src=\"{source}\" controls></video></p>"),
        "audio" => format!("<p><audio src=\"{source}\" controls></audio></p>"),
        _ => format!("<p><a href=\"{source}\">attachment</a></p>"),
    }
}

fn status_item(status: &Status) -> XmlElement {
    let subject = status.reblog.as_deref().unwrap_or(status);
    let title = match &status.reblog {
        Some(_) => format!(
            "{} boosted {}",
            display_name(&status.account),
            display_name(&subject.account)
        ),
        None => display_name(&status.account),
    };
    let link = subject.url.clone().unwrap_or_else(|| subject.uri.clone());

    let mut body = String::new();
    if let Some(avatar) = &subject.account.avatar {
        body.push_str(&format!("<p><img src=\"{}\" alt=\"\"></p>", attr(avatar)));
    }
    body.push_str(&subject.content);
    for media in &subject.media_attachments {
        if let Some(source) = &media.url {
            body.push_str(&attachment_html(
                &media.kind,
                source,
                media.description.as_deref(),
            ));
        }
    }

    let mut item = XmlElement::new("item")
        .with_child(XmlElement::new("title").with_text(title))
        .with_child(
            XmlElement::new("guid")
                .with_attr("isPermaLink", "false")
                .with_text(status.id.as_str()),
        );
    if !link.is_empty() {
        item = item.with_child(XmlElement::new("link").with_text(link));
    }
    if let Ok(created) = DateTime::parse_from_rfc3339(&status.created_at) {
        item = item.with_child(XmlElement::new("pubDate").with_text(created.to_rfc2822()));
    }
    item.with_child(XmlElement::new("description").with_cdata_text(body))
}

fn timeline_rss(
    host: &str,
    server_url: &str,
    timeline: Timeline,
    statuses: &[Status],
) -> XmlDocument {
    let mut channel = XmlElement::new("channel")
        .with_child(
            XmlElement::new("title").with_text(format!("{host} {} timeline", timeline.as_str())),
        )
        .with_child(XmlElement::new("link").with_text(server_url))
        .with_child(
            XmlElement::new("description")
                .with_text(format!("Mastodon {} timeline", timeline.as_str())),
        );
    for status in statuses {
        channel.push_element(status_item(status));
    }
    XmlDocument::new(
        XmlElement::new("rss")
            .with_attr("version", "2.0")
            .with_child(channel),
    )
}

#[async_trait]
impl Capability for MastodonCapability {
    fn name(&self) -> &'static str {
        "masto"
    }

    fn matches(&self, request: &Request) -> bool {
        let path = request.url.path();
        path == PATH_PREFIX || path.starts_with(&format!("{PATH_PREFIX}/"))
    }

    async fn handle(&self, request: &Request) -> GatewayResult<Response> {
        let Some(caller) = self.context.auth.validate(request) else {
            return Err(GatewayError::Auth("missing or invalid key".to_string()));
        };
        let legacy = self
            .context
            .config
            .policy
            .is_legacy_user_agent(request.user_agent());
        let codec = self.context.codec(&caller, legacy);
        let store = self.context.store(MASTO_SERVICE, &caller);

        let segments: Vec<&str> = request
            .url
            .path_segments()
            .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
            .unwrap_or_default();

        match (&request.method, segments.get(1).copied(), segments.get(2).copied()) {
            (&Method::POST, None, _) => self.save_credentials(request, &store, &caller).await,
            (&Method::GET, None, _) => self.account_status(request, &store, &caller).await,
            (&Method::GET, Some("timeline"), Some(name)) => {
                self.timeline(&codec, &store, &caller, name).await
            }
            _ => Err(GatewayError::NotFound(format!(
                "no mastodon operation at {}",
                request.url.path()
            ))),
        }
    }
}
