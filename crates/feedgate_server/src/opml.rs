//! The OPML capability: convert, save, list, download, delete.

use crate::capability::Capability;
use crate::context::{GatewayContext, OPML_SERVICE};
use crate::error::{GatewayError, GatewayResult};
use crate::request::{Request, Response};
use async_trait::async_trait;
use feedgate_codec::Codec;
use feedgate_rewrite::rewrite_opml;
use feedgate_store::{EncryptedStore, StoredEntry};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const PATH_PREFIX: &str = "/opml";
const DEFAULT_DOCUMENT_NAME: &str = "subscriptions.opml";

/// Stores subscription lists and serves them back with every feed URL
/// routed through the gateway.
///
/// Documents are stored as uploaded; rewriting happens at download time so
/// a saved list picks up codec changes for free.
pub struct OpmlCapability {
    context: Arc<GatewayContext>,
}

impl OpmlCapability {
    /// Creates the capability over the shared context.
    #[must_use]
    pub fn new(context: Arc<GatewayContext>) -> Self {
        Self { context }
    }

    async fn handle_upload(
        &self,
        request: &Request,
        codec: &Codec,
        store: &EncryptedStore,
    ) -> GatewayResult<Response> {
        let document = request
            .form_param("opml")
            .or_else(|| {
                (!request.is_form_post() && !request.body.is_empty())
                    .then(|| String::from_utf8_lossy(&request.body).into_owned())
            })
            .ok_or_else(|| GatewayError::Validation("missing OPML document".to_string()))?;

        let mode = request.param("mode").unwrap_or_else(|| "save".to_string());
        match mode.as_str() {
            "convert" => {
                let rewritten = rewrite_opml(&document, codec).await?;
                Ok(opml_response(DEFAULT_DOCUMENT_NAME, rewritten))
            }
            "save" => {
                let name = request
                    .param("name")
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string());
                let entry = store.new_entry(&name, document);
                let key = store.put(entry).await?.ok_or_else(|| {
                    GatewayError::Internal("store refused the uploaded document".to_string())
                })?;
                info!(name, key, "saved OPML document");
                Ok(Response::text(StatusCode::OK, key))
            }
            other => Err(GatewayError::Validation(format!("unknown mode: {other}"))),
        }
    }

    async fn handle_query(
        &self,
        request: &Request,
        codec: &Codec,
        store: &EncryptedStore,
    ) -> GatewayResult<Response> {
        let action = request
            .param("action")
            .unwrap_or_else(|| "list".to_string());
        match action.as_str() {
            "list" => {
                let keys = store.list().await?;
                let listing: Vec<_> = keys
                    .iter()
                    .map(|key| json!({ "id": key.name, "name": key.metadata.name }))
                    .collect();
                Ok(Response::json(
                    StatusCode::OK,
                    serde_json::to_string(&listing)?,
                ))
            }
            "download" => {
                let entry = self.stored_entry(request, store).await?;
                let rewritten = rewrite_opml(&entry.value, codec).await?;
                Ok(opml_response(&entry.name, rewritten))
            }
            "delete" => {
                let entry = self.stored_entry(request, store).await?;
                store.delete(&entry.key).await?;
                Ok(Response::text(StatusCode::OK, "deleted"))
            }
            other => Err(GatewayError::Validation(format!(
                "unknown action: {other}"
            ))),
        }
    }

    async fn stored_entry(
        &self,
        request: &Request,
        store: &EncryptedStore,
    ) -> GatewayResult<StoredEntry> {
        let id = request
            .param("id")
            .ok_or_else(|| GatewayError::Validation("id parameter is required".to_string()))?;
        store
            .get(&id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("no stored document {id}")))
    }
}

fn opml_response(name: &str, body: String) -> Response {
    let filename = name.replace('"', "");
    Response::new(StatusCode::OK)
        .with_header(CONTENT_TYPE, "text/xml; charset=utf-8")
        .with_header(
            CONTENT_DISPOSITION,
            &format!("attachment; filename=\"{filename}\""),
        )
        .with_body(body)
}

#[async_trait]
impl Capability for OpmlCapability {
    fn name(&self) -> &'static str {
        "opml"
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
        let store = self.context.store(OPML_SERVICE, &caller);

        match request.method {
            Method::POST => self.handle_upload(request, &codec, &store).await,
            Method::GET => self.handle_query(request, &codec, &store).await,
            _ => Err(GatewayError::Validation(format!(
                "unsupported method {}",
                request.method
            ))),
        }
    }
}
