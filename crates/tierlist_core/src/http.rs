//! JSON/HTTP implementation of [`TierListApi`].

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ArrangementId, Item, Session, Template, TemplateId},
    error::{ApiError, ErrorCode},
    protocol::{
        ArrangementScope, CreateTemplateRequest, NewItem, RegisterItemsRequest,
        SaveArrangementRequest, SavedArrangement, SavedArrangementSummary, UpdateVisibilityRequest,
        UploadImageRequest, UploadImageResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::ClientSettings,
    error::{ClientError, ClientResult},
    ItemUpload, TierListApi,
};

pub struct HttpTierListApi {
    http: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpTierListApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_token: None,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: settings.api_base_url.clone(),
            api_token: settings.api_token.clone(),
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Base URL with `segments` appended; each segment is percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let invalid = || ClientError::validation(format!("invalid api base url '{}'", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> ClientResult<RequestBuilder> {
        let builder = self.http.request(method, self.url(segments)?);
        Ok(match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        resource: &str,
    ) -> ClientResult<T> {
        let response = check_status(builder.send().await?, resource).await?;
        Ok(response.json().await?)
    }

    async fn upload_one(&self, template_id: &TemplateId, file: &ItemUpload) -> ClientResult<NewItem> {
        let body = UploadImageRequest {
            filename: file.filename.clone(),
            content_type: file.mime_type.clone(),
            data_b64: STANDARD.encode(&file.bytes),
        };
        let uploaded: UploadImageResponse = self
            .send_json(
                self.request(Method::POST, &["templates", template_id.as_str(), "uploads"])?
                    .json(&body),
                "image upload",
            )
            .await?;
        Ok(NewItem {
            name: file.item_name(),
            image_url: uploaded.image_url,
        })
    }
}

/// Passes 2xx responses through; everything else becomes a [`ClientError`],
/// classified by status and worded by the server's error body when it has one.
async fn check_status(response: Response, resource: &str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => api_error.message,
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body,
    };
    debug!(status = status.as_u16(), resource, "backend request failed");
    Err(ClientError::from_api_error(
        ApiError::new(ErrorCode::from_status(status.as_u16()), message),
        resource,
    ))
}

#[async_trait]
impl TierListApi for HttpTierListApi {
    async fn list_templates(&self, search: Option<&str>) -> ClientResult<Vec<Template>> {
        let mut builder = self.request(Method::GET, &["templates"])?;
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            builder = builder.query(&[("search", search)]);
        }
        self.send_json(builder, "template list").await
    }

    async fn list_items(&self, template_id: &TemplateId) -> ClientResult<Vec<Item>> {
        self.send_json(
            self.request(Method::GET, &["templates", template_id.as_str(), "items"])?,
            "template",
        )
        .await
    }

    async fn create_template(&self, name: &str, is_public: bool) -> ClientResult<Template> {
        self.send_json(
            self.request(Method::POST, &["templates"])?
                .json(&CreateTemplateRequest {
                    name: name.to_string(),
                    is_public,
                }),
            "template",
        )
        .await
    }

    async fn upload_and_register_items(
        &self,
        template_id: &TemplateId,
        files: Vec<ItemUpload>,
    ) -> ClientResult<Vec<Item>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let results = join_all(files.iter().map(|file| self.upload_one(template_id, file))).await;
        let mut uploaded = Vec::with_capacity(files.len());
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(item) => uploaded.push(item),
                Err(err) => warn!(
                    template_id = %template_id,
                    filename = %file.filename,
                    error = %err,
                    "image upload failed; skipping item"
                ),
            }
        }
        if uploaded.is_empty() {
            return Err(ClientError::network(format!(
                "none of the {} uploads succeeded",
                files.len()
            )));
        }

        self.send_json(
            self.request(Method::POST, &["templates", template_id.as_str(), "items"])?
                .json(&RegisterItemsRequest { items: uploaded }),
            "template",
        )
        .await
    }

    async fn list_saved_arrangements(
        &self,
        template_id: &TemplateId,
        scope: ArrangementScope,
    ) -> ClientResult<Vec<SavedArrangementSummary>> {
        self.send_json(
            self.request(Method::GET, &["tier-lists"])?.query(&[
                ("template_id", template_id.as_str()),
                ("scope", scope.as_str()),
            ]),
            "tier list",
        )
        .await
    }

    async fn get_saved_arrangement(&self, id: &ArrangementId) -> ClientResult<SavedArrangement> {
        self.send_json(
            self.request(Method::GET, &["tier-lists", id.as_str()])?,
            "tier list",
        )
        .await
    }

    async fn save_arrangement(
        &self,
        request: SaveArrangementRequest,
    ) -> ClientResult<SavedArrangementSummary> {
        self.send_json(
            self.request(Method::POST, &["tier-lists"])?.json(&request),
            "tier list",
        )
        .await
    }

    async fn update_arrangement_visibility(
        &self,
        id: &ArrangementId,
        is_public: bool,
    ) -> ClientResult<SavedArrangementSummary> {
        self.send_json(
            self.request(Method::PATCH, &["tier-lists", id.as_str()])?
                .json(&UpdateVisibilityRequest { is_public }),
            "tier list",
        )
        .await
    }

    async fn delete_arrangement(&self, id: &ArrangementId) -> ClientResult<()> {
        let response = self
            .request(Method::DELETE, &["tier-lists", id.as_str()])?
            .send()
            .await?;
        check_status(response, "tier list").await?;
        Ok(())
    }

    async fn current_session(&self) -> ClientResult<Option<Session>> {
        let response = check_status(
            self.request(Method::GET, &["session"])?.send().await?,
            "session",
        )
        .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
