use std::path::Path;

use async_trait::async_trait;
use shared::{
    domain::{ArrangementId, Item, Session, Template, TemplateId},
    protocol::{
        ArrangementScope, SaveArrangementRequest, SavedArrangement, SavedArrangementSummary,
    },
};

pub mod binding;
pub mod board;
pub mod client;
pub mod config;
pub mod containers;
pub mod drag;
pub mod error;
pub mod http;
pub mod reconciler;

pub use board::{Board, BoardEvent, BoardUpdate, ContainerView};
pub use client::TierListClient;
pub use error::{ClientError, ClientResult, ErrorKind};
pub use http::HttpTierListApi;

/// An image picked for upload into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ItemUpload {
    /// Item name derived from the file name without its extension.
    pub fn item_name(&self) -> String {
        Path::new(&self.filename)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| self.filename.clone())
    }
}

/// Backend collaborator the arrangement engine consumes.
#[async_trait]
pub trait TierListApi: Send + Sync {
    async fn list_templates(&self, search: Option<&str>) -> ClientResult<Vec<Template>>;
    async fn list_items(&self, template_id: &TemplateId) -> ClientResult<Vec<Item>>;
    async fn create_template(&self, name: &str, is_public: bool) -> ClientResult<Template>;
    /// Uploads the files and registers one item per upload that succeeded.
    async fn upload_and_register_items(
        &self,
        template_id: &TemplateId,
        files: Vec<ItemUpload>,
    ) -> ClientResult<Vec<Item>>;
    async fn list_saved_arrangements(
        &self,
        template_id: &TemplateId,
        scope: ArrangementScope,
    ) -> ClientResult<Vec<SavedArrangementSummary>>;
    async fn get_saved_arrangement(&self, id: &ArrangementId) -> ClientResult<SavedArrangement>;
    async fn save_arrangement(
        &self,
        request: SaveArrangementRequest,
    ) -> ClientResult<SavedArrangementSummary>;
    async fn update_arrangement_visibility(
        &self,
        id: &ArrangementId,
        is_public: bool,
    ) -> ClientResult<SavedArrangementSummary>;
    async fn delete_arrangement(&self, id: &ArrangementId) -> ClientResult<()>;
    async fn current_session(&self) -> ClientResult<Option<Session>>;
}

pub struct MissingTierListApi;

#[async_trait]
impl TierListApi for MissingTierListApi {
    async fn list_templates(&self, _search: Option<&str>) -> ClientResult<Vec<Template>> {
        Err(ClientError::network("tier list backend is unavailable"))
    }

    async fn list_items(&self, template_id: &TemplateId) -> ClientResult<Vec<Item>> {
        Err(ClientError::network(format!(
            "tier list backend is unavailable for template {template_id}"
        )))
    }

    async fn create_template(&self, _name: &str, _is_public: bool) -> ClientResult<Template> {
        Err(ClientError::network("tier list backend is unavailable"))
    }

    async fn upload_and_register_items(
        &self,
        template_id: &TemplateId,
        _files: Vec<ItemUpload>,
    ) -> ClientResult<Vec<Item>> {
        Err(ClientError::network(format!(
            "tier list backend is unavailable for template {template_id}"
        )))
    }

    async fn list_saved_arrangements(
        &self,
        template_id: &TemplateId,
        _scope: ArrangementScope,
    ) -> ClientResult<Vec<SavedArrangementSummary>> {
        Err(ClientError::network(format!(
            "tier list backend is unavailable for template {template_id}"
        )))
    }

    async fn get_saved_arrangement(&self, id: &ArrangementId) -> ClientResult<SavedArrangement> {
        Err(ClientError::network(format!(
            "tier list backend is unavailable for list {id}"
        )))
    }

    async fn save_arrangement(
        &self,
        _request: SaveArrangementRequest,
    ) -> ClientResult<SavedArrangementSummary> {
        Err(ClientError::network("tier list backend is unavailable"))
    }

    async fn update_arrangement_visibility(
        &self,
        id: &ArrangementId,
        _is_public: bool,
    ) -> ClientResult<SavedArrangementSummary> {
        Err(ClientError::network(format!(
            "tier list backend is unavailable for list {id}"
        )))
    }

    async fn delete_arrangement(&self, id: &ArrangementId) -> ClientResult<()> {
        Err(ClientError::network(format!(
            "tier list backend is unavailable for list {id}"
        )))
    }

    async fn current_session(&self) -> ClientResult<Option<Session>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    TemplateChanged(Option<TemplateId>),
    Board(BoardUpdate),
    SessionChanged(Option<Session>),
    Notification(Notification),
}
