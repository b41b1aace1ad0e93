//! Async front over the board and the backend.
//!
//! Network calls never run under the board lock. Every response is fed back
//! through [`Board::dispatch`] together with the generation it was issued
//! for, so results that arrive after a newer selection are dropped there.

use std::sync::Arc;

use shared::{
    domain::{default_tiers, ArrangementId, Session, Template, TemplateId},
    protocol::{ArrangementScope, SavedArrangementSummary},
    share::ShareLink,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::{
    board::{Board, BoardEvent, BoardUpdate},
    config::ClientSettings,
    drag::DEFAULT_ACTIVATION_DISTANCE,
    error::{ClientError, ClientResult},
    http::HttpTierListApi,
    reconciler, ClientEvent, ItemUpload, MissingTierListApi, Notification, TierListApi,
};

pub struct TierListClient {
    api: Arc<dyn TierListApi>,
    board: Mutex<Board>,
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<ClientEvent>,
}

impl TierListClient {
    pub fn new() -> Arc<Self> {
        Self::new_with_dependencies(
            Arc::new(MissingTierListApi),
            Board::new(default_tiers(), DEFAULT_ACTIVATION_DISTANCE),
        )
    }

    pub fn from_settings(settings: &ClientSettings) -> ClientResult<Arc<Self>> {
        let api = HttpTierListApi::from_settings(settings)?;
        Ok(Self::new_with_dependencies(
            Arc::new(api),
            Board::new(default_tiers(), settings.drag_activation_distance),
        ))
    }

    pub fn new_with_api(api: Arc<dyn TierListApi>) -> Arc<Self> {
        Self::new_with_dependencies(api, Board::new(default_tiers(), DEFAULT_ACTIVATION_DISTANCE))
    }

    pub fn new_with_dependencies(api: Arc<dyn TierListApi>, board: Board) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            api,
            board: Mutex::new(board),
            session: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the board.
    pub async fn board(&self) -> Board {
        self.board.lock().await.clone()
    }

    pub async fn with_board<R>(&self, read: impl FnOnce(&Board) -> R) -> R {
        let board = self.board.lock().await;
        read(&board)
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// Applies a pointer event (or any other board event) and broadcasts the result.
    pub async fn dispatch(&self, event: BoardEvent) -> ClientResult<BoardUpdate> {
        let result = self.board.lock().await.dispatch(event);
        if let Ok(update) = &result {
            self.emit_board(update);
        }
        self.report(result)
    }

    pub async fn select_template(&self, template: Option<Template>) -> ClientResult<BoardUpdate> {
        let result = self.select_and_fetch(template).await.map(|(_, update)| update);
        self.report(result)
    }

    pub async fn select_template_by_id(&self, id: &TemplateId) -> ClientResult<BoardUpdate> {
        let result = match self.find_template(id).await {
            Ok(template) => self
                .select_and_fetch(Some(template))
                .await
                .map(|(_, update)| update),
            Err(err) => Err(err),
        };
        self.report(result)
    }

    pub async fn load_arrangement(&self, id: &ArrangementId) -> ClientResult<BoardUpdate> {
        let result = self.load_arrangement_inner(id).await;
        self.report(result)
    }

    pub async fn save_current(
        &self,
        name: Option<&str>,
        is_public: bool,
    ) -> ClientResult<SavedArrangementSummary> {
        let result = self.save_current_inner(name, is_public).await;
        if let Ok(saved) = &result {
            self.notify(Notification::success(match &saved.name {
                Some(name) => format!("Saved \"{name}\"."),
                None => "Tier list saved.".to_string(),
            }));
        }
        self.report(result)
    }

    /// Creates a template and selects it.
    pub async fn create_template(&self, name: &str, is_public: bool) -> ClientResult<Template> {
        let result = self.create_template_inner(name, is_public).await;
        self.report(result)
    }

    /// Uploads images into the selected template; the new items land in the bank.
    pub async fn upload_items(&self, files: Vec<ItemUpload>) -> ClientResult<BoardUpdate> {
        let result = self.upload_items_inner(files).await;
        if let Ok(BoardUpdate::ItemsAdded { count }) = &result {
            self.notify(Notification::success(format!("Added {count} item(s).")));
        }
        self.report(result)
    }

    pub async fn list_templates(&self, search: Option<&str>) -> ClientResult<Vec<Template>> {
        let result = self.api.list_templates(search).await;
        self.report(result)
    }

    /// Saved lists for the selected template.
    pub async fn list_saved(
        &self,
        scope: ArrangementScope,
    ) -> ClientResult<Vec<SavedArrangementSummary>> {
        let result = match self.selected_template_id().await {
            Ok(template_id) => self.api.list_saved_arrangements(&template_id, scope).await,
            Err(err) => Err(err),
        };
        self.report(result)
    }

    pub async fn set_visibility(
        &self,
        id: &ArrangementId,
        is_public: bool,
    ) -> ClientResult<SavedArrangementSummary> {
        let result = self.api.update_arrangement_visibility(id, is_public).await;
        self.report(result)
    }

    pub async fn delete_arrangement(&self, id: &ArrangementId) -> ClientResult<()> {
        let result = self.api.delete_arrangement(id).await;
        if result.is_ok() {
            info!(arrangement_id = %id, "deleted tier list");
            self.notify(Notification::success("Tier list deleted."));
        }
        self.report(result)
    }

    pub async fn refresh_session(&self) -> ClientResult<Option<Session>> {
        let result = self.api.current_session().await;
        if let Ok(session) = &result {
            self.set_session(session.clone()).await;
        }
        self.report(result)
    }

    pub async fn set_session(&self, session: Option<Session>) {
        let mut current = self.session.lock().await;
        if *current == session {
            return;
        }
        *current = session.clone();
        drop(current);
        debug!(signed_in = session.is_some(), "session changed");
        let _ = self.events.send(ClientEvent::SessionChanged(session));
    }

    /// Selects the linked template and, when the link names one, loads the saved list.
    pub async fn open_share_link(&self, link: &str) -> ClientResult<BoardUpdate> {
        let result = self.open_share_link_inner(link).await;
        self.report(result)
    }

    /// Link to the selected template, optionally pointing at a saved list.
    pub async fn share_link(
        &self,
        base_url: &str,
        list_id: Option<&ArrangementId>,
    ) -> ClientResult<String> {
        let result = match self.selected_template_id().await {
            Ok(template_id) => ShareLink::new(template_id, list_id.cloned())
                .to_url(base_url)
                .map(|url| url.to_string())
                .map_err(|err| ClientError::validation(err.to_string())),
            Err(err) => Err(err),
        };
        self.report(result)
    }

    /// Returns the generation this selection was issued under with the last update.
    async fn select_and_fetch(&self, template: Option<Template>) -> ClientResult<(u64, BoardUpdate)> {
        self.select_and_fetch_unless_superseded(template, None).await
    }

    /// Like [`Self::select_and_fetch`], but selects nothing when the board has
    /// moved past `expected_generation` by the time the lock is taken.
    async fn select_and_fetch_unless_superseded(
        &self,
        template: Option<Template>,
        expected_generation: Option<u64>,
    ) -> ClientResult<(u64, BoardUpdate)> {
        let template_id = template.as_ref().map(|template| template.id.clone());
        let (generation, update) = {
            let mut board = self.board.lock().await;
            if let Some(expected) = expected_generation.filter(|g| *g != board.generation()) {
                debug!(
                    expected_generation = expected,
                    current_generation = board.generation(),
                    "not switching template for a superseded request"
                );
                return Ok((board.generation(), BoardUpdate::StaleResponseDiscarded));
            }
            let update = board.dispatch(BoardEvent::TemplateSelected(template))?;
            (board.generation(), update)
        };
        let _ = self.events.send(ClientEvent::TemplateChanged(template_id));
        self.emit_board(&update);

        let request = match update {
            BoardUpdate::CatalogRequested(request) => request,
            update => return Ok((generation, update)),
        };
        let result = self.api.list_items(&request.template_id).await;
        let applied = self
            .board
            .lock()
            .await
            .dispatch(BoardEvent::CatalogLoaded { request, result })?;
        self.emit_board(&applied);
        match applied {
            BoardUpdate::CatalogUnavailable(err) => Err(err),
            applied => Ok((generation, applied)),
        }
    }

    async fn find_template(&self, id: &TemplateId) -> ClientResult<Template> {
        self.api
            .list_templates(None)
            .await?
            .into_iter()
            .find(|template| &template.id == id)
            .ok_or_else(|| ClientError::not_found("template"))
    }

    async fn load_arrangement_inner(&self, id: &ArrangementId) -> ClientResult<BoardUpdate> {
        let (generation, selected) = {
            let board = self.board.lock().await;
            (board.generation(), board.selected_template().map(|t| t.id.clone()))
        };
        self.load_arrangement_under(id, generation, selected).await
    }

    /// Loads a saved list on behalf of the selection that was current at
    /// `generation`; a newer selection wins over the list.
    async fn load_arrangement_under(
        &self,
        id: &ArrangementId,
        mut generation: u64,
        selected: Option<TemplateId>,
    ) -> ClientResult<BoardUpdate> {
        let arrangement = self.api.get_saved_arrangement(id).await?;

        if selected.as_ref() != Some(&arrangement.template_id) {
            info!(
                arrangement_id = %arrangement.id,
                template_id = %arrangement.template_id,
                "switching template to load tier list"
            );
            let template = self.find_template(&arrangement.template_id).await?;
            let (selected_generation, update) = self
                .select_and_fetch_unless_superseded(Some(template), Some(generation))
                .await?;
            if update == BoardUpdate::StaleResponseDiscarded {
                self.emit_board(&update);
                return Ok(update);
            }
            generation = selected_generation;
        }

        let update = self.board.lock().await.dispatch(BoardEvent::ArrangementLoaded {
            generation,
            arrangement,
        })?;
        self.emit_board(&update);
        Ok(update)
    }

    async fn save_current_inner(
        &self,
        name: Option<&str>,
        is_public: bool,
    ) -> ClientResult<SavedArrangementSummary> {
        self.require_session().await?;
        let request = self.board.lock().await.save_request(name, is_public)?;
        let data = request.data.clone();

        let saved = self.api.save_arrangement(request).await?;
        info!(arrangement_id = %saved.id, template_id = %saved.template_id, "saved tier list");

        let mut board = self.board.lock().await;
        let unchanged = board.selected_template().map(|t| &t.id) == Some(&saved.template_id)
            && reconciler::save_projection(board.store()) == data;
        if unchanged {
            let update = board.dispatch(BoardEvent::Saved)?;
            drop(board);
            self.emit_board(&update);
        }
        Ok(saved)
    }

    async fn create_template_inner(&self, name: &str, is_public: bool) -> ClientResult<Template> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::validation("Template name cannot be empty."));
        }
        self.require_session().await?;

        let template = self.api.create_template(name, is_public).await?;
        info!(template_id = %template.id, "created template");
        self.select_and_fetch(Some(template.clone())).await?;
        Ok(template)
    }

    async fn upload_items_inner(&self, files: Vec<ItemUpload>) -> ClientResult<BoardUpdate> {
        self.require_session().await?;
        if files.is_empty() {
            return Err(ClientError::validation("Choose at least one image to upload."));
        }
        let (generation, template_id) = {
            let board = self.board.lock().await;
            let template_id = board
                .selected_template()
                .map(|template| template.id.clone())
                .ok_or_else(|| ClientError::validation("Select a template before uploading."))?;
            if board.pending_catalog().is_some() {
                return Err(ClientError::validation(
                    "Wait for the template items to load before uploading.",
                ));
            }
            (board.generation(), template_id)
        };

        let items = self
            .api
            .upload_and_register_items(&template_id, files)
            .await?;
        let update = self.board.lock().await.dispatch(BoardEvent::ItemsRegistered {
            generation,
            template_id,
            items,
        })?;
        self.emit_board(&update);
        Ok(update)
    }

    async fn open_share_link_inner(&self, link: &str) -> ClientResult<BoardUpdate> {
        let link = ShareLink::parse(link).map_err(|err| ClientError::validation(err.to_string()))?;
        let template = self.find_template(&link.template_id).await?;
        let template_id = template.id.clone();
        let (generation, update) = self.select_and_fetch(Some(template)).await?;
        match link.load_list_id {
            Some(list_id) => {
                self.load_arrangement_under(&list_id, generation, Some(template_id))
                    .await
            }
            None => Ok(update),
        }
    }

    async fn selected_template_id(&self) -> ClientResult<TemplateId> {
        self.board
            .lock()
            .await
            .selected_template()
            .map(|template| template.id.clone())
            .ok_or_else(|| ClientError::validation("Select a template first."))
    }

    async fn require_session(&self) -> ClientResult<Session> {
        self.session
            .lock()
            .await
            .clone()
            .ok_or_else(|| ClientError::validation("Sign in first."))
    }

    fn emit_board(&self, update: &BoardUpdate) {
        if *update != BoardUpdate::Unchanged {
            let _ = self.events.send(ClientEvent::Board(update.clone()));
        }
    }

    fn notify(&self, notification: Notification) {
        let _ = self.events.send(ClientEvent::Notification(notification));
    }

    fn report<T>(&self, result: ClientResult<T>) -> ClientResult<T> {
        if let Err(err) = &result {
            debug!(kind = ?err.kind(), error = %err, "client operation failed");
            self.notify(Notification::error(err.user_message()));
        }
        result
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
