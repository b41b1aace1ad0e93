use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{ContainerId, Item, ItemId, TierId, UserId},
    protocol::{ArrangementData, SaveArrangementRequest, SavedArrangement},
};
use tokio::{
    sync::{broadcast, Notify},
    time::timeout,
};

use super::*;
use crate::{
    drag::{DropTarget, PointerPosition},
    error::ErrorKind,
    NotificationLevel,
};

fn template(id: &str) -> Template {
    Template {
        id: TemplateId::from(id),
        name: id.to_uppercase(),
        is_public: true,
        owner_id: None,
    }
}

fn items(raw: &[&str]) -> Vec<Item> {
    raw.iter()
        .map(|id| Item {
            id: ItemId::from(*id),
            name: id.to_string(),
            image_url: format!("https://cdn.test/{id}.png"),
        })
        .collect()
}

fn session() -> Session {
    Session {
        user_id: UserId::from("user-1"),
        display_name: Some("Alice".to_string()),
    }
}

struct FakeApi {
    templates: Vec<Template>,
    catalogs: HashMap<TemplateId, Vec<Item>>,
    arrangements: HashMap<ArrangementId, SavedArrangement>,
    session: StdMutex<Option<Session>>,
    gates: StdMutex<HashMap<TemplateId, Arc<Notify>>>,
    list_gates: StdMutex<HashMap<ArrangementId, Arc<Notify>>>,
    list_requested: Notify,
    saved: StdMutex<Vec<SaveArrangementRequest>>,
}

impl FakeApi {
    fn new() -> Self {
        let mut data = ArrangementData::new();
        data.insert(TierId::from("tier-s"), vec![ItemId::from("b2")]);
        data.insert(TierId::from("tier-c"), vec![ItemId::from("ghost")]);
        let arrangement = SavedArrangement {
            id: ArrangementId::from("list-b"),
            template_id: TemplateId::from("tpl-b"),
            name: Some("b ranking".to_string()),
            is_public: true,
            owner_id: UserId::from("user-2"),
            data,
        };

        Self {
            templates: ["tpl-a", "tpl-b", "tpl-new", "tpl-broken"]
                .into_iter()
                .map(template)
                .collect(),
            catalogs: HashMap::from([
                (TemplateId::from("tpl-a"), items(&["a1", "a2", "a3"])),
                (TemplateId::from("tpl-b"), items(&["b1", "b2"])),
                (TemplateId::from("tpl-new"), Vec::new()),
            ]),
            arrangements: HashMap::from([(arrangement.id.clone(), arrangement)]),
            session: StdMutex::new(None),
            gates: StdMutex::new(HashMap::new()),
            list_gates: StdMutex::new(HashMap::new()),
            list_requested: Notify::new(),
            saved: StdMutex::new(Vec::new()),
        }
    }

    fn hold(&self, template_id: &str) {
        self.gates
            .lock()
            .expect("gates")
            .insert(TemplateId::from(template_id), Arc::new(Notify::new()));
    }

    fn release(&self, template_id: &str) {
        if let Some(gate) = self
            .gates
            .lock()
            .expect("gates")
            .get(&TemplateId::from(template_id))
        {
            gate.notify_one();
        }
    }

    fn hold_list(&self, list_id: &str) {
        self.list_gates
            .lock()
            .expect("list gates")
            .insert(ArrangementId::from(list_id), Arc::new(Notify::new()));
    }

    fn release_list(&self, list_id: &str) {
        if let Some(gate) = self
            .list_gates
            .lock()
            .expect("list gates")
            .get(&ArrangementId::from(list_id))
        {
            gate.notify_one();
        }
    }

    async fn list_request_started(&self) {
        timeout(Duration::from_secs(5), self.list_requested.notified())
            .await
            .expect("list request in time");
    }

    fn sign_in(&self) {
        *self.session.lock().expect("session") = Some(session());
    }
}

#[async_trait]
impl TierListApi for FakeApi {
    async fn list_templates(&self, _search: Option<&str>) -> ClientResult<Vec<Template>> {
        Ok(self.templates.clone())
    }

    async fn list_items(&self, template_id: &TemplateId) -> ClientResult<Vec<Item>> {
        let gate = self.gates.lock().expect("gates").get(template_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if template_id.as_str() == "tpl-broken" {
            return Err(ClientError::network("connection reset"));
        }
        self.catalogs
            .get(template_id)
            .cloned()
            .ok_or_else(|| ClientError::not_found("template"))
    }

    async fn create_template(&self, _name: &str, _is_public: bool) -> ClientResult<Template> {
        Ok(template("tpl-new"))
    }

    async fn upload_and_register_items(
        &self,
        _template_id: &TemplateId,
        files: Vec<ItemUpload>,
    ) -> ClientResult<Vec<Item>> {
        Ok(files
            .iter()
            .map(|file| Item {
                id: ItemId::new(format!("up-{}", file.item_name())),
                name: file.item_name(),
                image_url: format!("https://cdn.test/{}", file.filename),
            })
            .collect())
    }

    async fn list_saved_arrangements(
        &self,
        template_id: &TemplateId,
        _scope: ArrangementScope,
    ) -> ClientResult<Vec<SavedArrangementSummary>> {
        Ok(self
            .arrangements
            .values()
            .filter(|arrangement| &arrangement.template_id == template_id)
            .map(|arrangement| SavedArrangementSummary {
                id: arrangement.id.clone(),
                template_id: arrangement.template_id.clone(),
                name: arrangement.name.clone(),
                is_public: arrangement.is_public,
                owner_id: arrangement.owner_id.clone(),
                created_at: Utc::now(),
            })
            .collect())
    }

    async fn get_saved_arrangement(&self, id: &ArrangementId) -> ClientResult<SavedArrangement> {
        let gate = self.list_gates.lock().expect("list gates").get(id).cloned();
        if let Some(gate) = gate {
            self.list_requested.notify_one();
            gate.notified().await;
        }
        self.arrangements
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::not_found("tier list"))
    }

    async fn save_arrangement(
        &self,
        request: SaveArrangementRequest,
    ) -> ClientResult<SavedArrangementSummary> {
        let summary = SavedArrangementSummary {
            id: ArrangementId::from("list-new"),
            template_id: request.template_id.clone(),
            name: request.name.clone(),
            is_public: request.is_public,
            owner_id: UserId::from("user-1"),
            created_at: Utc::now(),
        };
        self.saved.lock().expect("saved").push(request);
        Ok(summary)
    }

    async fn update_arrangement_visibility(
        &self,
        id: &ArrangementId,
        _is_public: bool,
    ) -> ClientResult<SavedArrangementSummary> {
        Err(ClientError::not_found(format!("tier list {id}")))
    }

    async fn delete_arrangement(&self, _id: &ArrangementId) -> ClientResult<()> {
        Ok(())
    }

    async fn current_session(&self) -> ClientResult<Option<Session>> {
        Ok(self.session.lock().expect("session").clone())
    }
}

async fn next_matching(
    events: &mut broadcast::Receiver<ClientEvent>,
    matches: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event in time")
            .expect("event channel open");
        if matches(&event) {
            return event;
        }
    }
}

fn drain(events: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

fn error_notifications(events: &[ClientEvent]) -> usize {
    events
        .iter()
        .filter(|event| {
            matches!(
                event,
                ClientEvent::Notification(Notification {
                    level: NotificationLevel::Error,
                    ..
                })
            )
        })
        .count()
}

#[tokio::test]
async fn selecting_template_fills_bank_with_catalog() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    let mut events = client.subscribe_events();

    let update = client
        .select_template(Some(template("tpl-a")))
        .await
        .expect("select");
    assert_eq!(update, BoardUpdate::Reset { items: 3 });

    let seen = drain(&mut events);
    assert!(matches!(
        &seen[0],
        ClientEvent::TemplateChanged(Some(id)) if id.as_str() == "tpl-a"
    ));
    assert!(matches!(
        &seen[1],
        ClientEvent::Board(BoardUpdate::CatalogRequested(_))
    ));

    let bank = client
        .with_board(|board| board.store().bank().to_vec())
        .await;
    assert_eq!(bank, vec![ItemId::from("a1"), ItemId::from("a2"), ItemId::from("a3")]);
}

#[tokio::test]
async fn late_catalog_for_previous_template_is_discarded() {
    let api = Arc::new(FakeApi::new());
    api.hold("tpl-a");
    let client = TierListClient::new_with_api(api.clone());
    let mut events = client.subscribe_events();

    let slow = tokio::spawn({
        let client = client.clone();
        async move { client.select_template(Some(template("tpl-a"))).await }
    });
    next_matching(&mut events, |event| {
        matches!(
            event,
            ClientEvent::Board(BoardUpdate::CatalogRequested(request))
                if request.template_id.as_str() == "tpl-a"
        )
    })
    .await;

    let update = client
        .select_template(Some(template("tpl-b")))
        .await
        .expect("select b");
    assert_eq!(update, BoardUpdate::Reset { items: 2 });

    api.release("tpl-a");
    let late = slow.await.expect("join").expect("stale response is not an error");
    assert_eq!(late, BoardUpdate::StaleResponseDiscarded);

    let board = client.board().await;
    assert_eq!(board.selected_template().map(|t| t.id.as_str()), Some("tpl-b"));
    assert_eq!(
        board.store().bank(),
        &[ItemId::from("b1"), ItemId::from("b2")][..]
    );
    board.check_invariants().expect("invariants");
}

#[tokio::test]
async fn catalog_failure_empties_board_and_notifies() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    let mut events = client.subscribe_events();

    let err = client
        .select_template(Some(template("tpl-broken")))
        .await
        .expect_err("catalog fails");
    assert_eq!(err.kind(), ErrorKind::Network);

    let board = client.board().await;
    assert_eq!(board.store().item_count(), 0);
    assert_eq!(error_notifications(&drain(&mut events)), 1);
}

#[tokio::test]
async fn drag_through_client_moves_item_and_broadcasts() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    client
        .select_template(Some(template("tpl-a")))
        .await
        .expect("select");
    let mut events = client.subscribe_events();

    client
        .dispatch(BoardEvent::PointerDown {
            item: ItemId::from("a2"),
            at: PointerPosition::new(0.0, 0.0),
        })
        .await
        .expect("down");
    client
        .dispatch(BoardEvent::PointerMove {
            at: PointerPosition::new(0.0, 40.0),
        })
        .await
        .expect("move");
    let update = client
        .dispatch(BoardEvent::PointerUp {
            target: Some(DropTarget::Container(ContainerId::tier("tier-s"))),
        })
        .await
        .expect("up");

    assert_eq!(
        update,
        BoardUpdate::Moved {
            item: ItemId::from("a2"),
            from: ContainerId::Bank,
            to: ContainerId::tier("tier-s"),
        }
    );
    let seen = drain(&mut events);
    assert!(seen
        .iter()
        .any(|event| matches!(event, ClientEvent::Board(BoardUpdate::Moved { .. }))));
    assert!(client.with_board(Board::is_dirty).await);
}

#[tokio::test]
async fn saving_requires_session() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    client
        .select_template(Some(template("tpl-a")))
        .await
        .expect("select");
    let mut events = client.subscribe_events();

    let err = client.save_current(Some("mine"), false).await.expect_err("signed out");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(error_notifications(&drain(&mut events)), 1);
}

#[tokio::test]
async fn saving_without_template_is_rejected() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    client.set_session(Some(session())).await;

    let err = client.save_current(None, true).await.expect_err("no template");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn save_sends_projection_and_clears_dirty_flag() {
    let api = Arc::new(FakeApi::new());
    let client = TierListClient::new_with_api(api.clone());
    client.set_session(Some(session())).await;
    client
        .select_template(Some(template("tpl-a")))
        .await
        .expect("select");
    client
        .with_board(|board| assert!(!board.is_dirty()))
        .await;

    client
        .dispatch(BoardEvent::PointerDown {
            item: ItemId::from("a3"),
            at: PointerPosition::new(0.0, 0.0),
        })
        .await
        .expect("down");
    client
        .dispatch(BoardEvent::PointerMove {
            at: PointerPosition::new(10.0, 0.0),
        })
        .await
        .expect("move");
    client
        .dispatch(BoardEvent::PointerUp {
            target: Some(DropTarget::Container(ContainerId::tier("tier-b"))),
        })
        .await
        .expect("up");

    let saved = client
        .save_current(Some("  weekly  "), true)
        .await
        .expect("save");
    assert_eq!(saved.name.as_deref(), Some("weekly"));

    let request = api.saved.lock().expect("saved")[0].clone();
    assert_eq!(request.template_id, TemplateId::from("tpl-a"));
    assert_eq!(request.data.len(), 5);
    assert_eq!(
        request.data.get(&TierId::from("tier-b")),
        Some(&vec![ItemId::from("a3")])
    );
    assert!(!client.with_board(Board::is_dirty).await);
}

#[tokio::test]
async fn loading_list_of_other_template_switches_first() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    client
        .select_template(Some(template("tpl-a")))
        .await
        .expect("select");

    let update = client
        .load_arrangement(&ArrangementId::from("list-b"))
        .await
        .expect("load");
    assert_eq!(update, BoardUpdate::ArrangementApplied { ranked: 1 });

    let board = client.board().await;
    assert_eq!(board.selected_template().map(|t| t.id.as_str()), Some("tpl-b"));
    assert_eq!(
        board.store().items_in(&ContainerId::tier("tier-s")),
        Some(&[ItemId::from("b2")][..])
    );
    assert_eq!(board.store().bank(), &[ItemId::from("b1")][..]);
    board.check_invariants().expect("invariants");
}

#[tokio::test]
async fn newer_selection_wins_over_list_still_loading() {
    let api = Arc::new(FakeApi::new());
    api.hold_list("list-b");
    let client = TierListClient::new_with_api(api.clone());
    client
        .select_template(Some(template("tpl-a")))
        .await
        .expect("select a");

    let load = tokio::spawn({
        let client = client.clone();
        async move { client.load_arrangement(&ArrangementId::from("list-b")).await }
    });
    api.list_request_started().await;
    client
        .select_template(Some(template("tpl-new")))
        .await
        .expect("select new");
    api.release_list("list-b");

    let update = load.await.expect("join").expect("superseded load is not an error");
    assert_eq!(update, BoardUpdate::StaleResponseDiscarded);
    let board = client.board().await;
    assert_eq!(board.selected_template().map(|t| t.id.as_str()), Some("tpl-new"));
    assert_eq!(board.store().item_count(), 0);
}

#[tokio::test]
async fn list_for_selected_template_is_dropped_after_reselection() {
    let api = Arc::new(FakeApi::new());
    api.hold_list("list-b");
    let client = TierListClient::new_with_api(api.clone());
    client
        .select_template(Some(template("tpl-b")))
        .await
        .expect("select b");

    let load = tokio::spawn({
        let client = client.clone();
        async move { client.load_arrangement(&ArrangementId::from("list-b")).await }
    });
    api.list_request_started().await;
    client
        .select_template(Some(template("tpl-b")))
        .await
        .expect("reselect b");
    api.release_list("list-b");

    let update = load.await.expect("join").expect("superseded load is not an error");
    assert_eq!(update, BoardUpdate::StaleResponseDiscarded);
    let board = client.board().await;
    assert_eq!(
        board.store().items_in(&ContainerId::tier("tier-s")),
        Some(&[] as &[ItemId])
    );
    assert_eq!(board.store().bank(), &[ItemId::from("b1"), ItemId::from("b2")][..]);
}

#[tokio::test]
async fn share_link_list_is_dropped_when_user_switches_away() {
    let api = Arc::new(FakeApi::new());
    api.hold_list("list-b");
    let client = TierListClient::new_with_api(api.clone());

    let open = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .open_share_link("?template_id=tpl-b&load_list_id=list-b")
                .await
        }
    });
    api.list_request_started().await;
    client
        .select_template(Some(template("tpl-a")))
        .await
        .expect("select a");
    api.release_list("list-b");

    let update = open.await.expect("join").expect("superseded link is not an error");
    assert_eq!(update, BoardUpdate::StaleResponseDiscarded);
    let board = client.board().await;
    assert_eq!(board.selected_template().map(|t| t.id.as_str()), Some("tpl-a"));
    assert_eq!(
        board.store().bank(),
        &[ItemId::from("a1"), ItemId::from("a2"), ItemId::from("a3")][..]
    );
    board.check_invariants().expect("invariants");
}

#[tokio::test]
async fn missing_list_reports_not_found() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    let mut events = client.subscribe_events();

    let err = client
        .load_arrangement(&ArrangementId::from("list-zzz"))
        .await
        .expect_err("missing");
    assert_eq!(err.kind(), ErrorKind::NotFoundOrForbidden);
    assert_eq!(error_notifications(&drain(&mut events)), 1);
}

#[tokio::test]
async fn share_link_opens_template_and_list() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));

    let update = client
        .open_share_link("https://tiers.example/?template_id=tpl-b&load_list_id=list-b")
        .await
        .expect("open");
    assert_eq!(update, BoardUpdate::ArrangementApplied { ranked: 1 });

    let link = client
        .share_link("https://tiers.example/", Some(&ArrangementId::from("list-b")))
        .await
        .expect("link");
    assert_eq!(
        link,
        "https://tiers.example/?template_id=tpl-b&load_list_id=list-b"
    );
}

#[tokio::test]
async fn share_link_without_template_is_invalid() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));

    let err = client
        .open_share_link("?load_list_id=list-b")
        .await
        .expect_err("no template");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = client
        .share_link("https://tiers.example/", None)
        .await
        .expect_err("nothing selected");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn uploads_land_in_bank() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    client.set_session(Some(session())).await;
    client
        .select_template(Some(template("tpl-b")))
        .await
        .expect("select");

    let err = client.upload_items(Vec::new()).await.expect_err("no files");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let update = client
        .upload_items(vec![ItemUpload {
            filename: "otter.png".to_string(),
            mime_type: Some("image/png".to_string()),
            bytes: vec![0, 1, 2],
        }])
        .await
        .expect("upload");
    assert_eq!(update, BoardUpdate::ItemsAdded { count: 1 });

    let board = client.board().await;
    assert_eq!(board.store().bank().last(), Some(&ItemId::from("up-otter")));
    assert_eq!(board.item(&ItemId::from("up-otter")).map(|i| i.name.as_str()), Some("otter"));
    board.check_invariants().expect("invariants");
}

#[tokio::test]
async fn create_template_validates_and_selects() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    client.set_session(Some(session())).await;

    let err = client.create_template("   ", true).await.expect_err("blank");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let created = client
        .create_template("Birds", false)
        .await
        .expect("create");
    assert_eq!(created.id, TemplateId::from("tpl-new"));
    assert_eq!(
        client
            .with_board(|board| board.selected_template().map(|t| t.id.clone()))
            .await,
        Some(TemplateId::from("tpl-new"))
    );
}

#[tokio::test]
async fn refresh_session_broadcasts_only_changes() {
    let api = Arc::new(FakeApi::new());
    let client = TierListClient::new_with_api(api.clone());
    let mut events = client.subscribe_events();

    assert_eq!(client.refresh_session().await.expect("refresh"), None);
    assert!(drain(&mut events).is_empty());

    api.sign_in();
    client.refresh_session().await.expect("refresh");
    client.refresh_session().await.expect("refresh");

    let changes = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, ClientEvent::SessionChanged(Some(_))))
        .count();
    assert_eq!(changes, 1);
    assert_eq!(client.session().await, Some(session()));
}

#[tokio::test]
async fn backend_errors_are_returned_and_notified() {
    let client = TierListClient::new_with_api(Arc::new(FakeApi::new()));
    let mut events = client.subscribe_events();

    let err = client
        .set_visibility(&ArrangementId::from("list-b"), false)
        .await
        .expect_err("forbidden");
    assert_eq!(err.kind(), ErrorKind::NotFoundOrForbidden);

    let seen = drain(&mut events);
    assert!(seen.iter().any(|event| matches!(
        event,
        ClientEvent::Notification(notification)
            if notification.level == NotificationLevel::Error
                && notification.message.contains("could not be found")
    )));
}

#[tokio::test]
async fn missing_backend_client_reports_network_failure() {
    let client = TierListClient::new();

    let err = client
        .select_template_by_id(&TemplateId::from("tpl-a"))
        .await
        .expect_err("no backend");
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(client.with_board(|board| board.items().len()).await, 5);
}
