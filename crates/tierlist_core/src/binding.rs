//! Template/item binding: which template is active and whether a catalog
//! response still belongs to it.
//!
//! Each selection bumps a generation counter. A catalog response carries the
//! `CatalogRequest` it was issued for and is only applied while that request
//! is still the pending one, so a slow fetch for a previous template can never
//! overwrite the current board.

use shared::domain::{Item, ItemId, Template, TemplateId};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    pub generation: u64,
    pub template_id: TemplateId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// No template: the static fallback items are used directly.
    Fallback,
    Fetch(CatalogRequest),
}

#[derive(Debug, Clone, Default)]
pub struct TemplateBinding {
    selected: Option<Template>,
    generation: u64,
    pending: Option<CatalogRequest>,
}

impl TemplateBinding {
    pub fn select(&mut self, template: Option<Template>) -> Selection {
        self.generation += 1;
        self.selected = template;
        match &self.selected {
            None => {
                self.pending = None;
                info!(generation = self.generation, "cleared template selection");
                Selection::Fallback
            }
            Some(template) => {
                let request = CatalogRequest {
                    generation: self.generation,
                    template_id: template.id.clone(),
                };
                info!(
                    template_id = %template.id,
                    generation = self.generation,
                    "selected template"
                );
                self.pending = Some(request.clone());
                Selection::Fetch(request)
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn selected(&self) -> Option<&Template> {
        self.selected.as_ref()
    }

    pub fn selected_id(&self) -> Option<&TemplateId> {
        self.selected.as_ref().map(|template| &template.id)
    }

    pub fn pending(&self) -> Option<&CatalogRequest> {
        self.pending.as_ref()
    }

    pub fn is_current(&self, request: &CatalogRequest) -> bool {
        self.pending.as_ref() == Some(request)
    }

    /// Consumes the pending request if `request` is it; `false` means the
    /// response is stale and must be dropped.
    pub fn complete(&mut self, request: &CatalogRequest) -> bool {
        if !self.is_current(request) {
            debug!(
                template_id = %request.template_id,
                generation = request.generation,
                current_generation = self.generation,
                "discarding stale catalog response"
            );
            return false;
        }
        self.pending = None;
        true
    }
}

/// Items shown when no template is selected.
pub fn fallback_items() -> Vec<Item> {
    (1..=5)
        .map(|n| Item {
            id: ItemId::new(format!("item-{n}")),
            name: format!("Item {n}"),
            image_url: format!("/placeholder/item-{n}.png"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(id: &str) -> Template {
        Template {
            id: TemplateId::from(id),
            name: id.to_uppercase(),
            is_public: true,
            owner_id: None,
        }
    }

    #[test]
    fn each_selection_issues_a_new_generation() {
        let mut binding = TemplateBinding::default();
        let Selection::Fetch(first) = binding.select(Some(template("tpl-a"))) else {
            panic!("expected fetch");
        };
        let Selection::Fetch(second) = binding.select(Some(template("tpl-a"))) else {
            panic!("expected fetch");
        };

        assert!(second.generation > first.generation);
        assert!(!binding.is_current(&first));
        assert!(binding.is_current(&second));
    }

    #[test]
    fn stale_request_is_not_completed() {
        let mut binding = TemplateBinding::default();
        let Selection::Fetch(old) = binding.select(Some(template("tpl-a"))) else {
            panic!("expected fetch");
        };
        let Selection::Fetch(new) = binding.select(Some(template("tpl-b"))) else {
            panic!("expected fetch");
        };

        assert!(!binding.complete(&old));
        assert_eq!(binding.pending(), Some(&new));
        assert!(binding.complete(&new));
        assert!(binding.pending().is_none());
        assert!(!binding.complete(&new));
    }

    #[test]
    fn clearing_selection_uses_fallback_and_invalidates_pending() {
        let mut binding = TemplateBinding::default();
        let Selection::Fetch(request) = binding.select(Some(template("tpl-a"))) else {
            panic!("expected fetch");
        };
        assert_eq!(binding.select(None), Selection::Fallback);
        assert!(binding.selected().is_none());
        assert!(!binding.complete(&request));
    }

    #[test]
    fn fallback_items_have_distinct_ids() {
        let items = fallback_items();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].id, ItemId::from("item-1"));
        assert_eq!(items[4].id, ItemId::from("item-5"));
    }
}
