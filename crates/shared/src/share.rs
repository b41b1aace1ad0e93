//! Shareable link codec: `template_id=<id>&load_list_id=<id>`.

use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::domain::{ArrangementId, TemplateId};

pub const TEMPLATE_PARAM: &str = "template_id";
pub const LOAD_LIST_PARAM: &str = "load_list_id";

#[derive(Debug, Error)]
pub enum ShareLinkError {
    #[error("share link has no template_id parameter")]
    MissingTemplate,
    #[error("invalid share base url '{base}': {source}")]
    InvalidBase {
        base: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub template_id: TemplateId,
    pub load_list_id: Option<ArrangementId>,
}

impl ShareLink {
    pub fn new(template_id: TemplateId, load_list_id: Option<ArrangementId>) -> Self {
        Self {
            template_id,
            load_list_id,
        }
    }

    /// Accepts a full URL or a bare query string (with or without the leading `?`).
    pub fn parse(input: &str) -> Result<Self, ShareLinkError> {
        let input = input.trim();
        let pairs: Vec<(String, String)> = match Url::parse(input) {
            Ok(url) => url.query_pairs().into_owned().collect(),
            Err(_) => form_urlencoded::parse(input.trim_start_matches('?').as_bytes())
                .into_owned()
                .collect(),
        };

        let mut template_id = None;
        let mut load_list_id = None;
        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                TEMPLATE_PARAM => template_id = Some(TemplateId::from(value)),
                LOAD_LIST_PARAM => load_list_id = Some(ArrangementId::from(value)),
                _ => {}
            }
        }

        let template_id = template_id.ok_or(ShareLinkError::MissingTemplate)?;
        Ok(Self {
            template_id,
            load_list_id,
        })
    }

    pub fn to_url(&self, base: &str) -> Result<Url, ShareLinkError> {
        let mut url = Url::parse(base).map_err(|source| ShareLinkError::InvalidBase {
            base: base.to_string(),
            source,
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair(TEMPLATE_PARAM, self.template_id.as_str());
            if let Some(list_id) = &self.load_list_id {
                query.append_pair(LOAD_LIST_PARAM, list_id.as_str());
            }
        }
        Ok(url)
    }
}
