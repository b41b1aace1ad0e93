use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(TemplateId);
id_newtype!(ItemId);
id_newtype!(TierId);
id_newtype!(ArrangementId);

/// Wire name of the container holding unranked items.
pub const BANK_CONTAINER_ID: &str = "bank";

/// A tier or the bank. Serialized as the tier id, or `"bank"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContainerId {
    Tier(TierId),
    Bank,
}

impl ContainerId {
    pub fn tier(id: impl Into<String>) -> Self {
        Self::Tier(TierId::new(id))
    }

    pub fn is_bank(&self) -> bool {
        matches!(self, Self::Bank)
    }

    pub fn as_tier(&self) -> Option<&TierId> {
        match self {
            Self::Tier(id) => Some(id),
            Self::Bank => None,
        }
    }
}

impl From<String> for ContainerId {
    fn from(value: String) -> Self {
        if value == BANK_CONTAINER_ID {
            Self::Bank
        } else {
            Self::Tier(TierId(value))
        }
    }
}

impl From<ContainerId> for String {
    fn from(value: ContainerId) -> Self {
        match value {
            ContainerId::Tier(id) => id.0,
            ContainerId::Bank => BANK_CONTAINER_ID.to_string(),
        }
    }
}

impl From<TierId> for ContainerId {
    fn from(value: TierId) -> Self {
        Self::Tier(value)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tier(id) => f.write_str(id.as_str()),
            Self::Bank => f.write_str(BANK_CONTAINER_ID),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub id: TierId,
    pub label: String,
    pub color: String,
    pub order: u32,
}

impl Tier {
    pub fn new(id: &str, label: &str, color: &str, order: u32) -> Self {
        Self {
            id: TierId::from(id),
            label: label.to_string(),
            color: color.to_string(),
            order,
        }
    }
}

/// The S/A/B/C/D ladder every board starts with.
pub fn default_tiers() -> Vec<Tier> {
    vec![
        Tier::new("tier-s", "S", "#ff7f7f", 0),
        Tier::new("tier-a", "A", "#ffbf7f", 1),
        Tier::new("tier-b", "B", "#ffdf7f", 2),
        Tier::new("tier-c", "C", "#ffff7f", 3),
        Tier::new("tier-d", "D", "#bfff7f", 4),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}
