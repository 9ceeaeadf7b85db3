//! Remote JSON representation
//!
//! Lists, items and shares travel as plain JSON objects. Timestamps use
//! [`DATE_FORMAT`] (`2013-03-03T13:37:00+0000`). Converting a remote
//! payload into the domain model marks it `Synced`, since it reflects what
//! the server holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shoplist_core::domain::{
    DomainError, Email, ItemId, ListId, ListType, Share, ShareAccess, Shoppinglist,
    ShoppinglistItem, SyncState,
};

/// Timestamp format of the remote API
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(s, DATE_FORMAT).map(|d| d.with_timezone(&Utc))
}

mod api_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).map_err(serde::de::Error::custom)
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_count() -> u32 {
    1
}

// ============================================================================
// Shares
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireShareUser {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireShare {
    pub user: WireShareUser,
    pub access: String,
    #[serde(default)]
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_url: Option<String>,
}

impl From<&Share> for WireShare {
    fn from(share: &Share) -> Self {
        Self {
            user: WireShareUser {
                email: share.email().to_string(),
                name: share.name().map(str::to_string),
            },
            access: share.access().as_str().to_string(),
            accepted: share.accepted(),
            accept_url: share.accept_url().map(str::to_string),
        }
    }
}

impl WireShare {
    pub fn into_share(self, list_id: ListId) -> Result<Share, DomainError> {
        let email: Email = self.user.email.parse()?;
        let access: ShareAccess = self.access.parse()?;
        let mut share = Share::new(email, access, list_id)
            .with_accepted(self.accepted)
            .with_state(SyncState::Synced);
        if let Some(name) = self.user.name {
            share = share.with_name(name);
        }
        if let Some(url) = self.accept_url {
            share = share.with_accept_url(url);
        }
        Ok(share)
    }
}

// ============================================================================
// Lists
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireList {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ern: Option<String>,
    pub name: String,
    #[serde(with = "api_date")]
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub previous_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub list_type: Option<String>,
    #[serde(default = "empty_object")]
    pub meta: Value,
    #[serde(default)]
    pub shares: Vec<WireShare>,
}

impl From<&Shoppinglist> for WireList {
    fn from(list: &Shoppinglist) -> Self {
        Self {
            id: list.id().to_string(),
            ern: Some(list.ern().to_string()),
            name: list.name().to_string(),
            modified: list.modified(),
            previous_id: list.previous_id().map(|id| id.to_string()),
            list_type: Some(list.list_type().as_str().to_string()),
            meta: list.meta().clone(),
            shares: list
                .shares()
                .values()
                .filter(|share| !share.state().is_deleted())
                .map(WireShare::from)
                .collect(),
        }
    }
}

impl TryFrom<WireList> for Shoppinglist {
    type Error = DomainError;

    fn try_from(wire: WireList) -> Result<Self, Self::Error> {
        let id: ListId = wire.id.parse()?;
        let previous_id = wire
            .previous_id
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<ListId>())
            .transpose()?;
        let list_type = wire
            .list_type
            .map(|t| t.parse::<ListType>())
            .transpose()?
            .unwrap_or_default();

        let shares = wire
            .shares
            .into_iter()
            .map(|s| s.into_share(id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut list = Shoppinglist::from_parts(id, wire.name, wire.modified)
            .with_previous_id(previous_id)
            .with_list_type(list_type)
            .with_meta(wire.meta)
            .with_state(SyncState::Synced);
        list.set_shares(shares);
        Ok(list)
    }
}

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ern: Option<String>,
    pub description: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub tick: bool,
    #[serde(default)]
    pub offer_id: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(with = "api_date")]
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub previous_id: Option<String>,
    pub shopping_list_id: String,
    #[serde(default = "empty_object")]
    pub meta: Value,
}

impl From<&ShoppinglistItem> for WireItem {
    fn from(item: &ShoppinglistItem) -> Self {
        Self {
            id: item.id().to_string(),
            ern: Some(item.ern().to_string()),
            description: item.description().to_string(),
            count: item.count(),
            tick: item.tick(),
            offer_id: item.offer_id().map(str::to_string),
            creator: item.creator().map(str::to_string),
            modified: item.modified(),
            previous_id: item.previous_id().map(|id| id.to_string()),
            shopping_list_id: item.list_id().to_string(),
            meta: item.meta().clone(),
        }
    }
}

impl TryFrom<WireItem> for ShoppinglistItem {
    type Error = DomainError;

    fn try_from(wire: WireItem) -> Result<Self, Self::Error> {
        let id: ItemId = wire.id.parse()?;
        let list_id: ListId = wire.shopping_list_id.parse()?;
        let previous_id = wire
            .previous_id
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<ItemId>())
            .transpose()?;

        Ok(ShoppinglistItem::with_id(id, list_id, wire.description)
            .with_count(wire.count)
            .with_tick(wire.tick)
            .with_offer_id(wire.offer_id.filter(|s| !s.is_empty()))
            .with_creator(wire.creator)
            .with_modified(wire.modified)
            .with_previous_id(previous_id)
            .with_meta(wire.meta)
            .with_state(SyncState::Synced))
    }
}
