use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The four Symple message kinds layered on top of Socket.IO events, per
/// 4.9 and the data model's "Symple/Socket.IO Packet" entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Message,
    Event,
    Presence,
    Command,
}

/// A Symple envelope: `{type, id, from, to, data}`. `from`/`to` are
/// `"user|name|id[/resource]"` identifiers per the external interfaces
/// section; responses set `to` to the original message's `from`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<bool>,
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn presence(from: impl Into<String>, probe: bool) -> Self {
        Message {
            kind: MessageKind::Presence,
            id: None,
            from: from.into(),
            to: None,
            probe: Some(probe),
            data: serde_json::Map::new(),
        }
    }

    /// Builds a response addressed back to `self.from`, per 4.9 ("responses
    /// set `to` to the original `from`").
    pub fn reply_to(&self, kind: MessageKind) -> Message {
        Message {
            kind,
            id: self.id.clone(),
            from: String::new(),
            to: Some(self.from.clone()),
            probe: None,
            data: serde_json::Map::new(),
        }
    }

    pub fn is_probe(&self) -> bool {
        self.probe.unwrap_or(false)
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(Error::from)
    }
}

/// Parses the `user|name|id[/resource]` identifier format used in `from`/
/// `to` fields. `resource` is the optional `/…` suffix (e.g. a device or
/// tab identifier); not every peer id carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerId {
    pub user: String,
    pub name: String,
    pub id: String,
    pub resource: Option<String>,
}

impl PeerId {
    pub fn parse(raw: &str) -> Result<Self> {
        let (base, resource) = match raw.split_once('/') {
            Some((b, r)) => (b, Some(r.to_owned())),
            None => (raw, None),
        };
        let mut parts = base.splitn(3, '|');
        let user = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::ErrSympleParse(format!("malformed peer id {raw}")))?
            .to_owned();
        let name = parts.next().unwrap_or_default().to_owned();
        let id = parts.next().unwrap_or_default().to_owned();
        Ok(PeerId { user, name, id, resource })
    }

    pub fn to_string_id(&self) -> String {
        let base = format!("{}|{}|{}", self.user, self.name, self.id);
        match &self.resource {
            Some(r) => format!("{base}/{r}"),
            None => base,
        }
    }
}
