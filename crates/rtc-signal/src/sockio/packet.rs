use crate::error::{Error, Result};

/// Socket.IO protocol revision 1 packet types: a single leading digit per
/// the external interfaces section ("packets are typed by a single leading
/// digit followed by `::` and payload").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Disconnect,
    Connect,
    Heartbeat,
    Message,
    JsonMessage,
    Event,
    Ack,
    Error,
    Noop,
}

impl PacketKind {
    fn from_digit(d: u8) -> Result<Self> {
        Ok(match d {
            0 => PacketKind::Disconnect,
            1 => PacketKind::Connect,
            2 => PacketKind::Heartbeat,
            3 => PacketKind::Message,
            4 => PacketKind::JsonMessage,
            5 => PacketKind::Event,
            6 => PacketKind::Ack,
            7 => PacketKind::Error,
            8 => PacketKind::Noop,
            other => return Err(Error::ErrSockIoParse(format!("unknown packet type {other}"))),
        })
    }

    fn to_digit(self) -> u8 {
        match self {
            PacketKind::Disconnect => 0,
            PacketKind::Connect => 1,
            PacketKind::Heartbeat => 2,
            PacketKind::Message => 3,
            PacketKind::JsonMessage => 4,
            PacketKind::Event => 5,
            PacketKind::Ack => 6,
            PacketKind::Error => 7,
            PacketKind::Noop => 8,
        }
    }
}

/// One Socket.IO envelope: `type:id:endpoint:data`. `id` is only present
/// for packets participating in an ack transaction (an `Event`/`Message`
/// the sender wants acked, or the matching `Ack`); `endpoint` addresses a
/// namespace and is empty for the default namespace.
#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    pub id: Option<u64>,
    pub endpoint: String,
    pub data: Option<String>,
}

impl Packet {
    pub fn connect(endpoint: impl Into<String>) -> Self {
        Packet {
            kind: PacketKind::Connect,
            id: None,
            endpoint: endpoint.into(),
            data: None,
        }
    }

    pub fn heartbeat() -> Self {
        Packet {
            kind: PacketKind::Heartbeat,
            id: None,
            endpoint: String::new(),
            data: None,
        }
    }

    /// A fire-and-forget `Event` packet (no ack requested), used for
    /// broadcasts such as a Symple presence probe.
    pub fn event(name: &str, args: serde_json::Value) -> Self {
        let data = serde_json::json!({ "name": name, "args": [args] });
        Packet {
            kind: PacketKind::Event,
            id: None,
            endpoint: String::new(),
            data: Some(data.to_string()),
        }
    }

    /// An `Event` packet requesting an ack, i.e. one side of a
    /// [`crate::sockio::transaction::Transaction`].
    pub fn event_with_ack(id: u64, name: &str, args: serde_json::Value) -> Self {
        let data = serde_json::json!({ "name": name, "args": [args] });
        Packet {
            kind: PacketKind::Event,
            id: Some(id),
            endpoint: String::new(),
            data: Some(data.to_string()),
        }
    }

    pub fn ack(id: u64, data: serde_json::Value) -> Self {
        Packet {
            kind: PacketKind::Ack,
            id: Some(id),
            endpoint: String::new(),
            data: Some(format!("{}+{}", id, data)),
        }
    }

    /// Parses the ack id and payload out of an `Ack` packet's `data` field
    /// (`"<id>+<json>"`), as a server-originated ack response would carry.
    pub fn ack_payload(&self) -> Result<(u64, serde_json::Value)> {
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| Error::ErrSockIoParse("ack packet missing data".to_owned()))?;
        let (id_str, json_str) = data
            .split_once('+')
            .ok_or_else(|| Error::ErrSockIoParse("malformed ack payload".to_owned()))?;
        let id: u64 = id_str
            .parse()
            .map_err(|_| Error::ErrSockIoParse("malformed ack id".to_owned()))?;
        let value = serde_json::from_str(json_str)?;
        Ok((id, value))
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.kind.to_digit().to_string());
        out.push(':');
        if let Some(id) = self.id {
            out.push_str(&id.to_string());
        }
        out.push(':');
        out.push_str(&self.endpoint);
        out.push(':');
        if let Some(data) = &self.data {
            out.push_str(data);
        }
        out
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(4, ':');
        let kind_str = parts
            .next()
            .ok_or_else(|| Error::ErrSockIoParse("empty packet".to_owned()))?;
        let kind_digit: u8 = kind_str
            .parse()
            .map_err(|_| Error::ErrSockIoParse(format!("non-numeric type {kind_str}")))?;
        let kind = PacketKind::from_digit(kind_digit)?;
        let id = parts.next().filter(|s| !s.is_empty()).and_then(|s| s.parse().ok());
        let endpoint = parts.next().unwrap_or("").to_owned();
        let data = parts.next().filter(|s| !s.is_empty()).map(str::to_owned);

        Ok(Packet { kind, id, endpoint, data })
    }
}

#[cfg(test)]
mod packet_test {
    use super::*;

    #[test]
    fn test_round_trips_a_connect_packet() {
        let packet = Packet::connect("");
        let encoded = packet.encode();
        assert_eq!(encoded, "1:::");
        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(decoded.kind, PacketKind::Connect);
    }

    #[test]
    fn test_round_trips_an_ack_with_json_payload() {
        let packet = Packet::ack(3, serde_json::json!({"ok": true}));
        let encoded = packet.encode();
        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(decoded.kind, PacketKind::Ack);
        let (id, value) = decoded.ack_payload().unwrap();
        assert_eq!(id, 3);
        assert_eq!(value, serde_json::json!({"ok": true}));
    }

    #[test]
    fn test_decode_rejects_unknown_type_digit() {
        assert!(Packet::decode("9:::").is_err());
    }

    #[test]
    fn test_heartbeat_round_trips() {
        let encoded = Packet::heartbeat().encode();
        assert_eq!(encoded, "2:::");
        assert_eq!(Packet::decode(&encoded).unwrap().kind, PacketKind::Heartbeat);
    }
}
