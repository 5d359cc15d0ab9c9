
use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::symple::message::Message;

/// SDP session description carried in an `offer`/`answer` Symple message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: String,
    pub sdp: String,
}

/// ICE candidate carried in a `candidate` Symple message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u32>,
}

/// The trait boundary an external peer-connection implementation plugs
/// into. Per the distilled spec's explicit exclusion of "WebRTC
/// peer-connection bindings to an external media engine", this module
/// defines only the boundary and routes messages to it — it never
/// implements a peer connection itself.
#[async_trait]
pub trait PeerConnectionObserver: Send + Sync {
    async fn on_remote_offer(&self, from: &str, offer: SessionDescription);
    async fn on_remote_answer(&self, from: &str, answer: SessionDescription);
    async fn on_remote_candidate(&self, from: &str, candidate: IceCandidate);
}

/// Turns `{offer, answer, candidate}` Symple messages into calls against an
/// injected [`PeerConnectionObserver`].
pub struct SignalingGlue<O: PeerConnectionObserver> {
    observer: O,
}

impl<O: PeerConnectionObserver> SignalingGlue<O> {
    pub fn new(observer: O) -> Self {
        SignalingGlue { observer }
    }

    /// Dispatches one incoming Symple `event`/`message` to the observer,
    /// based on the `event`/`command` name embedded in its data payload
    /// (`offer`, `answer`, or `candidate`).
    pub async fn handle(&self, message: Message) -> Result<()> {
        let event = message
            .data
            .get("event")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::ErrSympleParse("signaling message missing event".to_owned()))?;

        match event {
            "offer" => {
                let offer = parse_description(&message)?;
                self.observer.on_remote_offer(&message.from, offer).await;
            }
            "answer" => {
                let answer = parse_description(&message)?;
                self.observer.on_remote_answer(&message.from, answer).await;
            }
            "candidate" => {
                let candidate = parse_candidate(&message)?;
                self.observer.on_remote_candidate(&message.from, candidate).await;
            }
            other => {
                return Err(Error::ErrSympleParse(format!("unrecognized signaling event {other}")));
            }
        }
        Ok(())
    }
}

fn parse_description(message: &Message) -> Result<SessionDescription> {
    let sdp_type = message
        .data
        .get("event")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned();
    let sdp = message
        .data
        .get("sdp")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::ErrSympleParse("offer/answer missing sdp".to_owned()))?
        .to_owned();
    Ok(SessionDescription { sdp_type, sdp })
}

fn parse_candidate(message: &Message) -> Result<IceCandidate> {
    let candidate = message
        .data
        .get("candidate")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::ErrSympleParse("candidate message missing candidate".to_owned()))?
        .to_owned();
    let sdp_mid = message
        .data
        .get("sdpMid")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    let sdp_m_line_index = message
        .data
        .get("sdpMLineIndex")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32);
    Ok(IceCandidate {
        candidate,
        sdp_mid,
        sdp_m_line_index,
    })
}
