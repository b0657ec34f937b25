//! # Relay Witness Adapter
//!
//! Nostr backend over a websocket relay. A witness is a kind-1 text note whose
//! content is the commitment; the external reference is the event id.
//!
//! ## Verify
//!
//! Subscribe with `{"ids": [id]}`. `EOSE` before any `EVENT` means the relay
//! does not know the event. A returned event must carry a valid id and
//! BIP-340 signature, the expected content and, when known, the expected
//! `created_at`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::schnorr::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::NostrConfig;
use crate::domain::{
    BackendKind, VerificationOutcome, WitnessError, WitnessNetwork, WitnessReceipt,
};
use crate::ports::WitnessBackend;

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Kind of a short text note.
const TEXT_NOTE: u64 = 1;

// =============================================================================
// EVENTS AND MESSAGES
// =============================================================================

/// A signed relay event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NostrEvent {
    /// Hex SHA-256 of the serialized event.
    pub id: String,
    /// Hex x-only public key.
    pub pubkey: String,
    /// Unix seconds.
    pub created_at: i64,
    /// Event kind.
    pub kind: u64,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    /// Content.
    pub content: String,
    /// Hex BIP-340 signature over `id`.
    pub sig: String,
}

impl NostrEvent {
    /// Build and sign a text note carrying `content`.
    pub fn sign_text_note(
        key: &SigningKey,
        content: &str,
        created_at: i64,
    ) -> Result<Self, WitnessError> {
        let pubkey = hex::encode(key.verifying_key().to_bytes());
        let id = compute_event_id(&pubkey, created_at, TEXT_NOTE, &[], content);
        let id_bytes = hex::decode(&id).map_err(|e| WitnessError::Signing(e.to_string()))?;
        let sig: Signature = key
            .sign_prehash(&id_bytes)
            .map_err(|e| WitnessError::Signing(e.to_string()))?;

        Ok(Self {
            id,
            pubkey,
            created_at,
            kind: TEXT_NOTE,
            tags: Vec::new(),
            content: content.to_string(),
            sig: hex::encode(sig.to_bytes()),
        })
    }

    /// Whether the id matches the contents and the signature matches the id.
    pub fn is_authentic(&self) -> bool {
        let expected = compute_event_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        );
        if expected != self.id {
            return false;
        }

        let (Ok(id), Ok(pubkey), Ok(sig)) = (
            hex::decode(&self.id),
            hex::decode(&self.pubkey),
            hex::decode(&self.sig),
        ) else {
            return false;
        };
        let (Ok(key), Ok(sig)) = (
            VerifyingKey::from_bytes(&pubkey),
            Signature::try_from(sig.as_slice()),
        ) else {
            return false;
        };
        key.verify_prehash(&id, &sig).is_ok()
    }
}

/// Event id: hex SHA-256 of `[0, pubkey, created_at, kind, tags, content]`.
pub fn compute_event_id(
    pubkey: &str,
    created_at: i64,
    kind: u64,
    tags: &[Vec<String>],
    content: &str,
) -> String {
    let serialized = json!([0, pubkey, created_at, kind, tags, content]).to_string();
    hex::encode(Sha256::digest(serialized.as_bytes()))
}

/// A message received from a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// An event matching a subscription.
    Event {
        /// Subscription id.
        subscription: String,
        /// The event.
        event: NostrEvent,
    },
    /// Acknowledgement of a published event.
    Ok {
        /// Event id.
        event_id: String,
        /// Whether the relay stored it.
        accepted: bool,
        /// Relay message.
        message: String,
    },
    /// End of stored events for a subscription.
    EndOfStoredEvents(String),
    /// Subscription closed by the relay.
    Closed(String),
    /// Human readable notice.
    Notice(String),
}

/// Parse a relay text frame. Unknown frames yield `None`.
pub fn parse_relay_message(text: &str) -> Option<RelayMessage> {
    let frame: Vec<Value> = serde_json::from_str(text).ok()?;
    let text_at = |i: usize| frame.get(i).and_then(Value::as_str).map(str::to_string);

    match frame.first()?.as_str()? {
        "EVENT" => Some(RelayMessage::Event {
            subscription: text_at(1)?,
            event: serde_json::from_value(frame.get(2)?.clone()).ok()?,
        }),
        "OK" => Some(RelayMessage::Ok {
            event_id: text_at(1)?,
            accepted: frame.get(2)?.as_bool()?,
            message: text_at(3).unwrap_or_default(),
        }),
        "EOSE" => Some(RelayMessage::EndOfStoredEvents(text_at(1)?)),
        "CLOSED" => Some(RelayMessage::Closed(text_at(2).unwrap_or_default())),
        "NOTICE" => Some(RelayMessage::Notice(text_at(1)?)),
        _ => None,
    }
}

/// Compare a fetched event to the expected commitment.
pub fn check_event(
    event: &NostrEvent,
    reference: &str,
    expected_commitment: &str,
    expected_timestamp: Option<i64>,
) -> VerificationOutcome {
    if event.id != reference || !event.is_authentic() {
        return VerificationOutcome::Mismatch;
    }
    if event.content != expected_commitment {
        return VerificationOutcome::Mismatch;
    }
    if expected_timestamp.is_some_and(|ts| ts != event.created_at) {
        return VerificationOutcome::Mismatch;
    }
    VerificationOutcome::Match
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Nostr witness backend.
pub struct NostrWitness {
    config: NostrConfig,
}

impl NostrWitness {
    /// Create a backend from configuration.
    pub fn new(config: NostrConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.confirm_timeout_ms)
    }

    async fn connect(&self) -> Result<RelaySocket, WitnessError> {
        let url = self.config.relay_url.as_str();
        let (socket, _) = tokio::time::timeout(self.timeout(), connect_async(url))
            .await
            .map_err(|_| WitnessError::Unreachable(format!("Connecting to {url} timed out")))??;
        debug!(relay = %self.config.relay_url, "[aqua] Connected to relay");
        Ok(socket)
    }

    async fn send(socket: &mut RelaySocket, frame: Value) -> Result<(), WitnessError> {
        socket.send(Message::Text(frame.to_string().into())).await?;
        Ok(())
    }

    /// Read frames until `done` yields a result, bounded by the confirm timeout.
    async fn await_frame<T, F>(&self, socket: &mut RelaySocket, done: F) -> Result<T, WitnessError>
    where
        F: FnMut(RelayMessage) -> Option<Result<T, WitnessError>>,
    {
        tokio::time::timeout(self.timeout(), read_until(socket, done))
            .await
            .map_err(|_| WitnessError::Timeout(format!("No answer from {}", self.config.relay_url)))?
    }

    /// Fetch an event by id. `None` when the relay has no such event.
    async fn fetch(
        &self,
        socket: &mut RelaySocket,
        event_id: &str,
    ) -> Result<Option<NostrEvent>, WitnessError> {
        let subscription = format!("aqua-{:016x}", rand::random::<u64>());
        Self::send(socket, json!(["REQ", subscription, {"ids": [event_id]}])).await?;

        let found = self
            .await_frame(socket, |msg| match msg {
                RelayMessage::Event { subscription: sub, event } if sub == subscription => {
                    Some(Ok(Some(event)))
                }
                RelayMessage::EndOfStoredEvents(sub) if sub == subscription => Some(Ok(None)),
                RelayMessage::Closed(reason) => Some(Err(WitnessError::Rpc(reason))),
                _ => None,
            })
            .await;

        if let Err(e) = Self::send(socket, json!(["CLOSE", subscription])).await {
            debug!(%subscription, error = %e, "[aqua] Closing relay subscription failed");
        }
        found
    }
}

async fn read_until<T, F>(socket: &mut RelaySocket, mut done: F) -> Result<T, WitnessError>
where
    F: FnMut(RelayMessage) -> Option<Result<T, WitnessError>>,
{
    while let Some(msg) = socket.next().await {
        match msg? {
            Message::Text(text) => {
                let Some(parsed) = parse_relay_message(&text) else {
                    continue;
                };
                if let RelayMessage::Notice(notice) = &parsed {
                    debug!(%notice, "[aqua] Relay notice");
                    continue;
                }
                if let Some(result) = done(parsed) {
                    return result;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(WitnessError::Unreachable("Relay closed the connection".into()))
}

#[async_trait]
impl WitnessBackend for NostrWitness {
    fn kind(&self) -> BackendKind {
        BackendKind::Relay
    }

    async fn witness(
        &self,
        _network: WitnessNetwork,
        event_hash: &str,
    ) -> Result<WitnessReceipt, WitnessError> {
        let secret = self
            .config
            .secret_key
            .as_deref()
            .ok_or_else(|| WitnessError::MissingCredentials("nostr.secret_key".into()))?;
        let secret = hex::decode(secret).map_err(|e| WitnessError::Signing(e.to_string()))?;
        let key = SigningKey::from_bytes(&secret).map_err(|e| WitnessError::Signing(e.to_string()))?;

        let event = NostrEvent::sign_text_note(&key, event_hash, chrono::Utc::now().timestamp())?;
        let mut socket = self.connect().await?;

        Self::send(&mut socket, json!(["EVENT", event])).await?;
        self.await_frame(&mut socket, |msg| match msg {
            RelayMessage::Ok { event_id, accepted, message } if event_id == event.id => {
                Some(if accepted {
                    Ok(())
                } else {
                    Err(WitnessError::Rpc(format!("Relay rejected event: {message}")))
                })
            }
            _ => None,
        })
        .await?;

        if self.fetch(&mut socket, &event.id).await?.is_none() {
            return Err(WitnessError::Protocol(format!(
                "Relay accepted {} but does not return it",
                event.id
            )));
        }
        let _ = socket.close(None).await;

        info!(event = %event.id, relay = %self.config.relay_url, "[aqua] Witness event published");
        Ok(WitnessReceipt {
            reference: event.id,
            account: Some(event.pubkey),
            timestamp: Some(event.created_at),
        })
    }

    async fn verify(
        &self,
        _network: WitnessNetwork,
        reference: &str,
        expected_commitment: &str,
        expected_timestamp: Option<i64>,
    ) -> Result<VerificationOutcome, WitnessError> {
        let mut socket = self.connect().await?;
        let fetched = self.fetch(&mut socket, reference).await;
        let _ = socket.close(None).await;

        match fetched {
            Ok(Some(event)) => Ok(check_event(&event, reference, expected_commitment, expected_timestamp)),
            Ok(None) => Ok(VerificationOutcome::NotFound),
            Err(e) => {
                warn!(event = %reference, error = %e, "[aqua] Relay lookup failed");
                Err(e)
            }
        }
    }
}
