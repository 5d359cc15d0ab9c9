use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::RngCore;
use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};

/// The fixed GUID RFC 6455 Section 1.3 concatenates with the client's
/// `Sec-WebSocket-Key` before hashing.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Generates a fresh, random `Sec-WebSocket-Key` for a client handshake
/// request: 16 random bytes, base64-encoded.
pub fn generate_key() -> String {
    let mut key = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut key);
    BASE64_STANDARD.encode(key)
}

/// Computes the `Sec-WebSocket-Accept` value a server (or a client
/// verifying the server's response) derives from a `Sec-WebSocket-Key`:
/// `base64(sha1(key + GUID))`.
pub fn accept_key(key: &str) -> String {
    let mut input = String::with_capacity(key.len() + WS_GUID.len());
    input.push_str(key);
    input.push_str(WS_GUID);
    let hash = digest(&SHA1_FOR_LEGACY_USE_ONLY, input.as_bytes());
    BASE64_STANDARD.encode(hash.as_ref())
}

/// Verifies a server's `Sec-WebSocket-Accept` header value against the key
/// the client sent.
pub fn verify_accept(key: &str, accept: &str) -> bool {
    accept_key(key) == accept
}
