use std::fmt::Write;

use rand::{thread_rng, RngCore};

pub const SESSION_ID_PREFIX: &str = "session_";

/// Generates an unguessable session id: the `session_` prefix followed by 128 random bits, hex encoded.
///
/// `thread_rng` is a CSPRNG seeded from the operating system, so ids cannot be predicted from earlier ones.
pub fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    thread_rng().fill_bytes(&mut bytes);
    let mut id = String::with_capacity(SESSION_ID_PREFIX.len() + 2 * bytes.len());
    id.push_str(SESSION_ID_PREFIX);
    for b in bytes {
        let _ = write!(id, "{b:02x}");
    }
    id
}
