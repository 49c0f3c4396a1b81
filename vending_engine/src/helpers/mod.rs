mod keyed_lock;
mod tokens;

pub use keyed_lock::{KeyGuard, KeyedLock};
pub use tokens::{new_session_id, SESSION_ID_PREFIX};
