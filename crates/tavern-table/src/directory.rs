//! Message id → session lookup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tavern_protocol::{MessageId, SessionId};

/// Resolves a globally unique message id to the session that owns it.
///
/// Shared between the registry and every session actor. Actors record
/// messages as they append them and forget them on delete; the lock is
/// held for one map operation only.
#[derive(Debug, Clone, Default)]
pub struct MessageDirectory {
    entries: Arc<RwLock<HashMap<MessageId, SessionId>>>,
}

impl MessageDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message_id: MessageId, session_id: SessionId) {
        self.entries.write().insert(message_id, session_id);
    }

    pub fn forget(&self, message_id: MessageId) {
        self.entries.write().remove(&message_id);
    }

    /// Forgets every message of `session_id`.
    pub fn forget_session(&self, session_id: SessionId) {
        self.entries.write().retain(|_, sid| *sid != session_id);
    }

    pub fn lookup(&self, message_id: MessageId) -> Option<SessionId> {
        self.entries.read().get(&message_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_lookup() {
        let dir = MessageDirectory::new();
        dir.record(MessageId(1), SessionId(10));
        assert_eq!(dir.lookup(MessageId(1)), Some(SessionId(10)));
        assert_eq!(dir.lookup(MessageId(2)), None);
    }

    #[test]
    fn test_forget_session_keeps_other_sessions() {
        let dir = MessageDirectory::new();
        dir.record(MessageId(1), SessionId(10));
        dir.record(MessageId(2), SessionId(10));
        dir.record(MessageId(3), SessionId(20));
        dir.forget_session(SessionId(10));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.lookup(MessageId(3)), Some(SessionId(20)));
    }

    #[test]
    fn test_clones_share_entries() {
        let dir = MessageDirectory::new();
        let other = dir.clone();
        other.record(MessageId(5), SessionId(1));
        assert_eq!(dir.lookup(MessageId(5)), Some(SessionId(1)));
        dir.forget(MessageId(5));
        assert!(other.is_empty());
    }
}
