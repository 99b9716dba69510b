use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;

pub type WsSender = mpsc::UnboundedSender<String>;

struct ConnectionEntry {
    conn_id: u64,
    tx: WsSender,
}

struct RoomMember {
    conn_id: u64,
    tx: WsSender,
}

/// Process-wide relay state: who is online, and which connections are
/// watching which conversation. One live connection per user — a newer
/// registration overwrites the older one (last-writer-wins), and stale
/// disconnects are ignored via the connection id guard.
#[derive(Clone)]
pub struct ChatHub {
    connections: Arc<DashMap<i32, ConnectionEntry>>,
    rooms: Arc<DashMap<i32, Vec<RoomMember>>>,
    next_conn_id: Arc<AtomicU64>,
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHub {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            rooms: Arc::new(DashMap::new()),
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a user's connection, superseding any previous one.
    pub fn register(&self, user_id: i32) -> (u64, mpsc::UnboundedReceiver<String>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .insert(user_id, ConnectionEntry { conn_id, tx });
        (conn_id, rx)
    }

    /// Remove the registry entry and all room memberships of a connection.
    /// A disconnect of a superseded connection must not evict its successor.
    pub fn disconnect(&self, user_id: i32, conn_id: u64) {
        self.connections
            .remove_if(&user_id, |_, entry| entry.conn_id == conn_id);

        self.rooms.retain(|_, members| {
            members.retain(|m| m.conn_id != conn_id);
            !members.is_empty()
        });
    }

    /// Join a conversation's broadcast group. Re-joining moves the
    /// connection rather than duplicating it.
    pub fn join_room(&self, conversation_id: i32, user_id: i32) {
        let Some(entry) = self.connections.get(&user_id) else {
            return;
        };
        let member = RoomMember {
            conn_id: entry.conn_id,
            tx: entry.tx.clone(),
        };
        drop(entry);

        let mut members = self.rooms.entry(conversation_id).or_default();
        members.retain(|m| m.conn_id != member.conn_id);
        members.push(member);
    }

    /// Fan a payload out to every room member except the origin connection.
    /// Closed channels are pruned on the way.
    pub fn broadcast_to_room(&self, conversation_id: i32, origin_conn_id: u64, payload: &str) {
        if let Some(mut members) = self.rooms.get_mut(&conversation_id) {
            members.retain(|m| {
                if m.conn_id == origin_conn_id {
                    return true;
                }
                m.tx.send(payload.to_string()).is_ok()
            });
            if members.is_empty() {
                drop(members);
                self.rooms.remove(&conversation_id);
            }
        }
    }

    pub fn is_room_member(&self, conversation_id: i32, conn_id: u64) -> bool {
        self.rooms
            .get(&conversation_id)
            .is_some_and(|members| members.iter().any(|m| m.conn_id == conn_id))
    }

    pub fn is_online(&self, user_id: i32) -> bool {
        self.connections.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_registration_supersedes_older() {
        let hub = ChatHub::new();
        let (old_conn, mut old_rx) = hub.register(1);
        let (new_conn, mut new_rx) = hub.register(1);
        assert_ne!(old_conn, new_conn);

        hub.join_room(42, 1);
        hub.broadcast_to_room(42, 0, "hello");

        assert_eq!(new_rx.try_recv().unwrap(), "hello");
        assert!(old_rx.try_recv().is_err());
    }

    #[test]
    fn stale_disconnect_keeps_newer_entry() {
        let hub = ChatHub::new();
        let (old_conn, _old_rx) = hub.register(1);
        let (_new_conn, _new_rx) = hub.register(1);

        hub.disconnect(1, old_conn);
        assert!(hub.is_online(1));
    }

    #[test]
    fn broadcast_skips_origin() {
        let hub = ChatHub::new();
        let (sender_conn, mut sender_rx) = hub.register(1);
        let (_receiver_conn, mut receiver_rx) = hub.register(2);

        hub.join_room(7, 1);
        hub.join_room(7, 2);
        hub.broadcast_to_room(7, sender_conn, "msg");

        assert!(sender_rx.try_recv().is_err());
        assert_eq!(receiver_rx.try_recv().unwrap(), "msg");
    }

    #[test]
    fn disconnect_leaves_all_rooms() {
        let hub = ChatHub::new();
        let (conn, _rx) = hub.register(1);
        let (_conn2, mut rx2) = hub.register(2);

        hub.join_room(7, 1);
        hub.join_room(8, 1);
        hub.join_room(7, 2);
        hub.disconnect(1, conn);

        assert!(!hub.is_online(1));
        hub.broadcast_to_room(7, 0, "still here");
        assert_eq!(rx2.try_recv().unwrap(), "still here");
    }

    #[test]
    fn rejoining_does_not_duplicate_membership() {
        let hub = ChatHub::new();
        let (_conn1, _rx1) = hub.register(1);
        let (_conn2, mut rx2) = hub.register(2);

        hub.join_room(7, 2);
        hub.join_room(7, 2);
        hub.broadcast_to_room(7, 0, "once");

        assert_eq!(rx2.try_recv().unwrap(), "once");
        assert!(rx2.try_recv().is_err());
    }
}
