//! Bounded in-memory history store (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

use super::Conversation;
use crate::config::HistoryConfig;
use crate::tools::ToolOutput;

struct Slot {
    conversation: Arc<Mutex<Conversation>>,
    last_touched: Instant,
    /// Monotonic use counter; orders slots for LRU eviction.
    tick: u64,
}

impl Slot {
    /// A slot whose conversation is locked by a running turn.
    fn in_use(&self) -> bool {
        self.conversation.try_lock().is_err()
    }
}

#[derive(Default)]
struct Slots {
    by_id: HashMap<String, Slot>,
    tick: u64,
}

/// Conversation histories keyed by client-supplied conversation id.
///
/// Holds at most `max_conversations` records. Creating one more evicts the
/// least recently used record that no turn is holding. Records idle for
/// longer than `ttl` are dropped by [`evict_expired`](Self::evict_expired).
///
/// Each conversation sits behind its own async mutex; a turn holds it via
/// [`lock`](Self::lock) from reading history to recording results, so turns
/// on the same conversation run one at a time.
#[derive(Clone)]
pub struct InMemoryHistoryStore {
    slots: Arc<Mutex<Slots>>,
    max_conversations: usize,
    ttl: Duration,
}

impl InMemoryHistoryStore {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots::default())),
            max_conversations: config.max_conversations.max(1),
            ttl: config.ttl,
        }
    }

    /// Touch an existing conversation.
    fn touch(slots: &mut Slots, id: &str) -> Option<Arc<Mutex<Conversation>>> {
        slots.tick += 1;
        let tick = slots.tick;
        let slot = slots.by_id.get_mut(id)?;
        slot.last_touched = Instant::now();
        slot.tick = tick;
        Some(Arc::clone(&slot.conversation))
    }

    /// Create a conversation, evicting the least recently used idle one when full.
    fn insert(&self, slots: &mut Slots, id: &str) -> Arc<Mutex<Conversation>> {
        if slots.by_id.len() >= self.max_conversations {
            let victim = slots
                .by_id
                .iter()
                .filter(|(_, slot)| !slot.in_use())
                .min_by_key(|(_, slot)| slot.tick)
                .map(|(id, _)| id.clone());
            if let Some(victim) = victim {
                slots.by_id.remove(&victim);
                tracing::debug!(conversation_id = %victim, "Evicted least recently used conversation");
            }
        }

        let conversation = Arc::new(Mutex::new(Conversation::default()));
        slots.by_id.insert(
            id.to_string(),
            Slot {
                conversation: Arc::clone(&conversation),
                last_touched: Instant::now(),
                tick: slots.tick,
            },
        );
        conversation
    }

    /// Exclusive access to a conversation for the length of one turn.
    ///
    /// The guard is taken under the map lock, so eviction never sees the slot
    /// idle between lookup and locking. A held lock passes straight to the
    /// next waiter on release.
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<Conversation> {
        let mut slots = self.slots.lock().await;
        let conversation = match Self::touch(&mut slots, id) {
            Some(conversation) => conversation,
            None => self.insert(&mut slots, id),
        };
        match Arc::clone(&conversation).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                drop(slots);
                conversation.lock_owned().await
            }
        }
    }

    pub async fn append(&self, id: &str, entry: String) {
        self.lock(id).await.append(entry);
    }

    pub async fn record(&self, id: &str, output: &ToolOutput) {
        self.lock(id).await.record(output);
    }

    /// Entries of a conversation, oldest first; empty when unseen.
    pub async fn get(&self, id: &str) -> Vec<String> {
        self.snapshot(id)
            .await
            .map(|conversation| conversation.entries().to_vec())
            .unwrap_or_default()
    }

    /// Copy of a conversation, if it exists.
    pub async fn snapshot(&self, id: &str) -> Option<Conversation> {
        let conversation = Self::touch(&mut *self.slots.lock().await, id)?;
        let snapshot = conversation.lock().await.clone();
        Some(snapshot)
    }

    /// Drop a conversation. Returns whether it existed.
    pub async fn evict(&self, id: &str) -> bool {
        self.slots.lock().await.by_id.remove(id).is_some()
    }

    /// Drop every idle conversation not touched within the TTL.
    pub async fn evict_expired(&self) -> usize {
        self.evict_idle_before(Instant::now()).await
    }

    async fn evict_idle_before(&self, now: Instant) -> usize {
        let mut slots = self.slots.lock().await;
        let before = slots.by_id.len();
        let ttl = self.ttl;
        slots
            .by_id
            .retain(|_, slot| slot.in_use() || now.saturating_duration_since(slot.last_touched) < ttl);
        before - slots.by_id.len()
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Periodically sweep expired conversations. A zero interval is raised
    /// to one second.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let interval = interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = store.evict_expired().await;
                if evicted > 0 {
                    tracing::info!(evicted, "Swept idle conversations");
                }
            }
        })
    }
}
