//! In-process queue with visibility timeout and dead-lettering.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::warn;

use crate::error::QueueResult;
use crate::queue::{DeadLetter, DeadLetterSink, Delivery, MessageQueue};

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    body: String,
    receive_count: u32,
}

#[derive(Default)]
struct State {
    next_id: u64,
    ready: VecDeque<Entry>,
    in_flight: HashMap<String, (Entry, Instant)>,
    dead: Vec<DeadLetter>,
}

impl State {
    /// Return expired in-flight messages to the ready queue, in id order.
    fn expire(&mut self, now: Instant) {
        let mut expired: Vec<Entry> = self
            .in_flight
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(_, (entry, _))| entry.clone())
            .collect();
        if expired.is_empty() {
            return;
        }
        expired.sort_by_key(|e| sequence(&e.id));
        for entry in expired.into_iter().rev() {
            self.in_flight.remove(&entry.id);
            self.ready.push_front(entry);
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.values().map(|(_, deadline)| *deadline).min()
    }
}

fn sequence(id: &str) -> u64 {
    id.rsplit('-').next().and_then(|n| n.parse().ok()).unwrap_or(0)
}

pub struct MemoryQueue {
    visibility_timeout: Duration,
    max_receives: u32,
    state: Mutex<State>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration, max_receives: u32) -> Self {
        Self {
            visibility_timeout,
            max_receives: max_receives.max(1),
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    /// Messages waiting or in flight.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.ready.len() + state.in_flight.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn try_take(&self, state: &mut State, now: Instant) -> Option<Delivery> {
        state.expire(now);
        while let Some(mut entry) = state.ready.pop_front() {
            entry.receive_count += 1;
            if entry.receive_count > self.max_receives {
                warn!(
                    message_id = %entry.id,
                    receives = entry.receive_count - 1,
                    "Message exceeded receive budget, dead-lettering"
                );
                state.dead.push(DeadLetter {
                    id: format!("dlq-{}", entry.id),
                    body: entry.body,
                    receive_count: entry.receive_count - 1,
                    dead_lettered_at: Utc::now(),
                });
                continue;
            }
            let delivery = Delivery {
                id: entry.id.clone(),
                body: entry.body.clone(),
                receive_count: entry.receive_count,
            };
            state
                .in_flight
                .insert(entry.id.clone(), (entry, now + self.visibility_timeout));
            return Some(delivery);
        }
        None
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn receive(&self, wait: Duration) -> QueueResult<Option<Delivery>> {
        let give_up = Instant::now() + wait;
        loop {
            let notified = self.notify.notified();
            let wake_at = {
                let mut state = self.state.lock().await;
                if let Some(delivery) = self.try_take(&mut state, Instant::now()) {
                    return Ok(Some(delivery));
                }
                state
                    .next_deadline()
                    .map_or(give_up, |deadline| deadline.min(give_up))
            };

            if Instant::now() >= give_up {
                return Ok(None);
            }
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        if state.in_flight.remove(&delivery.id).is_none() {
            state.ready.retain(|e| e.id != delivery.id);
        }
        Ok(())
    }

    async fn send(&self, body: &str) -> QueueResult<String> {
        let id = {
            let mut state = self.state.lock().await;
            state.next_id += 1;
            let id = format!("mem-{}", state.next_id);
            state.ready.push_back(Entry {
                id: id.clone(),
                body: body.to_string(),
                receive_count: 0,
            });
            id
        };
        self.notify.notify_one();
        Ok(id)
    }
}

#[async_trait]
impl DeadLetterSink for MemoryQueue {
    async fn dead_letters(&self, limit: usize) -> QueueResult<Vec<DeadLetter>> {
        let state = self.state.lock().await;
        Ok(state.dead.iter().take(limit).cloned().collect())
    }

    async fn remove_dead_letter(&self, id: &str) -> QueueResult<()> {
        self.state.lock().await.dead.retain(|d| d.id != id);
        Ok(())
    }
}
