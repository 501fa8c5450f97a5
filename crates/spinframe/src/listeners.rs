//! Scoped listener bookkeeping.
//!
//! A [`Subscription`] stands for one attached document-level listener. It is released
//! either explicitly or when dropped, so a torn-down controller can never leave a
//! listener behind.

use crate::input::Channel;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;

/// Registry of the channels a host currently has to deliver events for.
#[derive(Debug, Clone, Default)]
pub struct Listeners {
    attached: Arc<Mutex<HashMap<Channel, usize>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, channel: Channel) -> Subscription {
        *self.attached.lock().entry(channel).or_insert(0) += 1;
        log::trace!("attached {channel} listener");
        Subscription {
            channel,
            listeners: self.clone(),
        }
    }

    pub fn is_attached(&self, channel: Channel) -> bool {
        self.attached
            .lock()
            .get(&channel)
            .is_some_and(|count| *count > 0)
    }

    /// Attached channels in declaration order.
    pub fn attached(&self) -> Vec<Channel> {
        Channel::iter().filter(|c| self.is_attached(*c)).collect()
    }

    fn detach(&self, channel: Channel) {
        let mut attached = self.attached.lock();
        if let Some(count) = attached.get_mut(&channel) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                attached.remove(&channel);
            }
        }
        log::trace!("detached {channel} listener");
    }
}

#[derive(Debug)]
pub struct Subscription {
    channel: Channel,
    listeners: Listeners,
}

impl Subscription {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.listeners.detach(self.channel);
    }
}
