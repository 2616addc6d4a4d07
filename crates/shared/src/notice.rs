//! Leveled user notices with optional auto-dismiss.

use std::cell::Cell;
use std::rc::Rc;

use crate::models::Millis;
use crate::store::{Store, Subscription};
use crate::timing::Clock;

pub const INFO_DISMISS_MS: Millis = 5_000;
pub const SUCCESS_DISMISS_MS: Millis = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Error,
    Warning,
    Info,
    Success,
}

impl NoticeLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            NoticeLevel::Error => "notice-error",
            NoticeLevel::Warning => "notice-warning",
            NoticeLevel::Info => "notice-info",
            NoticeLevel::Success => "notice-success",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
    pub dismiss_at: Option<Millis>,
}

#[derive(Clone)]
pub struct NoticeQueue {
    store: Store<Vec<Notice>>,
    clock: Rc<dyn Clock>,
    next_id: Rc<Cell<u64>>,
}

impl NoticeQueue {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        NoticeQueue {
            store: Store::new(Vec::new()),
            clock,
            next_id: Rc::new(Cell::new(1)),
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.store.get()
    }

    pub fn subscribe(&self, listener: impl Fn(&Vec<Notice>) + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    /// Queue a notice; `ttl_ms` of `None` keeps it until dismissed.
    pub fn add(&self, level: NoticeLevel, message: impl Into<String>, ttl_ms: Option<Millis>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let now = self.clock.now_ms();
        let notice = Notice {
            id,
            level,
            message: message.into(),
            dismiss_at: ttl_ms.map(|ttl| now + ttl),
        };
        self.store.update(|list| list.push(notice));
        id
    }

    pub fn add_error(&self, message: impl Into<String>) -> u64 {
        self.add(NoticeLevel::Error, message, None)
    }

    pub fn add_warning(&self, message: impl Into<String>) -> u64 {
        self.add(NoticeLevel::Warning, message, None)
    }

    pub fn add_info(&self, message: impl Into<String>) -> u64 {
        self.add(NoticeLevel::Info, message, Some(INFO_DISMISS_MS))
    }

    pub fn add_success(&self, message: impl Into<String>) -> u64 {
        self.add(NoticeLevel::Success, message, Some(SUCCESS_DISMISS_MS))
    }

    pub fn remove(&self, id: u64) {
        if self.store.with(|list| list.iter().any(|n| n.id == id)) {
            self.store.update(|list| list.retain(|n| n.id != id));
        }
    }

    pub fn clear(&self) {
        self.store.set(Vec::new());
    }

    pub fn clear_level(&self, level: NoticeLevel) {
        self.store.update(|list| list.retain(|n| n.level != level));
    }

    /// Earliest pending auto-dismiss deadline.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.store
            .with(|list| list.iter().filter_map(|n| n.dismiss_at).min())
    }

    /// Drop notices whose deadline has passed; returns how many went.
    pub fn expire(&self, now: Millis) -> usize {
        let due = self.store.with(|list| {
            list.iter()
                .filter(|n| n.dismiss_at.is_some_and(|at| at <= now))
                .count()
        });
        if due > 0 {
            self.store
                .update(|list| list.retain(|n| !n.dismiss_at.is_some_and(|at| at <= now)));
        }
        due
    }
}
