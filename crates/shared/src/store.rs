//! Minimal observable value.
//!
//! `Store<T>` is a cheap handle (`Clone` shares the value). Writers call
//! `set`/`update`; every subscriber is called with the new value after the
//! write completes, outside any borrow, so listeners may read or write stores
//! themselves.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;

struct Inner<T> {
    value: RefCell<T>,
    listeners: RefCell<Vec<(u64, Listener<T>)>>,
    next_id: Cell<u64>,
}

pub struct Store<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Store {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Store<T> {
    pub fn new(value: T) -> Self {
        Store {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.notify();
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.notify();
    }

    /// Register `listener`; it is not called for the current value.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let weak: Weak<Inner<T>> = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn notify(&self) {
        let snapshot = self.get();
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// Handle returned by [`Store::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_update() {
        let s = Store::new(1);
        s.set(2);
        assert_eq!(s.get(), 2);
        s.update(|v| *v += 3);
        assert_eq!(s.get(), 5);
        assert_eq!(s.with(|v| *v * 2), 10);
    }

    #[test]
    fn test_subscribers_see_new_value() {
        let s = Store::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = s.subscribe(move |v| sink.borrow_mut().push(*v));
        s.set(1);
        s.update(|v| *v = 7);
        assert_eq!(*seen.borrow(), vec![1, 7]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let s = Store::new(0);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = s.subscribe(move |_| h.set(h.get() + 1));
        s.set(1);
        drop(sub);
        s.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(s.subscriber_count(), 0);
    }

    #[test]
    fn test_explicit_unsubscribe_leaves_others() {
        let s = Store::new(0);
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));
        let (ca, cb) = (Rc::clone(&a), Rc::clone(&b));
        let sub_a = s.subscribe(move |_| ca.set(ca.get() + 1));
        let _sub_b = s.subscribe(move |_| cb.set(cb.get() + 1));
        sub_a.unsubscribe();
        s.set(1);
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn test_listener_may_write_other_store() {
        let source = Store::new(1);
        let mirror = Store::new(0);
        let m = mirror.clone();
        let _sub = source.subscribe(move |v| m.set(*v * 10));
        source.set(4);
        assert_eq!(mirror.get(), 40);
    }

    #[test]
    fn test_listener_may_read_own_store() {
        let s = Store::new(String::from("a"));
        let reader = s.clone();
        let seen = Rc::new(RefCell::new(String::new()));
        let sink = Rc::clone(&seen);
        let _sub = s.subscribe(move |_| *sink.borrow_mut() = reader.get());
        s.set("b".into());
        assert_eq!(*seen.borrow(), "b");
    }

    #[test]
    fn test_subscription_outliving_store_is_harmless() {
        let s = Store::new(0);
        let sub = s.subscribe(|_| {});
        drop(s);
        drop(sub);
    }
}
