//! In-memory object storage with versioned writes and synchronous
//! watch broadcast.

mod event;


pub use event::*;

use crate::clock::ResourceVersionClock;
use crate::error::{Error, Result};
use crate::meta::{self, GroupResource, NamespacedName};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// Filters applied to one watch subscription.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Only deliver events for objects in this namespace.
    pub namespace: Option<String>,
}

/// Callback invoked for each delivered event, on the writer's thread.
/// Returning an error cancels the subscription.
pub type WatchCallback = Box<dyn FnMut(&WatchEvent) -> Result<()> + Send>;

/// Hook invoked for every committed write, after subscriber delivery.
pub type OnWatchEvent = Box<dyn Fn(&WatchEvent) + Send + Sync>;

/// A write hook shared across stores; each store it is attached to
/// holds its own boxed handle onto it.
pub type SharedWatchHook = Arc<dyn Fn(&WatchEvent) + Send + Sync>;

struct Subscriber {
    namespace: Option<String>,
    callback: WatchCallback,
    errors: mpsc::Sender<Error>,
}

impl Subscriber {
    fn wants(&self, event: &WatchEvent) -> bool {
        match &self.namespace {
            Some(ns) => event.namespace() == ns,
            None => true,
        }
    }
}

struct StoreInner {
    objects: BTreeMap<NamespacedName, Arc<Value>>,
    subscribers: Vec<Option<Subscriber>>,
    observers: Vec<OnWatchEvent>,
}

/// Storage for one resource (shared by all API versions that map to
/// it).
///
/// A single mutex guards the object map, the subscriber slots and the
/// version read for list snapshots, so every committed write reaches
/// every subscriber in commit order before the next write can start.
/// Delivery runs on the writer's stack; a slow subscriber blocks
/// writers (backpressure by blocking). Callbacks and observers must
/// not call back into their own store.
pub struct ResourceStore {
    resource: GroupResource,
    clock: Arc<ResourceVersionClock>,
    inner: Mutex<StoreInner>,
}

impl ResourceStore {
    pub fn new(resource: GroupResource, clock: Arc<ResourceVersionClock>) -> Self {
        ResourceStore {
            resource,
            clock,
            inner: Mutex::new(StoreInner {
                objects: BTreeMap::new(),
                subscribers: Vec::new(),
                observers: Vec::new(),
            }),
        }
    }

    pub fn resource(&self) -> &GroupResource {
        &self.resource
    }

    pub fn get(&self, id: &NamespacedName) -> Option<Value> {
        let inner = self.inner.lock().unwrap();
        inner.objects.get(id).map(|obj| obj.as_ref().clone())
    }

    /// Snapshot of the store plus the version it is current at. The
    /// version is read under the same lock as the snapshot, so a watch
    /// started from it observes exactly the writes that follow.
    pub fn list(&self, namespace: Option<&str>) -> (Vec<Value>, u64) {
        let inner = self.inner.lock().unwrap();
        let items = inner
            .objects
            .iter()
            .filter(|(id, _)| namespace.is_none_or(|ns| id.namespace == ns))
            .map(|(_, obj)| obj.as_ref().clone())
            .collect();
        (items, self.clock.now())
    }

    pub fn create(&self, id: &NamespacedName, mut obj: Value) -> Result<Value> {
        let mut inner = self.inner.lock().unwrap();
        if inner.objects.contains_key(id) {
            return Err(Error::already_exists(self.kind_of(&obj), &id.name));
        }
        meta::stamp_created(&mut obj)?;
        meta::set_resource_version(&mut obj, self.clock.next())?;

        let stored = Arc::new(obj);
        inner.objects.insert(id.clone(), Arc::clone(&stored));
        self.broadcast(&mut inner, EventType::Added, Arc::clone(&stored));
        Ok(stored.as_ref().clone())
    }

    pub fn update(&self, id: &NamespacedName, mut obj: Value) -> Result<Value> {
        let mut inner = self.inner.lock().unwrap();
        let prev = match inner.objects.get(id) {
            Some(prev) => Arc::clone(prev),
            None => return Err(Error::not_found(self.kind_of(&obj), &id.name)),
        };
        meta::carry_over_on_update(&mut obj, &prev)?;
        meta::set_resource_version(&mut obj, self.clock.next())?;

        let stored = Arc::new(obj);
        inner.objects.insert(id.clone(), Arc::clone(&stored));
        self.broadcast(&mut inner, EventType::Modified, Arc::clone(&stored));
        Ok(stored.as_ref().clone())
    }

    pub fn delete(&self, id: &NamespacedName) -> Result<Value> {
        let mut inner = self.inner.lock().unwrap();
        let removed = match inner.objects.remove(id) {
            Some(removed) => removed,
            None => return Err(Error::not_found(&self.resource.resource, &id.name)),
        };
        // The deletion event carries the final state of the object,
        // stamped with the version of the delete itself.
        let mut last = removed.as_ref().clone();
        meta::set_resource_version(&mut last, self.clock.next())?;
        let last = Arc::new(last);
        self.broadcast(&mut inner, EventType::Deleted, Arc::clone(&last));
        Ok(last.as_ref().clone())
    }

    /// Runs a patch computation against the current object and commits
    /// its result, all in one critical section. `f` returning `None`
    /// means the patch was a no-op: nothing is stored, no version is
    /// consumed, nothing is broadcast.
    pub fn mutate_with<F>(&self, id: &NamespacedName, f: F) -> Result<Option<Value>>
    where
        F: FnOnce(&Value) -> Result<Option<Value>>,
    {
        let mut inner = self.inner.lock().unwrap();
        let prev = match inner.objects.get(id) {
            Some(prev) => Arc::clone(prev),
            None => return Err(Error::not_found(&self.resource.resource, &id.name)),
        };
        let next = match f(&prev)? {
            Some(next) => next,
            None => return Ok(None),
        };
        self.commit(&mut inner, id, next, &Some(prev)).map(Some)
    }

    /// Like `mutate_with` but the object may not exist yet; a created
    /// result is broadcast as ADDED.
    pub fn upsert_with<F>(&self, id: &NamespacedName, f: F) -> Result<Option<Value>>
    where
        F: FnOnce(Option<&Value>) -> Result<Option<Value>>,
    {
        let mut inner = self.inner.lock().unwrap();
        let prev = inner.objects.get(id).cloned();
        let next = match f(prev.as_deref())? {
            Some(next) => next,
            None => return Ok(None),
        };
        self.commit(&mut inner, id, next, &prev).map(Some)
    }

    fn commit(
        &self,
        inner: &mut StoreInner,
        id: &NamespacedName,
        mut next: Value,
        prev: &Option<Arc<Value>>,
    ) -> Result<Value> {
        let event_type = match prev {
            Some(prev) => {
                meta::carry_over_on_update(&mut next, prev)?;
                EventType::Modified
            }
            None => {
                meta::stamp_created(&mut next)?;
                EventType::Added
            }
        };
        meta::set_resource_version(&mut next, self.clock.next())?;

        let stored = Arc::new(next);
        inner.objects.insert(id.clone(), Arc::clone(&stored));
        self.broadcast(inner, event_type, Arc::clone(&stored));
        Ok(stored.as_ref().clone())
    }

    /// Registers a write hook. Hooks run after subscriber delivery,
    /// still inside the critical section.
    pub fn add_observer(&self, observer: OnWatchEvent) {
        let mut inner = self.inner.lock().unwrap();
        inner.observers.push(observer);
    }

    /// Subscribes to this store and blocks the calling thread.
    ///
    /// Current objects matching the filter are replayed as ADDED
    /// through the callback before any live event; writes committed
    /// after registration arrive in commit order. The call returns
    /// when the callback returns an error (with that error), or with
    /// `Ok` if the store shuts down first.
    pub fn watch<F>(&self, opts: WatchOptions, mut callback: F) -> Result<()>
    where
        F: FnMut(&WatchEvent) -> Result<()> + Send + 'static,
    {
        let (errors, cancelled) = mpsc::channel();
        {
            let mut inner = self.inner.lock().unwrap();
            for obj in inner.objects.values() {
                let event = self.event(EventType::Added, Arc::clone(obj));
                let matches = match &opts.namespace {
                    Some(ns) => event.namespace() == ns,
                    None => true,
                };
                if matches {
                    callback(&event)?;
                }
            }
            let subscriber = Subscriber {
                namespace: opts.namespace,
                callback: Box::new(callback),
                errors,
            };
            match inner.subscribers.iter_mut().find(|slot| slot.is_none()) {
                Some(slot) => *slot = Some(subscriber),
                None => inner.subscribers.push(Some(subscriber)),
            }
        }

        match cancelled.recv() {
            Ok(err) => Err(err),
            Err(mpsc::RecvError) => Ok(()),
        }
    }

    fn event(&self, event_type: EventType, object: Arc<Value>) -> WatchEvent {
        let gvk = meta::gvk_of(&object).unwrap_or_default();
        WatchEvent::new(gvk, event_type, object)
    }

    fn broadcast(&self, inner: &mut StoreInner, event_type: EventType, object: Arc<Value>) {
        let event = self.event(event_type, object);
        for slot in inner.subscribers.iter_mut() {
            let failed = match slot.as_mut() {
                Some(subscriber) if subscriber.wants(&event) => {
                    (subscriber.callback)(&event).err()
                }
                _ => None,
            };
            if let Some(err) = failed {
                tracing::debug!(
                    resource = %self.resource,
                    %err,
                    "watch callback failed, dropping subscriber"
                );
                if let Some(subscriber) = slot.take() {
                    let _ = subscriber.errors.send(err);
                }
            }
        }
        for observer in &inner.observers {
            observer(&event);
        }
    }

    fn kind_of(&self, obj: &Value) -> String {
        obj.get("kind")
            .and_then(Value::as_str)
            .unwrap_or(&self.resource.resource)
            .to_string()
    }
}
