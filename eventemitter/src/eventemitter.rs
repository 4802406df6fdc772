use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Boxed error a listener may return to abort a trigger.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The return type of every listener callback.
pub type ListenerResult = std::result::Result<(), BoxError>;

type Callback<D> = dyn Fn(&EventEmitter<D>, &D) -> ListenerResult + Send + Sync;

/// A bucket slot. `None` is a tombstone left behind by a removal and is
/// compacted away by the next trigger that reaches it.
type Slot<D> = Option<Listener<D>>;

/// The ordered slots of one event name. A trigger holds on to the bucket it
/// found at entry, so swapping in a fresh bucket does not disturb it.
type Bucket<D> = Arc<Mutex<Vec<Slot<D>>>>;

/// Event name to its bucket.
type Listeners<D> = HashMap<String, Bucket<D>>;

struct ListenerInner<D> {
    callback: Box<Callback<D>>,
}

/// A registered callback.
///
/// A `Listener` is a cheap handle: clones share the same identity, and the
/// emitter compares listeners by identity only. Two listeners built from
/// identical closures are still two different listeners.
pub struct Listener<D> {
    inner: Arc<ListenerInner<D>>,
}

impl<D: 'static> Listener<D> {
    /// Creates a new [`Listener`] from a callback.
    ///
    /// The callback receives the emitter that invoked it and the event data.
    /// Returning an error aborts the current trigger.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&EventEmitter<D>, &D) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ListenerInner {
                callback: Box::new(callback),
            }),
        }
    }

    /// Wraps `listener` in a listener that tombstones itself from `event`'s
    /// bucket once `listener` has returned successfully.
    fn once(event: &str, listener: &Listener<D>) -> Self {
        let event = event.to_string();
        let listener = listener.clone();

        let inner = Arc::new_cyclic(|me: &Weak<ListenerInner<D>>| {
            let me = me.clone();
            ListenerInner {
                callback: Box::new(
                    move |emitter: &EventEmitter<D>, data: &D| -> ListenerResult {
                        listener.call(emitter, data)?;
                        if let Some(inner) = me.upgrade() {
                            emitter.tombstone(&event, &Listener { inner });
                        }
                        Ok(())
                    },
                ),
            }
        });

        Self { inner }
    }
}

impl<D> Listener<D> {
    /// Returns true if both handles refer to the same listener.
    pub fn same(&self, other: &Listener<D>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn call(&self, emitter: &EventEmitter<D>, data: &D) -> ListenerResult {
        (self.inner.callback)(emitter, data)
    }
}

impl<D> Clone for Listener<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D> fmt::Debug for Listener<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Arc::as_ptr(&self.inner))
            .finish()
    }
}

/// Dispatches named events to their listeners on the caller's thread.
///
/// Listeners are registered under an event name and invoked in registration
/// order when that event is triggered. No lock is held while a listener
/// runs, so a listener may register or remove listeners (itself included) on
/// the emitter that invoked it, or trigger events on it.
///
/// Removal never shifts a bucket: the removed slot becomes a tombstone, and
/// the trigger that next reaches it splices it out at its own cursor. This is
/// what keeps a listener removing itself mid-trigger from skipping the
/// listener after it.
///
/// # Example
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use syncemit_eventemitter::{EventEmitter, Listener};
///
/// let emitter = EventEmitter::<String>::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let seen_cloned = seen.clone();
/// let greet = Listener::new(move |_, name: &String| {
///     seen_cloned.lock().unwrap().push(format!("hello {name}"));
///     Ok(())
/// });
///
/// let seen_cloned = seen.clone();
/// let first_only = Listener::new(move |_, name: &String| {
///     seen_cloned.lock().unwrap().push(format!("first {name}"));
///     Ok(())
/// });
///
/// emitter.on("join", &greet).once("join", &first_only);
///
/// emitter.emit("join", &"alice".to_string()).unwrap();
/// emitter.emit("join", &"bob".to_string()).unwrap();
///
/// emitter.off(Some("join"), Some(&greet));
/// emitter.emit("join", &"carol".to_string()).unwrap();
///
/// assert_eq!(
///     *seen.lock().unwrap(),
///     vec!["hello alice", "first alice", "hello bob"]
/// );
/// ```
///
pub struct EventEmitter<D> {
    listeners: Mutex<Listeners<D>>,
}

impl<D: 'static> EventEmitter<D> {
    /// Creates a new, empty [`EventEmitter`].
    pub fn new() -> EventEmitter<D> {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a new [`EventEmitter`] with room for `capacity` event names
    /// before the listener table reallocates.
    pub fn with_capacity(capacity: usize) -> EventEmitter<D> {
        Self {
            listeners: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Appends `listener` to the bucket of `event`, creating the bucket if
    /// needed. Registering the same listener twice makes it fire twice.
    pub fn add_listener(&self, event: &str, listener: &Listener<D>) -> &Self {
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .lock()
            .push(Some(listener.clone()));
        trace!("Registered a listener for event '{event}'");
        self
    }

    /// Alias of [`EventEmitter::add_listener`].
    pub fn on(&self, event: &str, listener: &Listener<D>) -> &Self {
        self.add_listener(event, listener)
    }

    /// Removes listeners.
    ///
    /// - Without an event name (`None` or `""`), every bucket is dropped.
    /// - With an event name but no listener, that event gets a new, empty
    ///   bucket.
    /// - With both, every slot holding `listener` in that bucket is
    ///   tombstoned. The slots are compacted by the next trigger.
    ///
    /// Triggers already running keep iterating the buckets they started
    /// with, so dropping or replacing a bucket only affects later triggers.
    pub fn remove_listener(&self, event: Option<&str>, listener: Option<&Listener<D>>) -> &Self {
        match (event.filter(|e| !e.is_empty()), listener) {
            (None, _) => {
                self.listeners.lock().clear();
                trace!("Removed all listeners");
            }
            (Some(event), None) => {
                self.listeners
                    .lock()
                    .insert(event.to_string(), Bucket::default());
                trace!("Removed all listeners for event '{event}'");
            }
            (Some(event), Some(listener)) => self.tombstone(event, listener),
        }

        self
    }

    /// Replaces every slot holding `listener` in the bucket of `event` with a
    /// tombstone. `event` is taken literally, `""` included.
    fn tombstone(&self, event: &str, listener: &Listener<D>) {
        let Some(bucket) = self.bucket(event) else {
            trace!("Failed to remove a listener from a non-existent event '{event}'");
            return;
        };

        for slot in bucket.lock().iter_mut() {
            if slot.as_ref().is_some_and(|l| l.same(listener)) {
                *slot = None;
            }
        }
        trace!("Removed a listener for event '{event}'");
    }

    fn bucket(&self, event: &str) -> Option<Bucket<D>> {
        self.listeners.lock().get(event).cloned()
    }

    /// Alias of [`EventEmitter::remove_listener`].
    pub fn off(&self, event: Option<&str>, listener: Option<&Listener<D>>) -> &Self {
        self.remove_listener(event, listener)
    }

    /// Invokes every listener of `event` in registration order with `data`.
    ///
    /// Triggering an event with no bucket does nothing. If a listener returns
    /// an error, the listeners after it are skipped for this call and the
    /// error is returned as [`Error::Listener`].
    ///
    /// The bucket is looked up once, at entry. Nested triggers of the same
    /// event share that bucket, so an inner trigger compacting tombstones can
    /// shift slots under an outer one.
    pub fn trigger(&self, event: &str, data: &D) -> Result<()> {
        let Some(bucket) = self.bucket(event) else {
            trace!("No listeners registered for event '{event}'");
            return Ok(());
        };

        let mut cursor = 0;

        loop {
            let listener = {
                let mut bucket = bucket.lock();

                let slot = match bucket.get(cursor) {
                    Some(slot) => slot.clone(),
                    None => return Ok(()),
                };

                match slot {
                    Some(listener) => listener,
                    None => {
                        bucket.remove(cursor);
                        trace!("Compacted a removed listener for event '{event}'");
                        continue;
                    }
                }
            };

            if let Err(source) = listener.call(self, data) {
                debug!("Listener for event '{event}' failed: {source}");
                return Err(Error::Listener {
                    event: event.to_string(),
                    source,
                });
            }

            cursor += 1;
        }
    }

    /// Alias of [`EventEmitter::trigger`].
    pub fn emit(&self, event: &str, data: &D) -> Result<()> {
        self.trigger(event, data)
    }

    /// Empties the bucket of `event`, or every bucket if `event` is `None`
    /// or `""`.
    pub fn remove_all_listeners(&self, event: Option<&str>) -> &Self {
        self.remove_listener(event, None)
    }

    /// Alias of [`EventEmitter::remove_all_listeners`].
    pub fn off_all(&self, event: Option<&str>) -> &Self {
        self.remove_all_listeners(event)
    }

    /// Registers `listener` so that it fires on the next trigger of `event`
    /// only.
    ///
    /// The registration is dropped after `listener` returns `Ok`. If it
    /// returns an error, it stays registered and fires again on the next
    /// trigger. The registered wrapper is a new listener, so passing
    /// `listener` to [`EventEmitter::remove_listener`] does not cancel it;
    /// clear the event's bucket instead.
    pub fn once(&self, event: &str, listener: &Listener<D>) -> &Self {
        let wrapper = Listener::once(event, listener);
        self.add_listener(event, &wrapper)
    }

    /// Returns the number of live listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .get(event)
            .map(|bucket| bucket.lock().iter().flatten().count())
            .unwrap_or(0)
    }

    /// Returns true if `event` has at least one live listener.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Returns the sorted names of all events with at least one live listener.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, bucket)| bucket.lock().iter().any(Option::is_some))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl<D: 'static> Default for EventEmitter<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for EventEmitter<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buckets: Vec<(String, usize)> = self
            .listeners
            .lock()
            .iter()
            .map(|(name, bucket)| (name.clone(), bucket.lock().iter().flatten().count()))
            .collect();
        buckets.sort();

        f.debug_struct("EventEmitter")
            .field("listeners", &buckets)
            .finish()
    }
}
