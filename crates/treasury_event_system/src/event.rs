//! # Event types and their hierarchy
//!
//! Any `Send + Sync + 'static` type can be an event by implementing [`Event`]. Events are
//! delivered behind an [`Arc`], so subscribers share the instance the firer created and can
//! communicate through interior mutability (a cancelled flag, for instance).
//!
//! Rust has no inheritance, so an event spells out the types it may also be observed as through
//! [`Event::supertypes`]. A supertype is usually a trait object such as `dyn AccountEvent`; it
//! implements [`Event`] too and may declare supertypes of its own, which makes the hierarchy
//! transitive:
//!
//! ```rust
//! use std::sync::Arc;
//! use treasury_event_system::{Event, Supertype};
//!
//! pub trait Transaction: Send + Sync {
//!     fn amount(&self) -> u64;
//! }
//!
//! impl Event for dyn Transaction {}
//!
//! #[derive(Debug)]
//! pub struct Deposit {
//!     pub amount: u64,
//! }
//!
//! impl Transaction for Deposit {
//!     fn amount(&self) -> u64 {
//!         self.amount
//!     }
//! }
//!
//! impl Event for Deposit {
//!     fn supertypes() -> Vec<Supertype<Self>> {
//!         vec![Supertype::of(|deposit: Arc<Deposit>| deposit as Arc<dyn Transaction>)]
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Marker trait for everything that can travel over the [`EventBus`](crate::EventBus).
pub trait Event: Send + Sync + 'static {
    /// Direct supertypes this event can also be observed as.
    ///
    /// Supertypes of supertypes are discovered automatically; list only the direct ones.
    fn supertypes() -> Vec<Supertype<Self>> {
        Vec::new()
    }
}

/// Runtime token identifying an event type.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Returns the token of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full type name, as reported by [`std::any::type_name`].
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, suitable for thread names and logs.
    pub fn short_name(&self) -> &'static str {
        // Generic arguments may contain paths too, so only look before the first `<`.
        let head = self.name.split('<').next().unwrap_or(self.name);
        let start = head.rfind("::").map_or(0, |index| index + 2);
        let short = &self.name[start..];
        short.strip_prefix("dyn ").unwrap_or(short)
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A shared event whose static type has been erased.
///
/// Holds an `Arc<T>` for the event type `T` it was created as; callers registered for `T`
/// recover the typed handle with [`downcast`](Self::downcast).
#[derive(Clone)]
pub(crate) struct ErasedEvent {
    event_type: EventType,
    handle: Arc<dyn Any + Send + Sync>,
}

impl ErasedEvent {
    pub(crate) fn new<T: ?Sized + Event>(event: Arc<T>) -> Self {
        Self {
            event_type: EventType::of::<T>(),
            handle: Arc::new(event),
        }
    }

    pub(crate) fn event_type(&self) -> EventType {
        self.event_type
    }

    pub(crate) fn downcast<T: ?Sized + Event>(&self) -> Option<Arc<T>> {
        self.handle.downcast_ref::<Arc<T>>().cloned()
    }
}

type Cast<A, B> = Arc<dyn Fn(Arc<A>) -> Arc<B> + Send + Sync>;
type Upcast<E> = Arc<dyn Fn(Arc<E>) -> ErasedEvent + Send + Sync>;
type Parents<E> = Arc<dyn Fn() -> Vec<Supertype<E>> + Send + Sync>;

/// A type the event `E` can also be delivered as, together with the conversion to it.
pub struct Supertype<E: ?Sized> {
    event_type: EventType,
    upcast: Upcast<E>,
    parents: Parents<E>,
}

impl<E: ?Sized + 'static> Supertype<E> {
    /// Declares `S` as a supertype of `E`, reached through `cast`.
    ///
    /// `cast` is normally an unsizing coercion: `|event: Arc<E>| event as Arc<dyn Trait>`.
    pub fn of<S: ?Sized + Event>(cast: fn(Arc<E>) -> Arc<S>) -> Self {
        Self::through::<S>(Arc::new(cast))
    }

    fn through<S: ?Sized + Event>(cast: Cast<E, S>) -> Self {
        let erase = Arc::clone(&cast);
        Self {
            event_type: EventType::of::<S>(),
            upcast: Arc::new(move |event| ErasedEvent::new(erase(event))),
            parents: Arc::new(move || {
                S::supertypes()
                    .into_iter()
                    .map(|parent| parent.after(Arc::clone(&cast)))
                    .collect()
            }),
        }
    }

    /// Re-roots this supertype of `E` onto `C`, given the conversion from `C` to `E`.
    fn after<C: ?Sized + 'static>(self, first: Cast<C, E>) -> Supertype<C> {
        let Supertype {
            event_type,
            upcast,
            parents,
        } = self;
        let step = Arc::clone(&first);

        Supertype {
            event_type,
            upcast: Arc::new(move |event| upcast(step(event))),
            parents: Arc::new(move || {
                parents()
                    .into_iter()
                    .map(|parent| parent.after(Arc::clone(&first)))
                    .collect()
            }),
        }
    }

    /// Token of the supertype.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub(crate) fn upcast(&self, event: Arc<E>) -> ErasedEvent {
        (self.upcast)(event)
    }

    pub(crate) fn parents(&self) -> Vec<Supertype<E>> {
        (self.parents)()
    }
}

impl<E: ?Sized> Clone for Supertype<E> {
    fn clone(&self) -> Self {
        Self {
            event_type: self.event_type,
            upcast: Arc::clone(&self.upcast),
            parents: Arc::clone(&self.parents),
        }
    }
}

impl<E: ?Sized> fmt::Debug for Supertype<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Supertype").field(&self.event_type).finish()
    }
}
