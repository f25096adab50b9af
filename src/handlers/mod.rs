//! The type-handler registry.
//!
//! A process-wide mapping from entity-field type to a handler that
//! converts between a driver value and that type, with a monotonically
//! increasing version counter that decode plans use as their staleness
//! token. A single global registry is required because both parameter
//! binding and row decoding are called from many entry points; per-call
//! registration would force every caller to thread the handler set
//! through. Consistency is maintained by the version counter: plans carry
//! the version at which they were built and are discarded on the next use
//! after the registry changes.

pub mod enum_handler;

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::driver::{DbValue, Parameter};
use crate::error::{MapperError, MapperResult};

/// A user-registered conversion pair for a specific target type `T`.
///
/// Registered handlers are consulted *before* any built-in conversion —
/// this is what lets an enumerated type whose database representation
/// differs from its identifier by more than case be handled correctly:
/// relying on the driver's default case-insensitive name match is not
/// sufficient.
pub trait TypeHandler<T: 'static>: Send + Sync + 'static {
    /// Writes `value` into `param`, choosing the parameter's type hint.
    fn set(&self, param: &mut dyn Parameter, value: &T) -> MapperResult<()>;

    /// Converts a raw driver value into an instance of `T`.
    fn parse(&self, raw: &DbValue) -> MapperResult<T>;
}

/// Type-erased form of [`TypeHandler`], usable by code paths that only
/// hold a runtime [`TypeId`] (`register_dyn`).
pub trait DynTypeHandler: Send + Sync + 'static {
    fn set_dyn(&self, param: &mut dyn Parameter, value: &dyn Any) -> MapperResult<()>;
    fn parse_dyn(&self, raw: &DbValue) -> MapperResult<Box<dyn Any + Send>>;
    fn type_name(&self) -> &'static str;
}

struct Adapter<T, H> {
    handler: H,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T, H> DynTypeHandler for Adapter<T, H>
where
    T: Send + 'static,
    H: TypeHandler<T>,
{
    fn set_dyn(&self, param: &mut dyn Parameter, value: &dyn Any) -> MapperResult<()> {
        let value = value.downcast_ref::<T>().ok_or_else(|| {
            MapperError::handler_contract(
                std::any::type_name::<T>(),
                "set() called with a value of the wrong type",
            )
        })?;
        self.handler.set(param, value)
    }

    fn parse_dyn(&self, raw: &DbValue) -> MapperResult<Box<dyn Any + Send>> {
        let value = self.handler.parse(raw)?;
        Ok(Box::new(value))
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Process-wide registry of type handlers plus a monotonic version
/// counter — the staleness token decode plans are stamped with.
///
/// Backed by a conflict-free concurrent map (`DashMap`) rather than a
/// `RwLock<HashMap<_>>`: handler lookup happens on every decoded column,
/// i.e. on the hot path, where an async `RwLock`-guarded map would be
/// too coarse — handler registration is rare, handler lookup is not.
pub struct HandlerRegistry {
    handlers: DashMap<TypeId, Arc<dyn DynTypeHandler>>,
    version: AtomicU64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            version: AtomicU64::new(0),
        }
    }

    /// Inserts or replaces the handler for `T`; increments the version.
    pub fn register<T, H>(&self, handler: H)
    where
        T: Send + 'static,
        H: TypeHandler<T>,
    {
        self.register_dyn(
            TypeId::of::<T>(),
            Arc::new(Adapter {
                handler,
                _marker: std::marker::PhantomData,
            }),
        );
    }

    /// Same as [`register`](Self::register), for code paths holding a
    /// runtime `TypeId` rather than a compile-time type parameter.
    pub fn register_dyn(&self, type_id: TypeId, handler: Arc<dyn DynTypeHandler>) {
        log::info!("registering handler for type: {}", handler.type_name());
        self.handlers.insert(type_id, handler);
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Non-blocking lookup for a handler registered for `T`.
    pub fn try_get<T: 'static>(&self) -> Option<Arc<dyn DynTypeHandler>> {
        self.try_get_dyn(TypeId::of::<T>())
    }

    pub fn try_get_dyn(&self, type_id: TypeId) -> Option<Arc<dyn DynTypeHandler>> {
        self.handlers.get(&type_id).map(|entry| entry.clone())
    }

    /// Removes all handlers; increments the version.
    pub fn clear(&self) {
        log::info!("clearing {} registered handler(s)", self.handlers.len());
        self.handlers.clear();
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: Lazy<HandlerRegistry> = Lazy::new(HandlerRegistry::new);

/// The single, process-wide handler registry.
pub fn global() -> &'static HandlerRegistry {
    &GLOBAL_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseHandler;

    impl TypeHandler<String> for UppercaseHandler {
        fn set(&self, param: &mut dyn Parameter, value: &String) -> MapperResult<()> {
            param.set_value(DbValue::Str(value.to_uppercase()));
            Ok(())
        }

        fn parse(&self, raw: &DbValue) -> MapperResult<String> {
            match raw {
                DbValue::Str(s) => Ok(s.to_lowercase()),
                _ => Err(MapperError::handler_contract(
                    "alloc::string::String",
                    "expected a string value",
                )),
            }
        }
    }

    #[test]
    fn register_bumps_version_and_is_visible() {
        let registry = HandlerRegistry::new();
        let v0 = registry.version();
        registry.register::<String, _>(UppercaseHandler);
        assert!(registry.version() > v0);
        assert!(registry.try_get::<String>().is_some());
    }

    #[test]
    fn clear_removes_handlers_and_bumps_version() {
        let registry = HandlerRegistry::new();
        registry.register::<String, _>(UppercaseHandler);
        let v1 = registry.version();
        registry.clear();
        assert!(registry.version() > v1);
        assert!(registry.try_get::<String>().is_none());
    }

    #[test]
    fn parse_dyn_downcasts_back_to_the_registered_type() {
        let registry = HandlerRegistry::new();
        registry.register::<String, _>(UppercaseHandler);
        let handler = registry.try_get::<String>().unwrap();
        let boxed = handler.parse_dyn(&DbValue::Str("HELLO".into())).unwrap();
        let parsed = *boxed.downcast::<String>().unwrap();
        assert_eq!(parsed, "hello");
    }
}
