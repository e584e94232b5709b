//! Argument resolution for injected handlers.
//!
//! Injected handlers declare what they need as parameter types. Each type
//! implements [`FromScope`] and is resolved from the [`InvocationScope`]
//! built for that single invocation:
//!
//! | parameter | source |
//! |-----------|--------|
//! | `Arc<Conversation>` | the conversation for this message |
//! | [`Params`] | a copy of its decoded parameters |
//! | [`Inbound`] | the inbound topic |
//! | [`Payload`] | the raw payload bytes |
//! | [`Service<T>`] | the most recently provided `T` in [`Services`] |
//! | `Option<T>` | `T` if resolvable, else `None` |
//!
//! The scope is never shared between invocations, so concurrent messages
//! cannot observe each other's conversation.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use mrr_core::{Params, Topic};

use crate::conversation::Conversation;
use crate::error::{ExtractError, ExtractResult};

// =============================================================================
// Services
// =============================================================================

/// Instances available to injected handlers, keyed by type.
///
/// Providing a second value of the same type replaces the first.
#[derive(Clone, Default)]
pub struct Services {
    instances: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` as the instance for its type.
    pub fn provide<T: Send + Sync + 'static>(&mut self, value: T) {
        self.provide_arc(Arc::new(value));
    }

    /// Registers an already shared instance.
    pub fn provide_arc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.instances.insert(TypeId::of::<T>(), value);
    }

    /// Looks up the instance registered for `T`.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.instances
            .get(&TypeId::of::<T>())
            .and_then(|any| Arc::clone(any).downcast::<T>().ok())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("count", &self.instances.len())
            .finish()
    }
}

// =============================================================================
// InvocationScope
// =============================================================================

/// Everything an injected handler can draw its arguments from.
#[derive(Debug, Clone)]
pub struct InvocationScope {
    conversation: Arc<Conversation>,
    services: Arc<Services>,
}

impl InvocationScope {
    /// Creates the scope for one invocation.
    pub fn new(conversation: Arc<Conversation>, services: Arc<Services>) -> Self {
        Self {
            conversation,
            services,
        }
    }

    /// The conversation being handled.
    pub fn conversation(&self) -> &Arc<Conversation> {
        &self.conversation
    }

    /// The services snapshot.
    pub fn services(&self) -> &Services {
        &self.services
    }
}

// =============================================================================
// FromScope
// =============================================================================

/// A type that can be resolved from an [`InvocationScope`].
///
/// ```rust,ignore
/// struct DeviceId(i64);
///
/// impl FromScope for DeviceId {
///     fn from_scope(scope: &InvocationScope) -> ExtractResult<Self> {
///         Ok(DeviceId(scope.conversation().param_i64("device_index")))
///     }
/// }
/// ```
pub trait FromScope: Sized {
    /// Attempts to resolve this type.
    fn from_scope(scope: &InvocationScope) -> ExtractResult<Self>;
}

impl FromScope for Arc<Conversation> {
    fn from_scope(scope: &InvocationScope) -> ExtractResult<Self> {
        Ok(Arc::clone(&scope.conversation))
    }
}

impl FromScope for Params {
    fn from_scope(scope: &InvocationScope) -> ExtractResult<Self> {
        Ok(scope.conversation.params().clone())
    }
}

impl<T: FromScope> FromScope for Option<T> {
    fn from_scope(scope: &InvocationScope) -> ExtractResult<Self> {
        Ok(T::from_scope(scope).ok())
    }
}

/// The topic the message arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound(pub Topic);

impl FromScope for Inbound {
    fn from_scope(scope: &InvocationScope) -> ExtractResult<Self> {
        Ok(Self(scope.conversation.request().topic().clone()))
    }
}

/// The raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(pub Vec<u8>);

impl FromScope for Payload {
    fn from_scope(scope: &InvocationScope) -> ExtractResult<Self> {
        Ok(Self(scope.conversation.request().payload().to_vec()))
    }
}

/// A shared instance registered through [`Services::provide`].
///
/// Derefs to `T`, so `service.0` on a newtype service reaches the newtype's
/// own field.
#[derive(Debug)]
pub struct Service<T> {
    inner: Arc<T>,
}

impl<T> Service<T> {
    /// The shared handle.
    pub fn arc(&self) -> &Arc<T> {
        &self.inner
    }

    /// Consumes the extractor, returning the shared handle.
    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T> Clone for Service<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Deref for Service<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Send + Sync + 'static> FromScope for Service<T> {
    fn from_scope(scope: &InvocationScope) -> ExtractResult<Self> {
        scope
            .services
            .get::<T>()
            .map(|inner| Service { inner })
            .ok_or(ExtractError::Unresolved {
                type_name: type_name::<T>(),
            })
    }
}
