//! Handler system for mrr.
//!
//! A route's [`Handler`] is one of two variants, chosen explicitly when the
//! route is registered:
//!
//! - [`Handler::direct`]: an async function taking the [`Conversation`] by
//!   value and returning a [`HandlerResult`].
//! - [`Handler::injected`]: an async function whose arguments are resolved
//!   from an [`InvocationScope`] through [`FromScope`], Axum-style.
//!
//! A dispatcher runs a single [`InvocationStrategy`] and refuses handlers of
//! the other variant.
//!
//! # Example
//!
//! ```rust,ignore
//! use mrr_framework::{Conversation, Handler, HandlerResult, Params, Service};
//!
//! async fn ping(conversation: Conversation) -> HandlerResult {
//!     conversation.string(200, "pong").await?;
//!     Ok(())
//! }
//!
//! async fn lookup(conversation: Arc<Conversation>, db: Service<Db>) -> HandlerResult {
//!     let row = db.get(conversation.param_i64("id"));
//!     conversation.json(200, &row).await?;
//!     Ok(())
//! }
//!
//! let direct = Handler::direct(ping);
//! let injected = Handler::injected(lookup);
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conversation::Conversation;
use crate::error::HandlerResult;
use crate::extractor::{FromScope, InvocationScope, Services};

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a dispatcher calls its handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStrategy {
    /// `handler(conversation)`.
    #[default]
    Direct,
    /// Arguments resolved by type.
    Injected,
}

impl fmt::Display for InvocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Injected => f.write_str("injected"),
        }
    }
}

// ============================================================================
// Direct handlers
// ============================================================================

/// A handler receiving the conversation itself.
///
/// Implemented for every `Fn(Conversation) -> impl Future<Output = HandlerResult>`.
pub trait DirectHandler: Send + Sync + 'static {
    /// Handles one conversation.
    fn call(&self, conversation: Conversation) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> DirectHandler for F
where
    F: Fn(Conversation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, conversation: Conversation) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(conversation))
    }
}

// ============================================================================
// Injected handlers
// ============================================================================

/// A handler whose arguments are resolved from an [`InvocationScope`].
///
/// Implemented for async functions taking 0-8 parameters that implement
/// [`FromScope`] and returning a [`HandlerResult`]. Arguments are resolved
/// left to right; the first unresolvable one aborts the invocation with
/// [`HandlerError::Extract`](crate::error::HandlerError::Extract).
pub trait InjectedHandler<T>: Clone + Send + Sync + 'static {
    /// The type of future calling this handler returns.
    type Future: Future<Output = HandlerResult> + Send + 'static;

    /// Calls the handler with arguments taken from `scope`.
    fn call(self, scope: InvocationScope) -> Self::Future;
}

impl<F, Fut> InjectedHandler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    type Future = Fut;

    fn call(self, _scope: InvocationScope) -> Self::Future {
        (self)()
    }
}

macro_rules! impl_injected_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case)]
        impl<F, Fut, $($ty,)*> InjectedHandler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = HandlerResult> + Send + 'static,
            $( $ty: FromScope + Send + 'static, )*
        {
            type Future = BoxFuture<'static, HandlerResult>;

            fn call(self, scope: InvocationScope) -> Self::Future {
                Box::pin(async move {
                    $(
                        let $ty = $ty::from_scope(&scope)?;
                    )*
                    (self)($($ty,)*).await
                })
            }
        }
    };
}

impl_injected_handler!(T1);
impl_injected_handler!(T1, T2);
impl_injected_handler!(T1, T2, T3);
impl_injected_handler!(T1, T2, T3, T4);
impl_injected_handler!(T1, T2, T3, T4, T5);
impl_injected_handler!(T1, T2, T3, T4, T5, T6);
impl_injected_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_injected_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

/// Type-erased injected handler.
pub trait ErasedHandler: Send + Sync {
    /// Executes the handler with the given scope.
    fn call(&self, scope: InvocationScope) -> BoxFuture<'static, HandlerResult>;
}

/// Wraps an [`InjectedHandler`] so it can be stored behind [`ErasedHandler`].
pub struct HandlerFn<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> HandlerFn<F, T> {
    /// Creates a new handler function wrapper.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, T> ErasedHandler for HandlerFn<F, T>
where
    F: InjectedHandler<T>,
    T: 'static,
{
    fn call(&self, scope: InvocationScope) -> BoxFuture<'static, HandlerResult> {
        let f = self.f.clone();
        Box::pin(f.call(scope))
    }
}

// ============================================================================
// Handler
// ============================================================================

/// The unit of user logic bound to a route.
#[derive(Clone)]
pub enum Handler {
    /// Called as `handler(conversation)`.
    Direct(Arc<dyn DirectHandler>),
    /// Called with arguments resolved by type.
    Injected(Arc<dyn ErasedHandler>),
}

impl Handler {
    /// Wraps a direct handler.
    pub fn direct<H: DirectHandler>(handler: H) -> Self {
        Self::Direct(Arc::new(handler))
    }

    /// Wraps an injected handler.
    pub fn injected<F, T>(handler: F) -> Self
    where
        F: InjectedHandler<T>,
        T: 'static,
    {
        Self::Injected(Arc::new(HandlerFn::new(handler)))
    }

    /// The strategy this variant requires.
    pub fn strategy(&self) -> InvocationStrategy {
        match self {
            Self::Direct(_) => InvocationStrategy::Direct,
            Self::Injected(_) => InvocationStrategy::Injected,
        }
    }

    /// Invokes the handler for one conversation.
    ///
    /// Injected handlers get a fresh [`InvocationScope`] holding this
    /// conversation and the given services snapshot; nothing about the
    /// message is written to shared state.
    pub async fn invoke(&self, conversation: Conversation, services: Arc<Services>) -> HandlerResult {
        match self {
            Self::Direct(handler) => handler.call(conversation).await,
            Self::Injected(handler) => {
                let scope = InvocationScope::new(Arc::new(conversation), services);
                handler.call(scope).await
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.strategy()).finish()
    }
}
