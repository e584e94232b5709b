//! # mrr framework
//!
//! Request/response dispatch on top of a pub/sub transport.
//!
//! This layer provides:
//! - [`Dispatcher`]: receives inbound messages, routes them, invokes handlers
//! - [`RouteTable`]: first-match routing by exact topic name
//! - [`Conversation`]: per-message parameters and reply operations
//! - [`Handler`]: direct or injected handler variants
//! - [`FromScope`]: argument resolution for injected handlers

pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod route;

pub use conversation::{Conversation, RESPONSE_QOS_PARAM, RESPONSE_TOPIC_PARAM, Responder};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{
    ExtractError, ExtractResult, HandlerError, HandlerResult, ResponseError, ResponseResult,
    RouteError, RouteResult,
};
pub use extractor::{FromScope, Inbound, InvocationScope, Payload, Service, Services};
pub use handler::{
    BoxFuture, DirectHandler, ErasedHandler, Handler, HandlerFn, InjectedHandler,
    InvocationStrategy,
};
pub use route::{Route, RouteTable};

// Core value types handlers work with.
pub use mrr_core::{ParamValue, Params, QoS, Request, Topic};
