//! Route table.
//!
//! Routes are matched by exact topic name in registration order. Names need
//! not be unique: the first registration wins and later duplicates are
//! shadowed for good. A route whose subscription failed keeps its slot, so
//! it still shadows later duplicates, but it is never matched.

use mrr_core::{Topic, TransportError};

use crate::handler::Handler;

/// A topic bound to a handler.
#[derive(Debug, Clone)]
pub struct Route {
    topic: Topic,
    handler: Handler,
    last_error: Option<TransportError>,
}

impl Route {
    /// Creates a healthy route.
    pub fn new(topic: Topic, handler: Handler) -> Self {
        Self {
            topic,
            handler,
            last_error: None,
        }
    }

    /// Records a registration-time failure.
    pub fn with_error(mut self, err: TransportError) -> Self {
        self.last_error = Some(err);
        self
    }

    /// The subscribed topic.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The bound handler.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// The registration failure, if any.
    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    /// Returns `true` if registration failed; such a route is never invoked.
    pub fn is_inert(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Ordered, append-only collection of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route and returns its slot index.
    pub fn push(&mut self, route: Route) -> usize {
        self.routes.push(route);
        self.routes.len() - 1
    }

    /// Records `err` on the route in slot `index`, making it inert.
    ///
    /// Returns `false` if there is no such slot.
    pub fn mark_failed(&mut self, index: usize, err: TransportError) -> bool {
        match self.routes.get_mut(index) {
            Some(route) => {
                route.last_error = Some(err);
                true
            }
            None => false,
        }
    }

    /// Returns the first route registered under exactly `name`, unless that
    /// route is inert.
    pub fn find(&self, name: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.topic.name() == name)
            .filter(|route| !route.is_inert())
    }

    /// Number of routes, inert ones included.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no route was registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}
