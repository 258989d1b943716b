//! In-process message bus
//!
//! Three messaging patterns share one registry:
//!
//! - **Point-to-point**: [`MessageBus::register`] binds exactly one handler to
//!   an endpoint; [`MessageBus::send`] delivers to it.
//! - **Pub/sub**: [`MessageBus::subscribe`] binds handlers to topic patterns;
//!   [`MessageBus::publish`] fans out to every match, highest priority first,
//!   then in subscription order.
//! - **Request/response**: [`MessageBus::request`] sends to an endpoint and
//!   parks a one-shot callback under a correlation id until
//!   [`MessageBus::response`] arrives. The bus never times requests out.
//!
//! Handlers are invoked synchronously after the registry borrow is released,
//! so a handler may itself publish, send or (un)subscribe.

pub mod handler;
pub mod matching;
pub mod message;
pub mod topics;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use tessera_core::TraderId;
use uuid::Uuid;

use crate::error::BusError;
pub use handler::{MessageHandler, ResponseCallback};
pub use matching::is_matching;
pub use message::Message;
pub use topics::{Endpoints, Topics};

#[derive(Debug, Clone)]
struct Subscription {
    pattern: String,
    handler: MessageHandler,
    priority: u8,
    seq: u64,
}

/// Synchronous message bus shared (via `Rc`) by every component of a kernel
pub struct MessageBus {
    trader_id: TraderId,
    name: String,
    endpoints: RefCell<HashMap<String, MessageHandler>>,
    subscriptions: RefCell<Vec<Subscription>>,
    // topic -> resolved handlers, cleared whenever subscriptions change
    resolved: RefCell<HashMap<String, Vec<MessageHandler>>>,
    pending: RefCell<HashMap<Uuid, ResponseCallback>>,
    next_seq: Cell<u64>,
    sent_count: Cell<u64>,
    pub_count: Cell<u64>,
    req_count: Cell<u64>,
    res_count: Cell<u64>,
}

impl MessageBus {
    pub fn new(trader_id: TraderId, name: Option<&str>) -> Self {
        Self {
            trader_id,
            name: name.unwrap_or("MessageBus").to_string(),
            endpoints: RefCell::new(HashMap::new()),
            subscriptions: RefCell::new(Vec::new()),
            resolved: RefCell::new(HashMap::new()),
            pending: RefCell::new(HashMap::new()),
            next_seq: Cell::new(0),
            sent_count: Cell::new(0),
            pub_count: Cell::new(0),
            req_count: Cell::new(0),
            res_count: Cell::new(0),
        }
    }

    pub fn trader_id(&self) -> &TraderId {
        &self.trader_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // Point-to-point

    /// Bind `handler` to `endpoint`; each endpoint has at most one handler
    pub fn register(&self, endpoint: &str, handler: MessageHandler) -> Result<(), BusError> {
        let mut endpoints = self.endpoints.borrow_mut();
        if endpoints.contains_key(endpoint) {
            log::error!("{}: endpoint already registered: endpoint={endpoint}", self.name);
            return Err(BusError::EndpointAlreadyRegistered(endpoint.to_string()));
        }
        log::debug!(
            "{}: registered endpoint: endpoint={endpoint}, handler={}",
            self.name,
            handler.id()
        );
        endpoints.insert(endpoint.to_string(), handler);
        Ok(())
    }

    pub fn deregister(&self, endpoint: &str) -> bool {
        let removed = self.endpoints.borrow_mut().remove(endpoint).is_some();
        if removed {
            log::debug!("{}: deregistered endpoint: endpoint={endpoint}", self.name);
        }
        removed
    }

    pub fn is_registered(&self, endpoint: &str) -> bool {
        self.endpoints.borrow().contains_key(endpoint)
    }

    /// Registered endpoint names, sorted
    pub fn endpoints(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Deliver `msg` to the handler registered at `endpoint`
    pub fn send(&self, endpoint: &str, msg: &Message) -> Result<(), BusError> {
        let handler = self.endpoints.borrow().get(endpoint).cloned();
        let Some(handler) = handler else {
            log::error!(
                "{}: no endpoint for message: endpoint={endpoint}, message={}",
                self.name,
                msg.kind()
            );
            return Err(BusError::NoEndpoint(endpoint.to_string()));
        };
        self.sent_count.set(self.sent_count.get() + 1);

        handler.handle(msg).map_err(|e| {
            log::error!(
                "{}: endpoint handler failed: endpoint={endpoint}, handler={}, error={e:#}",
                self.name,
                handler.id()
            );
            BusError::HandlerFailed {
                handler: handler.id().to_string(),
                message: e.to_string(),
            }
        })
    }

    // Pub/sub

    /// Subscribe `handler` to `pattern`; returns false if the same handler id
    /// is already subscribed to the same pattern
    pub fn subscribe(&self, pattern: &str, handler: MessageHandler, priority: u8) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        if subs
            .iter()
            .any(|s| s.pattern == pattern && s.handler.id() == handler.id())
        {
            log::debug!(
                "{}: already subscribed: pattern={pattern}, handler={}",
                self.name,
                handler.id()
            );
            return false;
        }

        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        log::debug!(
            "{}: subscribed: pattern={pattern}, handler={}, priority={priority}",
            self.name,
            handler.id()
        );
        subs.push(Subscription {
            pattern: pattern.to_string(),
            handler,
            priority,
            seq,
        });
        subs.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        self.resolved.borrow_mut().clear();
        true
    }

    /// Remove the subscription of `handler_id` to `pattern`
    pub fn unsubscribe(&self, pattern: &str, handler_id: &str) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        let before = subs.len();
        subs.retain(|s| !(s.pattern == pattern && s.handler.id() == handler_id));
        let removed = subs.len() != before;
        if removed {
            log::debug!(
                "{}: unsubscribed: pattern={pattern}, handler={handler_id}",
                self.name
            );
            self.resolved.borrow_mut().clear();
        }
        removed
    }

    pub fn is_subscribed(&self, pattern: &str, handler_id: &str) -> bool {
        self.subscriptions
            .borrow()
            .iter()
            .any(|s| s.pattern == pattern && s.handler.id() == handler_id)
    }

    pub fn has_subscribers(&self, topic: &str) -> bool {
        !self.matching_handlers(topic).is_empty()
    }

    /// Distinct subscribed patterns, sorted
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self
            .subscriptions
            .borrow()
            .iter()
            .map(|s| s.pattern.clone())
            .collect();
        patterns.sort();
        patterns.dedup();
        patterns
    }

    fn matching_handlers(&self, topic: &str) -> Vec<MessageHandler> {
        if let Some(handlers) = self.resolved.borrow().get(topic) {
            return handlers.clone();
        }
        let handlers: Vec<MessageHandler> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| is_matching(topic, &s.pattern))
            .map(|s| s.handler.clone())
            .collect();
        self.resolved
            .borrow_mut()
            .insert(topic.to_string(), handlers.clone());
        handlers
    }

    /// Deliver `msg` to every subscriber whose pattern matches `topic`
    ///
    /// A failing handler is logged and does not stop delivery to the rest.
    /// Returns the number of handlers invoked.
    pub fn publish(&self, topic: &str, msg: &Message) -> usize {
        let handlers = self.matching_handlers(topic);
        self.pub_count.set(self.pub_count.get() + 1);
        log::trace!(
            "{}: publish: topic={topic}, message={}, subscribers={}",
            self.name,
            msg.kind(),
            handlers.len()
        );

        for handler in &handlers {
            if let Err(e) = handler.handle(msg) {
                log::error!(
                    "{}: subscriber failed: topic={topic}, handler={}, error={e:#}",
                    self.name,
                    handler.id()
                );
            }
        }
        handlers.len()
    }

    // Request/response

    /// Send `msg` to `endpoint` and park `callback` until the matching
    /// [`MessageBus::response`]
    pub fn request(
        &self,
        endpoint: &str,
        msg: &Message,
        correlation_id: Uuid,
        callback: ResponseCallback,
    ) -> Result<(), BusError> {
        if !self.is_registered(endpoint) {
            log::error!(
                "{}: no endpoint for request: endpoint={endpoint}, correlation_id={correlation_id}",
                self.name
            );
            return Err(BusError::NoEndpoint(endpoint.to_string()));
        }
        {
            let mut pending = self.pending.borrow_mut();
            if pending.contains_key(&correlation_id) {
                log::error!(
                    "{}: duplicate request: correlation_id={correlation_id}",
                    self.name
                );
                return Err(BusError::DuplicateCorrelationId(correlation_id));
            }
            pending.insert(correlation_id, callback);
        }
        self.req_count.set(self.req_count.get() + 1);

        let result = self.send(endpoint, msg);
        if result.is_err() {
            self.pending.borrow_mut().remove(&correlation_id);
        }
        result
    }

    /// Route a response to the callback parked under `correlation_id`
    ///
    /// The callback runs at most once; later responses with the same id are
    /// logged and dropped.
    pub fn response(&self, correlation_id: Uuid, msg: &Message) -> Result<(), BusError> {
        let callback = self.pending.borrow_mut().remove(&correlation_id);
        let Some(callback) = callback else {
            log::error!(
                "{}: no pending request for response: correlation_id={correlation_id}",
                self.name
            );
            return Err(BusError::UnknownCorrelationId(correlation_id));
        };
        self.res_count.set(self.res_count.get() + 1);

        callback(msg).map_err(|e| {
            log::error!(
                "{}: response callback failed: correlation_id={correlation_id}, error={e:#}",
                self.name
            );
            BusError::HandlerFailed {
                handler: correlation_id.to_string(),
                message: e.to_string(),
            }
        })
    }

    pub fn is_pending_request(&self, correlation_id: &Uuid) -> bool {
        self.pending.borrow().contains_key(correlation_id)
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count.get()
    }

    pub fn pub_count(&self) -> u64 {
        self.pub_count.get()
    }

    pub fn req_count(&self) -> u64 {
        self.req_count.get()
    }

    pub fn res_count(&self) -> u64 {
        self.res_count.get()
    }

    /// Drop every endpoint, subscription and pending request
    pub fn dispose(&self) {
        self.endpoints.borrow_mut().clear();
        self.subscriptions.borrow_mut().clear();
        self.resolved.borrow_mut().clear();
        self.pending.borrow_mut().clear();
        log::debug!("{}: disposed", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn bus() -> MessageBus {
        MessageBus::new(TraderId::new("TESTER-001"), None)
    }

    fn custom(n: i64) -> Message {
        Message::Custom(serde_json::json!(n))
    }

    fn recording(id: &str, log: &Rc<RefCell<Vec<String>>>) -> MessageHandler {
        let log = log.clone();
        let name = id.to_string();
        MessageHandler::new(id, move |_msg: &Message| {
            log.borrow_mut().push(name.clone());
            Ok(())
        })
    }

    #[test]
    fn test_register_send_and_deregister() {
        let bus = bus();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.register("Engine.execute", recording("h", &log)).unwrap();

        assert_eq!(
            bus.register("Engine.execute", recording("h2", &log)),
            Err(BusError::EndpointAlreadyRegistered("Engine.execute".into()))
        );
        bus.send("Engine.execute", &custom(1)).unwrap();
        assert_eq!(*log.borrow(), vec!["h"]);

        assert!(bus.deregister("Engine.execute"));
        assert_eq!(
            bus.send("Engine.execute", &custom(2)),
            Err(BusError::NoEndpoint("Engine.execute".into()))
        );
        assert_eq!(bus.sent_count(), 1);
    }

    #[test]
    fn test_failing_subscriber_does_not_stop_delivery() {
        let bus = bus();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe(
            "a.*",
            MessageHandler::new("boom", |_msg: &Message| anyhow::bail!("boom")),
            5,
        );
        bus.subscribe("a.*", recording("ok", &log), 1);

        assert_eq!(bus.publish("a.b", &custom(1)), 2);
        assert_eq!(*log.borrow(), vec!["ok"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = bus();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe("a.*", recording("x", &log), 0);
        bus.publish("a.b", &custom(1));
        assert!(bus.unsubscribe("a.*", "x"));
        assert!(!bus.unsubscribe("a.*", "x"));
        bus.publish("a.b", &custom(2));

        assert_eq!(log.borrow().len(), 1);
        assert!(!bus.has_subscribers("a.b"));
    }

    #[test]
    fn test_request_response_routes_once() {
        let bus = Rc::new(bus());
        let answered = Rc::new(RefCell::new(Vec::new()));
        bus.register(
            "Svc.request",
            MessageHandler::new("svc", |_msg: &Message| Ok(())),
        )
        .unwrap();

        let id = Uuid::new_v4();
        let sink = answered.clone();
        bus.request(
            "Svc.request",
            &custom(1),
            id,
            Box::new(move |msg: &Message| {
                sink.borrow_mut().push(msg.clone());
                Ok(())
            }),
        )
        .unwrap();
        assert!(bus.is_pending_request(&id));

        bus.response(id, &custom(42)).unwrap();
        assert_eq!(
            bus.response(id, &custom(43)),
            Err(BusError::UnknownCorrelationId(id))
        );
        assert_eq!(*answered.borrow(), vec![custom(42)]);
    }

    #[test]
    fn test_request_to_missing_endpoint_keeps_nothing_pending() {
        let bus = bus();
        let id = Uuid::new_v4();
        let result = bus.request("Nope", &custom(1), id, Box::new(|_msg: &Message| Ok(())));
        assert_eq!(result, Err(BusError::NoEndpoint("Nope".into())));
        assert!(!bus.is_pending_request(&id));
    }

    #[test]
    fn test_handler_may_publish_reentrantly() {
        let bus = Rc::new(bus());
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = bus.clone();
        bus.subscribe(
            "outer",
            MessageHandler::new("relay", move |msg: &Message| {
                inner.publish("inner", msg);
                Ok(())
            }),
            0,
        );
        bus.subscribe("inner", recording("leaf", &log), 0);

        bus.publish("outer", &custom(1));
        assert_eq!(*log.borrow(), vec!["leaf"]);
    }
}
