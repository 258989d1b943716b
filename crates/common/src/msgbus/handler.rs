use std::fmt;
use std::rc::Rc;

use super::Message;

type HandlerFn = dyn Fn(&Message) -> anyhow::Result<()>;

/// A named message callback
///
/// The id identifies the handler for idempotent subscription and for
/// unsubscribing; two handlers with the same id are treated as the same
/// subscriber regardless of the closure they wrap.
#[derive(Clone)]
pub struct MessageHandler {
    id: Rc<str>,
    callback: Rc<HandlerFn>,
}

impl MessageHandler {
    pub fn new<F>(id: impl AsRef<str>, callback: F) -> Self
    where
        F: Fn(&Message) -> anyhow::Result<()> + 'static,
    {
        Self {
            id: Rc::from(id.as_ref()),
            callback: Rc::new(callback),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self, msg: &Message) -> anyhow::Result<()> {
        (self.callback)(msg)
    }
}

impl PartialEq for MessageHandler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageHandler {}

impl fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandler").field("id", &self.id).finish()
    }
}

/// One-shot callback receiving the response to a bus request
pub type ResponseCallback = Box<dyn FnOnce(&Message) -> anyhow::Result<()>>;
