//! State shared with the callback listener's handlers.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use url::Url;

/// State shared across the callback listener's handlers.
///
/// Cloned into every handler; the sender can be taken exactly once.
#[derive(Clone)]
pub struct CallbackState {
    /// `http://host:port` of the listener, used to rebuild absolute URLs.
    pub origin: String,
    /// Channel to the bridge waiting on the redirect; emptied by the first callback.
    sender: Arc<Mutex<Option<oneshot::Sender<Url>>>>,
}

impl CallbackState {
    /// State for a listener bound to `addr` that reports to `sender`.
    pub fn new(addr: SocketAddr, sender: oneshot::Sender<Url>) -> Self {
        CallbackState {
            origin: format!("http://{}", addr),
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// The channel to the waiting bridge, or `None` once a callback was taken.
    pub fn take_sender(&self) -> Option<oneshot::Sender<Url>> {
        self.sender.lock().ok()?.take()
    }
}
