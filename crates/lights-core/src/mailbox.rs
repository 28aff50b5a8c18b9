//! Depth-one mailbox between request producers and the fade controller
//!
//! Producers block while a request is still waiting to be picked up, so no
//! request is ever dropped.

use std::fmt;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

use crate::fade::FadeRequest;
use crate::output::StatusIndicator;

/// The fade controller is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxClosed;

impl fmt::Display for MailboxClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fade mailbox closed")
    }
}

impl std::error::Error for MailboxClosed {}

pub fn fade_mailbox() -> (FadeSender, FadeReceiver) {
    let (tx, rx) = sync_channel(1);
    (FadeSender { tx }, FadeReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct FadeSender {
    tx: SyncSender<FadeRequest>,
}

impl FadeSender {
    /// Post a request, waiting for the slot to free up
    pub fn send(&self, request: FadeRequest) -> Result<(), MailboxClosed> {
        log::info!("Fade request: {:?}", request);
        self.tx.send(request).map_err(|_| MailboxClosed)
    }

    /// Like [`send`](Self::send), with the status LED lit while blocked
    pub fn send_signalled(
        &self,
        request: FadeRequest,
        indicator: &mut StatusIndicator<'_>,
    ) -> Result<(), MailboxClosed> {
        indicator.pulse(|| self.send(request))
    }
}

#[derive(Debug)]
pub struct FadeReceiver {
    rx: Receiver<FadeRequest>,
}

impl FadeReceiver {
    /// Wait for the next request; `None` once every sender is dropped
    pub fn recv(&self) -> Option<FadeRequest> {
        self.rx.recv().ok()
    }
}
