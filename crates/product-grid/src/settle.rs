//! Image settle barrier
//!
//! Each page arms its own barrier with the page's item count. Every item gets
//! one [`SettleTicket`]; settling it (on image load *or* error) consumes the
//! ticket, so an item is counted at most once. After the last ticket settles
//! the barrier runs its completion hook and resolves its [`ReadySignal`].
//!
//! There is no timeout: an image that never settles keeps the page pending.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tokio::sync::oneshot;

use crate::error::GridError;

type Hook = Box<dyn FnOnce()>;

struct BarrierState {
    expected: usize,
    settled: usize,
    on_complete: Option<Hook>,
    done: Option<oneshot::Sender<()>>,
}

impl BarrierState {
    /// Take the completion hook and sender if the count has been reached
    fn take_completion(&mut self) -> Option<(Option<Hook>, Option<oneshot::Sender<()>>)> {
        if self.settled == self.expected && self.done.is_some() {
            Some((self.on_complete.take(), self.done.take()))
        } else {
            None
        }
    }
}

fn complete((hook, done): (Option<Hook>, Option<oneshot::Sender<()>>)) {
    if let Some(hook) = hook {
        hook();
    }
    if let Some(done) = done {
        // Receiver may already be gone; nobody is waiting then
        let _ = done.send(());
    }
}

pub struct SettleBarrier;

impl SettleBarrier {
    /// Arm a barrier for `expected` items.
    ///
    /// Returns exactly `expected` tickets. With `expected == 0` the hook runs
    /// immediately and the signal is already resolved.
    pub fn arm(
        expected: usize,
        on_complete: impl FnOnce() + 'static,
    ) -> (Vec<SettleTicket>, ReadySignal) {
        let (tx, rx) = oneshot::channel();
        let state = Rc::new(RefCell::new(BarrierState {
            expected,
            settled: 0,
            on_complete: Some(Box::new(on_complete)),
            done: Some(tx),
        }));

        let tickets = (0..expected)
            .map(|index| SettleTicket {
                state: state.clone(),
                index,
                on_settle: None,
            })
            .collect();

        let completion = state.borrow_mut().take_completion();
        if let Some(completion) = completion {
            tracing::trace!("settle barrier armed with no items, completing immediately");
            complete(completion);
        }

        let signal = ReadySignal { rx, state };
        (tickets, signal)
    }
}

/// Single-use token for one item's image settle
pub struct SettleTicket {
    state: Rc<RefCell<BarrierState>>,
    index: usize,
    on_settle: Option<Hook>,
}

impl SettleTicket {
    /// Position of this ticket's item within its page
    pub fn index(&self) -> usize {
        self.index
    }

    /// Run `hook` when this ticket settles, before the barrier is counted down.
    /// Replaces any previously attached hook.
    pub fn on_settle(mut self, hook: impl FnOnce() + 'static) -> Self {
        self.on_settle = Some(Box::new(hook));
        self
    }

    /// Mark the item settled. Load and error are counted the same.
    pub fn settle(mut self) {
        if let Some(hook) = self.on_settle.take() {
            hook();
        }

        let completion = {
            let mut state = self.state.borrow_mut();
            state.settled += 1;
            debug_assert!(state.settled <= state.expected, "more settles than tickets");
            tracing::trace!("item {} settled ({}/{})", self.index, state.settled, state.expected);
            state.take_completion()
        };
        if let Some(completion) = completion {
            complete(completion);
        }
    }
}

impl fmt::Debug for SettleTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettleTicket").field("index", &self.index).finish()
    }
}

/// A ticket shared by several event sources, of which only the first settles.
///
/// An image reports through both a `load` and an `error` listener; each holds
/// a clone and calls [`settle`](Self::settle) when it fires.
#[derive(Clone, Debug)]
pub struct SharedTicket(Rc<RefCell<Option<SettleTicket>>>);

impl SharedTicket {
    pub fn new(ticket: SettleTicket) -> Self {
        Self(Rc::new(RefCell::new(Some(ticket))))
    }

    /// Settle the ticket if no other clone has. Returns whether this call settled it.
    pub fn settle(&self) -> bool {
        let pending = self.0.borrow_mut().take();
        match pending {
            Some(ticket) => {
                ticket.settle();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.0.borrow().is_some()
    }
}

impl From<SettleTicket> for SharedTicket {
    fn from(ticket: SettleTicket) -> Self {
        Self::new(ticket)
    }
}

/// Resolves once every ticket of its barrier has settled
pub struct ReadySignal {
    rx: oneshot::Receiver<()>,
    state: Rc<RefCell<BarrierState>>,
}

impl ReadySignal {
    /// Items settled so far
    pub fn settled(&self) -> usize {
        self.state.borrow().settled
    }

    pub fn expected(&self) -> usize {
        self.state.borrow().expected
    }

    pub fn is_complete(&self) -> bool {
        let state = self.state.borrow();
        state.settled == state.expected
    }

    /// Wait for the barrier.
    ///
    /// Fails with [`GridError::SettleAbandoned`] only if every outstanding
    /// ticket was dropped without settling.
    pub async fn wait(self) -> Result<(), GridError> {
        let ReadySignal { rx, state } = self;
        // Release our handle on the sender so dropped tickets close the channel
        drop(state);
        rx.await.map_err(|_| GridError::SettleAbandoned)
    }
}
