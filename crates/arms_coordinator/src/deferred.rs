//! Deferred action queues.
//!
//! Processors must not destroy or spawn things while a match set is being
//! iterated. Instead they queue an action here, and the coordinator drains
//! the queue at a fixed checkpoint: the end of the current phase, or the end
//! of the frame.
//!
//! A failing action (an `Err` or a panic) is logged and recorded in the
//! [`DrainReport`]; the drain carries on with the next action.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use tracing::{error, trace};

/// A callback queued for a later checkpoint.
pub type DeferredAction = Box<dyn FnOnce() -> anyhow::Result<()>>;

/// A deferred action that failed while draining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredFailure {
    /// Which queue the action came from.
    pub queue: &'static str,
    /// Zero-based position of the action within this drain.
    pub position: usize,
    /// The error or panic message.
    pub message: String,
}

/// Outcome of draining a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions run, including failed ones.
    pub executed: usize,
    pub failures: Vec<DeferredFailure>,
}

impl DrainReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A FIFO of [`DeferredAction`]s.
pub struct DeferredQueue {
    label: &'static str,
    actions: RefCell<VecDeque<DeferredAction>>,
}

impl DeferredQueue {
    /// Create an empty queue. `label` names it in logs and failures.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            actions: RefCell::new(VecDeque::new()),
        }
    }

    pub fn push<F>(&self, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.actions.borrow_mut().push_back(Box::new(action));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.borrow().is_empty()
    }

    /// Run actions in FIFO order until the queue is empty, including any
    /// actions queued by the actions themselves.
    pub fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            // The borrow must end before the action runs: actions may push.
            let Some(action) = self.actions.borrow_mut().pop_front() else {
                break;
            };
            let position = report.executed;
            report.executed += 1;

            let message = match panic::catch_unwind(AssertUnwindSafe(action)) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{err:#}"),
                Err(payload) => panic_message(payload.as_ref()),
            };
            error!(queue = self.label, position, %message, "deferred action failed");
            report.failures.push(DeferredFailure {
                queue: self.label,
                position,
                message,
            });
        }
        if report.executed > 0 {
            trace!(queue = self.label, executed = report.executed, "drained deferred actions");
        }
        report
    }
}

impl std::fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("label", &self.label)
            .field("len", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn recorder() -> Rc<RefCell<Vec<u32>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_drain_runs_in_fifo_order() {
        let queue = DeferredQueue::new("test");
        let log = recorder();
        for i in 0..3 {
            let log = log.clone();
            queue.push(move || {
                log.borrow_mut().push(i);
                Ok(())
            });
        }
        assert_eq!(queue.len(), 3);

        let report = queue.drain();
        assert_eq!(report.executed, 3);
        assert!(report.is_clean());
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_failure_does_not_block_later_actions() {
        let queue = DeferredQueue::new("test");
        let log = recorder();

        queue.push(|| anyhow::bail!("boom"));
        let l = log.clone();
        queue.push(move || {
            l.borrow_mut().push(1);
            Ok(())
        });

        let report = queue.drain();
        assert_eq!(report.executed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].position, 0);
        assert_eq!(report.failures[0].message, "boom");
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn test_panic_is_isolated() {
        let queue = DeferredQueue::new("test");
        let log = recorder();

        queue.push(|| panic!("kaboom"));
        let l = log.clone();
        queue.push(move || {
            l.borrow_mut().push(7);
            Ok(())
        });

        let report = queue.drain();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("kaboom"));
        assert_eq!(*log.borrow(), vec![7]);
    }

    #[test]
    fn test_actions_queued_while_draining_run_in_same_drain() {
        let queue = Rc::new(DeferredQueue::new("test"));
        let log = recorder();

        let q = queue.clone();
        let l = log.clone();
        queue.push(move || {
            l.borrow_mut().push(1);
            let l = l.clone();
            q.push(move || {
                l.borrow_mut().push(2);
                Ok(())
            });
            Ok(())
        });

        let report = queue.drain();
        assert_eq!(report.executed, 2);
        assert_eq!(*log.borrow(), vec![1, 2]);
    }
}
