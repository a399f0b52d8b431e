//! Timer seam. Every tick, fade cleanup and panel animation goes through a
//! [`Scheduler`] so pending callbacks can be cleared when superseded.

/// Handle returned by the host timer API (`setTimeout` / `setInterval` ids).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(pub i32);

pub type Task = Box<dyn FnOnce()>;
pub type RepeatingTask = Box<dyn FnMut()>;

pub trait Scheduler {
    /// Run `task` once after `delay_ms`. `None` if the host refused the timer.
    fn set_timeout(&self, delay_ms: u32, task: Task) -> Option<TimerId>;
    fn clear_timeout(&self, id: TimerId);
    /// Run `task` every `period_ms` until cleared.
    fn set_interval(&self, period_ms: u32, task: RepeatingTask) -> Option<TimerId>;
    fn clear_interval(&self, id: TimerId);
}

/// A scheduled one-shot timeout owned by whoever may need to clear it.
pub(crate) struct PendingTimeout {
    id: TimerId,
}

impl PendingTimeout {
    pub(crate) fn schedule(scheduler: &dyn Scheduler, delay_ms: u32, task: Task) -> Option<Self> {
        scheduler
            .set_timeout(delay_ms, task)
            .map(|id| PendingTimeout { id })
    }

    pub(crate) fn cancel(self, scheduler: &dyn Scheduler) {
        scheduler.clear_timeout(self.id);
    }
}
