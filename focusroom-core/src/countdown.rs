//! Locally ticking countdown, seeded and periodically corrected by the server.

use crate::scheduler::{Scheduler, TimerId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

pub const TICK_MS: u32 = 1000;
/// Drift-tolerant timers ignore server values within this many seconds.
pub const DRIFT_TOLERANCE_SECS: u64 = 2;
pub const DEFAULT_TITLE: &str = "Focus Room";
pub const BREAK_TIMER_ID: &str = "break-timer";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MountError {
    #[error("timer element has no data-seconds-remaining")]
    MissingSeconds,
    #[error("invalid data-seconds-remaining: {0:?}")]
    InvalidSeconds(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResyncPolicy {
    /// Plain countdown: every server value wins.
    Strict,
    /// Autostart countdown: only snap when drift exceeds the tolerance.
    DriftTolerant,
}

/// Minutes and zero-padded seconds of a (clamped) remaining time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockFace {
    pub minutes: i64,
    pub seconds: i64,
}

impl ClockFace {
    pub fn from_seconds(total: i64) -> Self {
        let total = total.max(0);
        Self {
            minutes: total / 60,
            seconds: total % 60,
        }
    }

    pub fn seconds_text(&self) -> String {
        format!("{:02}", self.seconds)
    }
}

impl fmt::Display for ClockFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

pub fn format_clock(seconds: i64) -> String {
    ClockFace::from_seconds(seconds).to_string()
}

/// Whether a timer element shows a break phase.
pub fn is_break_phase(element_id: Option<&str>, phase: Option<&str>) -> bool {
    element_id == Some(BREAK_TIMER_ID) || phase.is_some_and(|p| p.trim() == "break")
}

/// What a host element tells us at mount and on each server update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerMount {
    pub seconds: i64,
    pub is_break: bool,
    pub policy: ResyncPolicy,
}

impl TimerMount {
    /// Read `data-seconds-remaining`, `data-phase` and `data-autostart`
    /// through `attr` (attribute lookup by full name).
    pub fn from_attributes(
        element_id: Option<&str>,
        attr: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MountError> {
        let raw = attr("data-seconds-remaining").ok_or(MountError::MissingSeconds)?;
        let seconds = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| MountError::InvalidSeconds(raw.clone()))?;
        let phase = attr("data-phase");
        let policy = match attr("data-autostart").as_deref() {
            Some("false") | None => ResyncPolicy::Strict,
            Some(_) => ResyncPolicy::DriftTolerant,
        };
        Ok(Self {
            seconds,
            is_break: is_break_phase(element_id, phase.as_deref()),
            policy,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tick {
    pub redraw: bool,
    pub alert: bool,
}

/// Pure counter state; no scheduling.
#[derive(Clone, Debug)]
pub struct Countdown {
    remaining: i64,
    is_break: bool,
    policy: ResyncPolicy,
    alerted: bool,
}

impl Countdown {
    pub fn new(seconds: i64, is_break: bool, policy: ResyncPolicy) -> Self {
        Self {
            remaining: seconds,
            is_break,
            policy,
            alerted: seconds <= 0,
        }
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    pub fn is_break(&self) -> bool {
        self.is_break
    }

    pub fn policy(&self) -> ResyncPolicy {
        self.policy
    }

    pub fn face(&self) -> ClockFace {
        ClockFace::from_seconds(self.remaining)
    }

    pub fn tick(&mut self) -> Tick {
        self.remaining = self.remaining.saturating_sub(1);
        let mut tick = Tick {
            redraw: self.remaining >= 0,
            alert: false,
        };
        if self.remaining == 0 && !self.is_break && !self.alerted {
            self.alerted = true;
            tick.alert = true;
        }
        tick
    }

    /// Apply a server value. Returns whether the local counter was replaced.
    pub fn resync(&mut self, server_seconds: i64, is_break: bool) -> bool {
        self.is_break = is_break;
        let snap = match self.policy {
            ResyncPolicy::Strict => true,
            ResyncPolicy::DriftTolerant => {
                self.remaining.abs_diff(server_seconds) > DRIFT_TOLERANCE_SECS
            }
        };
        if snap {
            self.remaining = server_seconds;
            if server_seconds > 0 {
                self.alerted = false;
            }
        }
        snap
    }
}

/// Display side of a mounted timer element.
pub trait TimerDisplay {
    /// Redraw the minute and second segments.
    fn render(&self, face: ClockFace);
    fn set_page_title(&self, title: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    Ticking,
    Stopped,
}

struct TimerCore {
    countdown: Countdown,
    display: Box<dyn TimerDisplay>,
    on_alert: Rc<dyn Fn()>,
    state: TimerState,
    /// The page title shows this timer; restore it on unmount.
    wrote_title: bool,
}

impl TimerCore {
    fn redraw(&mut self) {
        let face = self.countdown.face();
        self.display.render(face);
        if !self.countdown.is_break() {
            self.display
                .set_page_title(&format!("{face} · {DEFAULT_TITLE}"));
            self.wrote_title = true;
        }
    }
}

/// A mounted countdown owning its 1-second interval. Dropping it unmounts.
pub struct CountdownTimer {
    core: Rc<RefCell<TimerCore>>,
    scheduler: Rc<dyn Scheduler>,
    interval: Cell<Option<TimerId>>,
}

impl CountdownTimer {
    pub fn mount(
        mount: TimerMount,
        display: Box<dyn TimerDisplay>,
        scheduler: Rc<dyn Scheduler>,
        on_alert: Rc<dyn Fn()>,
    ) -> Self {
        let core = Rc::new(RefCell::new(TimerCore {
            countdown: Countdown::new(mount.seconds, mount.is_break, mount.policy),
            display,
            on_alert,
            state: TimerState::Ticking,
            wrote_title: false,
        }));
        core.borrow_mut().redraw();

        let weak: Weak<RefCell<TimerCore>> = Rc::downgrade(&core);
        let interval = scheduler.set_interval(
            TICK_MS,
            Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    Self::tick(&core);
                }
            }),
        );
        if interval.is_none() {
            log::warn!("Countdown interval refused; timer will only follow server updates");
        }

        Self {
            core,
            scheduler,
            interval: Cell::new(interval),
        }
    }

    fn tick(core: &Rc<RefCell<TimerCore>>) {
        let alert = {
            let mut c = core.borrow_mut();
            if c.state == TimerState::Stopped {
                return;
            }
            let tick = c.countdown.tick();
            if tick.redraw {
                c.redraw();
            }
            tick.alert.then(|| Rc::clone(&c.on_alert))
        };
        if let Some(on_alert) = alert {
            log::info!("Countdown reached zero");
            on_alert();
        }
    }

    /// Server pushed a new remaining value for this element.
    pub fn update(&self, mount: TimerMount) {
        let mut c = self.core.borrow_mut();
        if c.state == TimerState::Stopped {
            return;
        }
        let local = c.countdown.remaining();
        if !c.countdown.resync(mount.seconds, mount.is_break) {
            log::debug!(
                "Drift {} within tolerance, keeping local {local}",
                local.abs_diff(mount.seconds)
            );
        }
        c.redraw();
    }

    /// Element removed: stop ticking and restore the page title.
    pub fn unmount(&self) {
        if let Some(id) = self.interval.take() {
            self.scheduler.clear_interval(id);
        }
        let mut c = self.core.borrow_mut();
        if c.state == TimerState::Stopped {
            return;
        }
        c.state = TimerState::Stopped;
        if c.wrote_title {
            c.display.set_page_title(DEFAULT_TITLE);
        }
    }

    pub fn state(&self) -> TimerState {
        self.core.borrow().state
    }

    pub fn remaining(&self) -> i64 {
        self.core.borrow().countdown.remaining()
    }

    pub fn is_break(&self) -> bool {
        self.core.borrow().countdown.is_break()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.unmount();
    }
}
