use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::packet::Advertisement;

/// Timer and state of a single virtual router. Only the decision loop
/// touches it.
#[derive(Debug, Clone, Default)]
pub struct VirtualRouterMachine {
    pub timer: Timer,
    pub state: States,
}

impl VirtualRouterMachine {
    pub fn set_advert_timer(&mut self, duration: Duration) {
        self.timer = Timer::new(TimerType::Adver, duration);
    }

    pub fn set_master_down_timer(&mut self, duration: Duration) {
        self.timer = Timer::new(TimerType::MasterDown, duration);
    }

    pub fn disable_timer(&mut self) {
        self.timer = Timer::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum States {
    #[default]
    Init,
    Backup,
    Master,
}

impl fmt::Display for States {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            States::Init => write!(f, "INIT"),
            States::Backup => write!(f, "BACKUP"),
            States::Master => write!(f, "MASTER"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    pub t_type: TimerType,
    pub waiting_for: Option<Instant>,
}

impl Timer {
    pub fn new(t_type: TimerType, duration: Duration) -> Self {
        Self {
            t_type,
            waiting_for: Some(Instant::now() + duration),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.waiting_for.is_some()
    }

    /// Time left before the timer fires, if it is armed.
    pub fn remaining(&self) -> Option<Duration> {
        self.waiting_for
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerType {
    #[default]
    Null,
    MasterDown,
    Adver,
}

/// Everything the decision loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Startup,
    Shutdown,
    MasterDown,
    AdverTimer,
    Advert(Advertisement),
}

impl Event {
    /// The event an expiring timer of `t_type` raises.
    pub fn from_timer(t_type: TimerType) -> Option<Self> {
        match t_type {
            TimerType::MasterDown => Some(Event::MasterDown),
            TimerType::Adver => Some(Event::AdverTimer),
            TimerType::Null => None,
        }
    }
}
