use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::state_machine::States;

/// State changes a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Init2Master,
    Init2Backup,
    Master2Backup,
    Backup2Master,
    Master2Init,
    Backup2Init,
}

impl Transition {
    pub fn between(from: States, to: States) -> Option<Self> {
        match (from, to) {
            (States::Init, States::Master) => Some(Transition::Init2Master),
            (States::Init, States::Backup) => Some(Transition::Init2Backup),
            (States::Master, States::Backup) => Some(Transition::Master2Backup),
            (States::Backup, States::Master) => Some(Transition::Backup2Master),
            (States::Master, States::Init) => Some(Transition::Master2Init),
            (States::Backup, States::Init) => Some(Transition::Backup2Init),
            _ => None,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::Init2Master => "init to master",
            Transition::Init2Backup => "init to backup",
            Transition::Master2Backup => "master to backup",
            Transition::Backup2Master => "backup to master",
            Transition::Master2Init => "master to init",
            Transition::Backup2Init => "backup to init",
        };
        write!(f, "{name}")
    }
}

pub type Hook = Box<dyn FnMut() + Send + 'static>;

/// Callbacks run on the decision loop whenever the matching transition
/// happens. One hook per transition, last write wins.
#[derive(Default)]
pub struct TransitionHooks {
    hooks: HashMap<Transition, Hook>,
}

impl TransitionHooks {
    /// Returns `true` when an earlier hook for `transition` was replaced.
    pub fn enroll(&mut self, transition: Transition, hook: Hook) -> bool {
        let replaced = self.hooks.insert(transition, hook).is_some();
        if replaced {
            log::info!("hook for '{transition}' replaced");
        }
        replaced
    }

    /// Runs the hook for `transition`, if any. A panicking hook is logged
    /// and does not unwind into the decision loop.
    pub fn run(&mut self, transition: Transition) {
        if let Some(hook) = self.hooks.get_mut(&transition) {
            if panic::catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
                log::error!("hook for '{transition}' panicked");
            }
        }
    }
}

impl fmt::Debug for TransitionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}
