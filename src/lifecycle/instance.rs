use std::collections::VecDeque;

use tokio::task::JoinHandle;

use crate::settings::Settings;

/// Where a key is in its lifecycle. `Removed` is what a lookup of an id with
/// no entry reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Unconfigured,
    Loading,
    Displaying,
    ErrorDisplaying,
    Removed,
}

/// A repeating tick task. Aborted when dropped, so releasing the owning
/// entry always releases its timer.
pub(crate) struct Timer {
    pub(crate) id: u64,
    handle: JoinHandle<()>,
}

impl Timer {
    pub(crate) fn new(id: u64, handle: JoinHandle<()>) -> Self {
        Self { id, handle }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// Echoes the host never delivers must not pile up.
const MAX_PENDING_WRITES: usize = 8;

/// Controller-side record of one visible key.
pub(crate) struct ButtonInstance {
    pub(crate) settings: Settings,
    pub(crate) state: ButtonState,
    pub(crate) generation: u64,
    pub(crate) timer: Option<Timer>,
    /// Contents this controller wrote for the key whose echo has not come
    /// back yet, oldest first.
    pub(crate) pending_writes: VecDeque<Settings>,
    /// Last good reading.
    pub(crate) cached: Option<String>,
    pub(crate) failures: u32,
}

impl ButtonInstance {
    pub(crate) fn new(settings: Settings) -> Self {
        Self {
            settings,
            state: ButtonState::Unconfigured,
            generation: 0,
            timer: None,
            pending_writes: VecDeque::new(),
            cached: None,
            failures: 0,
        }
    }

    pub(crate) fn stop_timer(&mut self) {
        self.timer = None;
    }

    /// Remembers a write so its echo can be recognised.
    pub(crate) fn expect_echo(&mut self, written: Settings) {
        if self.pending_writes.len() == MAX_PENDING_WRITES {
            self.pending_writes.pop_front();
        }
        self.pending_writes.push_back(written);
    }

    /// If `incoming` is the echo of an outstanding write, forgets that write
    /// and every older one. Returns whether newer writes are still pending.
    pub(crate) fn take_echo(&mut self, incoming: &Settings) -> Option<bool> {
        let pos = self.pending_writes.iter().position(|w| w == incoming)?;
        self.pending_writes.drain(..=pos);
        Some(!self.pending_writes.is_empty())
    }

    pub(crate) fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            state: self.state,
            generation: self.generation,
            timer: self.timer.as_ref().map(|t| t.id),
            failures: self.failures,
            settings: self.settings.clone(),
            cached: self.cached.clone(),
            pending_writes: self.pending_writes.len(),
        }
    }
}

/// Read-only copy of a key's record.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceSnapshot {
    pub state: ButtonState,
    pub generation: u64,
    /// Id of the running timer, if any. A restart always yields a new id.
    pub timer: Option<u64>,
    pub failures: u32,
    pub settings: Settings,
    pub cached: Option<String>,
    /// Writes still waiting for their echo.
    pub pending_writes: usize,
}
