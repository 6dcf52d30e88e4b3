//! Filter radius and the shared cell it lives in.
//!
//! The radius is updated from outside the job path (the HTTP control surface
//! today) and read exactly once at the start of every job. The cell is a
//! watch channel: readers take a copy of the whole value, never a torn one,
//! and observers can wait for changes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Radius used when nothing else is configured.
pub const DEFAULT_RADIUS: u32 = 3;

/// Largest radius the daemon can be configured to accept.
pub const RADIUS_CEILING: u32 = 4095;

/// Box blur radius. Always odd and at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Radius(u32);

impl Radius {
    /// Coerce any integer to a valid radius: 0 becomes 1, even values are
    /// bumped to the next odd one.
    pub fn new(raw: u32) -> Self {
        match raw {
            0 => Radius(1),
            n if n % 2 == 0 => Radius(n.saturating_add(1)),
            n => Radius(n),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Pixels sampled on each side of the centre.
    pub fn half(self) -> usize {
        (self.0 / 2) as usize
    }

    /// Side of the square sampling window.
    pub fn window_side(self) -> usize {
        2 * self.half() + 1
    }
}

impl Default for Radius {
    fn default() -> Self {
        Radius(DEFAULT_RADIUS)
    }
}

impl From<u32> for Radius {
    fn from(raw: u32) -> Self {
        Radius::new(raw)
    }
}

impl From<Radius> for u32 {
    fn from(r: Radius) -> Self {
        r.0
    }
}

impl std::fmt::Display for Radius {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared, observable radius. Clones refer to the same value.
#[derive(Clone, Debug)]
pub struct RadiusCell {
    tx: Arc<watch::Sender<Radius>>,
}

impl RadiusCell {
    pub fn new(initial: Radius) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current value.
    pub fn current(&self) -> Radius {
        *self.tx.borrow()
    }

    /// Store a new radius, coercing it first. Returns the stored value.
    pub fn set(&self, raw: u32) -> Radius {
        let radius = Radius::new(raw);
        self.tx.send_replace(radius);
        radius
    }

    /// Receiver notified on every update.
    pub fn subscribe(&self) -> watch::Receiver<Radius> {
        self.tx.subscribe()
    }
}

impl Default for RadiusCell {
    fn default() -> Self {
        Self::new(Radius::default())
    }
}
