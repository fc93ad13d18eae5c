//! Hysteresis band decisions for heating and cooling.
//!
//! ```text
//!   °F   low            mid            high
//!  ──────┼───────────────┼──────────────┼──────▶
//!  HEAT  ON ◀── hold ───▶ OFF           │ OFF (backstop above high)
//!  COOL  OFF (backstop below low)  OFF ◀── hold ──▶ ON
//! ```
//!
//! Each decision is a pure function of the reading and the limits; the
//! engine combines it with the actuator's current state.

/// Outcome of evaluating one role against a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    TurnOn,
    TurnOff,
    /// Inside the hysteresis band: keep whatever state the actuator has.
    Hold,
}

/// Low / high limits with the derived release midpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    /// Heating: on at or below `low`, off at or above the midpoint, and
    /// always off above `high` so a missed release cannot overheat.
    pub fn heating(&self, reading: f64) -> Decision {
        if reading > self.high {
            Decision::TurnOff
        } else if reading <= self.low {
            Decision::TurnOn
        } else if reading >= self.midpoint() {
            Decision::TurnOff
        } else {
            Decision::Hold
        }
    }

    /// Cooling: mirror image of [`heating`](Self::heating).
    pub fn cooling(&self, reading: f64) -> Decision {
        if reading < self.low {
            Decision::TurnOff
        } else if reading >= self.high {
            Decision::TurnOn
        } else if reading <= self.midpoint() {
            Decision::TurnOff
        } else {
            Decision::Hold
        }
    }

    /// Apply a decision to the current state.
    pub fn next_state(decision: Decision, currently_on: bool) -> bool {
        match decision {
            Decision::TurnOn => true,
            Decision::TurnOff => false,
            Decision::Hold => currently_on,
        }
    }
}
