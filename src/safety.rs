//! Safety supervisor.
//!
//! The supervisor runs **every tick before the hysteresis logic** and keeps
//! a latched fault bitmask.  The engine forces every actuator off while any
//! fault is set.
//!
//! ## Fault lifecycle
//!
//! 1. A condition triggers a fault (authoritative sensor lost, limits
//!    inconsistent).
//! 2. The supervisor sets the bit, logs **once**, and reports it as
//!    `raised` for this tick only.  The engine uses that edge to queue one
//!    notification per incident.
//! 3. Each tick the condition is re-evaluated.  While it persists nothing is
//!    logged again.
//! 4. When the condition clears the bit is unset, logged once, and reported
//!    as `cleared`, re-arming the incident.

use core::fmt;

use log::{error, info};

/// Latched safety faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// The authoritative sensor is stale and its grace period has passed.
    SensorLost = 0b0000_0001,
    /// Low / high limits are inconsistent.
    InvalidLimits = 0b0000_0010,
}

impl SafetyFault {
    pub const ALL: [SafetyFault; 2] = [SafetyFault::SensorLost, SafetyFault::InvalidLimits];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorLost => write!(f, "authoritative sensor lost"),
            Self::InvalidLimits => write!(f, "invalid temperature limits"),
        }
    }
}

/// Fault bits that changed during one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultEdges {
    pub raised: u8,
    pub cleared: u8,
}

impl FaultEdges {
    pub fn raised(&self, fault: SafetyFault) -> bool {
        self.raised & fault.mask() != 0
    }

    pub fn cleared(&self, fault: SafetyFault) -> bool {
        self.cleared & fault.mask() != 0
    }
}

/// Safety supervisor.
#[derive(Debug, Default)]
pub struct SafetySupervisor {
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self { faults: 0 }
    }

    /// Evaluate all safety conditions for this tick.
    pub fn evaluate(&mut self, sensor_lost: bool, limits_invalid: bool) -> FaultEdges {
        let mut edges = FaultEdges::default();
        self.eval_fault(SafetyFault::InvalidLimits, limits_invalid, &mut edges);
        // A sensor loss cannot be judged while the limits are broken; leave
        // its latch untouched so the incident is not re-raised afterwards.
        if !limits_invalid {
            self.eval_fault(SafetyFault::SensorLost, sensor_lost, &mut edges);
        }
        edges
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool, edges: &mut FaultEdges) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
                edges.raised |= fault.mask();
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
                edges.cleared |= fault.mask();
            }
            self.faults &= !fault.mask();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raised_once_per_incident() {
        let mut s = SafetySupervisor::new();
        let first = s.evaluate(true, false);
        assert!(first.raised(SafetyFault::SensorLost));
        for _ in 0..5 {
            let again = s.evaluate(true, false);
            assert_eq!(again, FaultEdges::default());
        }
        assert!(s.has_fault(SafetyFault::SensorLost));
    }

    #[test]
    fn clearing_rearms() {
        let mut s = SafetySupervisor::new();
        s.evaluate(true, false);
        let cleared = s.evaluate(false, false);
        assert!(cleared.cleared(SafetyFault::SensorLost));
        assert!(!s.has_faults());
        let second = s.evaluate(true, false);
        assert!(second.raised(SafetyFault::SensorLost));
    }

    #[test]
    fn sensor_latch_frozen_while_limits_invalid() {
        let mut s = SafetySupervisor::new();
        s.evaluate(true, false);
        let edges = s.evaluate(false, true);
        assert!(edges.raised(SafetyFault::InvalidLimits));
        assert!(!edges.cleared(SafetyFault::SensorLost));
        assert!(s.has_fault(SafetyFault::SensorLost));
    }

    #[test]
    fn independent_faults() {
        let mut s = SafetySupervisor::new();
        s.evaluate(false, true);
        assert!(s.has_fault(SafetyFault::InvalidLimits));
        assert!(!s.has_fault(SafetyFault::SensorLost));
        assert_eq!(s.faults(), SafetyFault::InvalidLimits.mask());
    }
}
