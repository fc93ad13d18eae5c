//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters and the simulated plugs.  Everything runs on the
//! host; the worker threads are real.

mod dispatcher_tests;
mod mock_hw;
mod notify_tests;
mod service_tests;
