//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one node task (or the
//! whole pipeline) against the mocks in `mock_hw`. All tests run on the
//! host with no real hardware or broker.

mod mock_hw;
mod pipeline_tests;
mod publisher_tests;
mod session_tests;
