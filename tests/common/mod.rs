//! Common test utilities for integration tests

pub mod mock_splunk;
pub mod test_helpers;

pub use mock_splunk::MockSplunkServer;
pub use test_helpers::*;
