//! This module provides reusable test utilities:
//! - Mock HTTP servers (command agent, search index, download mirror)
//! - In-memory blob store with call recording
//! - Executors with scripted failures
//! - Log tree and configuration directory builders

// Not every test binary uses every fixture
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod memory_store;
pub mod mock_agent;
pub mod mock_index;
pub mod scripted_executor;
pub mod test_config;
pub mod test_data;

// Re-export commonly used items
pub use memory_store::MemoryStore;
pub use mock_agent::MockAgentServer;
pub use mock_index::MockIndexServer;
pub use scripted_executor::ScriptedExecutor;
pub use test_config::TestConfigBuilder;
pub use test_data::*;
