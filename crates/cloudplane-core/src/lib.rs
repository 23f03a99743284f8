// # cloudplane-core
//
// Core library for cloudplane resource providers.
//
// ## Architecture Overview
//
// This library provides what every provider crate builds on:
// - **Resource / DataSource**: Traits for CRUD handlers and read-only lookups
// - **Waiter**: Poll-converge loop that waits for asynchronous remote changes
// - **KeyedMutex**: Process-wide named locks for shared-parent mutations
// - **CompositeId**: `/`-joined resource identities
// - **ResourceRegistry**: Plugin-based registry of handlers by type name
// - **RestClient**: Bearer-authenticated JSON client used by vendor clients
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from vendor clients
// 2. **Plugin-Based**: Provider crates register their handlers, no hard-coded dispatch
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Delete of an absent entity succeeds, read of one clears its ID

pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod lock;
pub mod poll;
pub mod registry;
pub mod resource;

// Re-export core types for convenience
pub use config::ProviderConfig;
pub use error::{Error, Result};
pub use http::RestClient;
pub use identity::CompositeId;
pub use lock::KeyedMutex;
pub use poll::{PollSettings, Refresh, RefreshFn, Refreshed, Waiter};
pub use registry::{Request, ResourceRegistry};
pub use resource::{DataSource, Operation, Outcome, Resource, ResourceData, Timeouts};
