//! # Script Bridge
//!
//! Cross-runtime reference bridge between Rust host objects and an embedded QuickJS heap.
//!
//! ## Features
//!
//! - **Value marshalling**: primitives, byte buffers (deep copied), JSON values and plain data records
//! - **Object identity**: an engine object seen twice by the host yields the same [`ScriptObject`]
//! - **Host proxies**: any [`HostObject`] appears to scripts as a callable, constructable object
//! - **Exception bridge**: errors cross in both directions with stacks from both sides merged once
//! - **Safe finalization**: either side may release its wrappers at any time; cleanup is deferred
//!   to the next context entry
//!
//! ### Example
//!
//! ```ignore
//! use script_bridge::{Bridge, CallFacade, HostValue};
//!
//! let bridge = Bridge::with_defaults()?;
//! bridge.set_global_property("greet", HostValue::function("greet", |_, _, args| {
//!     Ok(HostValue::from(format!("hello {}", args[0].as_str().unwrap_or("?"))))
//! }))?;
//! let result = bridge.evaluate("greet('world')", "main.js")?;
//! ```
//!
//! ## Modules
//!
//! - [`bridge`]: bridge context, marshalling, proxies and the call facade
//! - [`host`]: host-side value model
//! - [`config`]: configuration
//! - [`core`]: errors, logging and macros

pub mod bridge;
pub mod config;
pub mod core;
pub mod host;

pub use bridge::{open, Bridge, BridgeId, BridgeStats, CallFacade, DebugHook, Scope};
pub use config::{BridgeConfig, EngineKind, LogLevel, LoggingConfig};
pub use core::{init_logging, BridgeError, BridgeResult, HostException, MarshalError, ScriptException};
pub use host::{
    AsAny, FromHost, HostFunction, HostObject, HostObjectRef, HostValue, PropertyKey, Record,
    ScriptObject, WrapperId,
};
