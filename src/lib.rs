//! wampease - a forgiving WAMP client facade
//!
//! This is the main convenience crate that re-exports all wampease sub-crates.
//! Use this crate if you want a single dependency that provides the client
//! together with the in-process router used for local development and tests.
//!
//! # Architecture
//!
//! wampease is organized into modular crates:
//!
//! - **wampease-core**: Boundary traits, argument adapter, options, errors,
//!   reconnection strategies and observability
//! - **wampease-client**: The facade with operation tracking and recovery
//! - **wampease-router**: An in-process broker/dealer with a loopback transport
//!
//! # Quick Start
//!
//! ```rust
//! use wampease::{LoopbackConnector, Procedure, Router, WampClient};
//!
//! # #[tokio::main]
//! # async fn main() -> wampease::core::Result<()> {
//! let router = Router::new("realm1");
//! let client = WampClient::new(LoopbackConnector::new(router));
//! client.connect(None).await?;
//!
//! client
//!     .register(Procedure::new("com.math.add2", |(a, b): (i64, i64)| async move { Ok(a + b) }))
//!     .await?;
//! let sum: i64 = client.call("com.math.add2", (2, 2)).await?;
//! assert_eq!(sum, 4);
//!
//! client
//!     .subscribe("com.example.numbers", |(n1, n2): (i64, i64)| async move {
//!         println!("{n1} {n2}");
//!     })
//!     .await?;
//! client.publish("com.example.numbers", (1, 2)).await?;
//!
//! client.disconnect(None, None).await?;
//! # Ok(())
//! # }
//! ```

// Re-export all public APIs from sub-crates
pub use wampease_client as client;
pub use wampease_core as core;
pub use wampease_router as router;

// Convenience re-exports of the most commonly used types
pub use wampease_client::{Procedure, WampClient};
pub use wampease_router::{LoopbackConnector, Router};
