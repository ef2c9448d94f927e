//! Slack directory source for checkerboard.
//!
//! Reads a custom profile field from every person in a Slack workspace and
//! exposes the result as a [`checkerboard_core::ProfileSource`].
//!
//! # Example
//!
//! ```rust,ignore
//! use checkerboard_slack::{SlackConfig, SlackDirectory};
//!
//! let config = SlackConfig::new(token).with_profile_field("GitHub Username");
//! let directory = SlackDirectory::new(config)?;
//! ```
//!
//! The token needs the `users:read` and `users.profile:read` scopes.

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod retry;

pub use client::SlackClient;
pub use config::{DEFAULT_BASE_URL, DEFAULT_PROFILE_FIELD, SlackConfig};
pub use directory::SlackDirectory;
pub use error::{SlackApiError, SlackError, SlackResult};
pub use retry::{BackoffStrategy, Retry, RetryBuilder, RetryConfig};
