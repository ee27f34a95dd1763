//! Provider connectors.

#[cfg(feature = "falcon")]
pub mod falcon;
#[cfg(feature = "one_password")]
pub mod one_password;
#[cfg(any(feature = "slack", feature = "one_password"))]
mod paging;
#[cfg(feature = "slack")]
pub mod slack;
