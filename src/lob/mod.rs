//! Large-object locators and deferred value binding.

pub mod binder;
pub mod locator;

pub use binder::{LobValue, LobValueBinder};
pub use locator::LobLocator;
