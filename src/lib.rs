//! Reactive controller core of the `bp` admin console
//!
//! Feature modules (configuration editor, ACL editor, service control, log
//! tail, system info) each own a [`store::Store`], drive backend calls
//! through [`service::ServiceCall`] wrappers and are mounted/unmounted via
//! [`store::ModuleHandle`]. Rendering is out of scope: anything that can
//! subscribe to a `tokio::sync::watch` receiver can draw the state.

pub mod config;
pub mod modules;
pub mod poll;
pub mod service;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;
