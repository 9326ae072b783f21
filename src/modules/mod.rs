//! Feature modules of the console
//!
//! Each module is a [`Controller`](crate::store::Controller) with its own
//! state type. Controllers never share mutable state; the only thing they
//! have in common is the [`DeploymentRole`](crate::config::DeploymentRole)
//! fixed at startup.

pub mod acl;
pub mod configuration;
pub mod control;
pub mod logs;
pub mod system;

use crate::service::ErrorInfo;

/// Independent error slots of an editable module.
///
/// Each slot is cleared at the start of the operation that owns it and is
/// never written by any other operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBuckets {
    /// Fetching the document
    pub load: Option<ErrorInfo>,
    /// Create, save, provisioning
    pub mutate: Option<ErrorInfo>,
    /// Text view parsing
    pub code: Option<ErrorInfo>,
}

impl ErrorBuckets {
    pub fn is_empty(&self) -> bool {
        self.load.is_none() && self.mutate.is_none() && self.code.is_none()
    }

    /// First error worth showing, mutate before code before load.
    pub fn first(&self) -> Option<&ErrorInfo> {
        self.mutate
            .as_ref()
            .or(self.code.as_ref())
            .or(self.load.as_ref())
    }
}
