//! Administrative service sessions and their collaborators

use ember_core::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A server security database account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub user_id: i64,
    pub group_id: i64,
}

/// An attached administrative session
pub trait ServiceSession: Send {
    /// Accounts of the server's security database
    fn users(&mut self) -> Result<Vec<User>>;
}

/// Opens administrative sessions against a server endpoint
pub trait ServiceConnector: Send + Sync {
    fn connect(
        &self,
        connection_string: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn ServiceSession>>;
}

impl<T: ServiceConnector> ServiceConnector for Arc<T> {
    fn connect(
        &self,
        connection_string: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn ServiceSession>> {
        (**self).connect(connection_string, username, password)
    }
}

/// Progress and cancellation for long running operations.
///
/// Cancellation is cooperative: it is polled before each attempt.
pub trait ProgressIndicator {
    fn init_progress(&mut self, message: &str, steps: usize);

    fn set_progress_message(&mut self, message: &str);

    fn step_progress(&mut self);

    fn is_canceled(&self) -> bool;
}
