//! The ambient session value.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A user-opaque value shared by every request on a host.
///
/// The session rides each [`RequestContext`](crate::RequestContext) as an
/// explicit field (never thread-local state) and lives as long as the host.
/// The generated id exists for log correlation only.
#[derive(Clone)]
pub struct Session {
    id: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl Session {
    /// Wrap a user value as the host session.
    pub fn new(value: impl Any + Send + Sync) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string().into(),
            value: Arc::new(value),
        }
    }

    /// A session carrying no user value.
    pub fn empty() -> Self {
        Self::new(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Borrow the user value, if it is a `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}
