//! ID generation utilities.

use ulid::Ulid;
use uuid::Uuid;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new lowercase ULID.
    ///
    /// Row ids for posts, schedules, usage entries and activity entries are
    /// ULIDs so that ordering by id follows creation order.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate an opaque run identifier for log correlation.
    #[must_use]
    pub fn generate_run_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
