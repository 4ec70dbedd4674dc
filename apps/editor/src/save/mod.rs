pub mod resolver;
pub mod scheduler;

pub use resolver::{PersistenceResolver, PersistenceTarget, SaveOutcome};
pub use scheduler::{SaveFailure, SaveKind, SaveScheduler, SaveStatus};
