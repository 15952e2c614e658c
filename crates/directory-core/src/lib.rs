//! Doctor Directory Core
//!
//! Domain logic for the doctor directory, independent of any particular
//! backend:
//! - Data model for profiles, doctor listings, ratings and claims
//! - Store contracts the backend must satisfy
//! - Rating aggregation (cached average kept consistent with ratings)
//! - Ownership and verification resolution
//! - Explicit session context and configuration
//!
//! The `memory` feature (on by default) provides an in-memory store used by
//! tests and native tooling. Zomes depend on this crate with
//! `default-features = false`.

pub mod aggregator;
pub mod config;
pub mod directory;
pub mod error;
#[cfg(feature = "memory")]
pub mod memory;
pub mod model;
pub mod pagination;
pub mod resolver;
pub mod session;
pub mod store;
pub mod validation;

// Re-export commonly used items
pub use aggregator::{average_rating, format_rating, RatingAggregator};
pub use config::DirectoryConfig;
pub use directory::{DirectoryService, DoctorView, Review};
pub use error::{ClaimError, DirectoryError, DirectoryResult};
#[cfg(feature = "memory")]
pub use memory::{InMemoryDirectory, MemoryIdentityProvider};
pub use model::*;
pub use pagination::{Page, PaginationInput};
pub use resolver::{DoctorStanding, OwnershipResolver, VerificationState, ViewerRelation};
pub use session::{IdentityProvider, Session, SessionContext};
pub use store::{
    DirectoryStore, DoctorStore, ProfileStore, RatingStore, StoreError, StoreResult,
    VerificationStore,
};
