//! Store contracts
//!
//! The directory never talks to a backend directly. Each table is reached
//! through one of these traits; a relational table, a document store or a
//! DHT can sit behind them.
//!
//! Method names are distinct across traits so a single backend type can
//! implement all of them without call-site ambiguity.

use thiserror::Error;

use crate::model::*;

/// Failure reported by a backing store
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait DoctorStore {
    fn get_doctor(&self, id: &DoctorId) -> StoreResult<Option<DoctorRecord>>;

    fn list_doctors(&self, filter: &DoctorFilter) -> StoreResult<Vec<DoctorRecord>>;

    /// Insert a listing with a zero rating; the store assigns id and timestamps.
    fn insert_doctor(&self, doctor: NewDoctor) -> StoreResult<DoctorRecord>;

    /// Apply `patch` and bump `updated_at`. Fails with `NotFound` for unknown ids.
    fn update_doctor(&self, id: &DoctorId, patch: DoctorPatch) -> StoreResult<DoctorRecord>;
}

pub trait RatingStore {
    fn get_rating(&self, id: &RatingId) -> StoreResult<Option<RatingRecord>>;

    fn list_ratings_by_doctor(&self, doctor_id: &DoctorId) -> StoreResult<Vec<RatingRecord>>;

    fn get_rating_by_doctor_and_rater(
        &self,
        doctor_id: &DoctorId,
        rater: &IdentityId,
    ) -> StoreResult<Option<RatingRecord>>;

    fn insert_rating(&self, rating: NewRating) -> StoreResult<RatingRecord>;

    /// Apply `patch` and bump `updated_at`
    fn update_rating(&self, id: &RatingId, patch: RatingPatch) -> StoreResult<RatingRecord>;

    /// Insert the rating, or resubmit score and comment on the existing
    /// (doctor, rater) record.
    ///
    /// The provided implementation is a plain read-then-write and is not
    /// race-free. Backends with transactions or a uniqueness constraint on
    /// (doctor_id, rater_identity_id) should override it.
    fn upsert_rating(&self, rating: NewRating) -> StoreResult<RatingRecord> {
        match self.get_rating_by_doctor_and_rater(&rating.doctor_id, &rating.rater_identity_id)? {
            Some(existing) => self.update_rating(
                &existing.id,
                RatingPatch::resubmission(rating.rating, rating.comment),
            ),
            None => self.insert_rating(rating),
        }
    }
}

pub trait VerificationStore {
    fn get_verification_by_doctor_and_identity(
        &self,
        doctor_id: &DoctorId,
        identity: &IdentityId,
    ) -> StoreResult<Option<VerificationRecord>>;

    fn list_verified_by_identity(&self, identity: &IdentityId) -> StoreResult<Vec<VerificationRecord>>;

    fn list_verifications_by_doctor(&self, doctor_id: &DoctorId) -> StoreResult<Vec<VerificationRecord>>;

    /// Backends able to enforce one verified record per identity report a
    /// violation as `StoreError::Conflict`.
    fn insert_verification(&self, verification: NewVerification) -> StoreResult<VerificationRecord>;
}

pub trait ProfileStore {
    fn get_profile(&self, identity: &IdentityId) -> StoreResult<Option<Profile>>;

    fn insert_profile(&self, identity: &IdentityId, profile: NewProfile) -> StoreResult<Profile>;

    fn update_profile(&self, identity: &IdentityId, patch: ProfilePatch) -> StoreResult<Profile>;
}

/// Everything the directory needs from one backend
pub trait DirectoryStore: DoctorStore + RatingStore + VerificationStore + ProfileStore {}

impl<T> DirectoryStore for T where T: DoctorStore + RatingStore + VerificationStore + ProfileStore {}
