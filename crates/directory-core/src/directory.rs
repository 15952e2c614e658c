//! Directory service
//!
//! The single entry point the UI (or a zome extern) calls. Each operation
//! is one interactive action: a few sequential store calls, no background
//! work. Session-bound operations take the caller's [`SessionContext`]
//! explicitly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::aggregator::RatingAggregator;
use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::model::*;
use crate::pagination::{Page, PaginationInput};
use crate::resolver::{OwnershipResolver, VerificationState, ViewerRelation};
use crate::session::SessionContext;
use crate::store::DirectoryStore;
use crate::validation;

/// Doctor detail as seen by one viewer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoctorView {
    pub doctor: DoctorRecord,
    pub verification: VerificationState,
    pub relation: ViewerRelation,
    pub can_manage: bool,
    pub can_claim: bool,
}

impl DoctorView {
    pub fn is_verified(&self) -> bool {
        self.verification.is_verified()
    }
}

/// A rating paired with its author's display name
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub rating: RatingRecord,
    pub reviewer_name: String,
}

pub struct DirectoryService<S> {
    store: S,
    config: DirectoryConfig,
}

impl<S: DirectoryStore> DirectoryService<S> {
    pub fn new(store: S, config: DirectoryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn resolver(&self) -> OwnershipResolver<'_, S> {
        OwnershipResolver::new(&self.store, &self.config)
    }

    pub fn aggregator(&self) -> RatingAggregator<'_, S> {
        RatingAggregator::new(&self.store, &self.config)
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    pub fn profile(&self, identity: &IdentityId) -> DirectoryResult<Option<Profile>> {
        Ok(self.store.get_profile(identity)?)
    }

    /// Create the caller's profile on first sign-in. An existing profile is
    /// returned unchanged.
    pub fn provision_profile(&self, session: &SessionContext, profile: NewProfile) -> DirectoryResult<Profile> {
        let identity = session.require_identity()?;
        if let Some(existing) = self.store.get_profile(identity)? {
            return Ok(existing);
        }
        validation::validate_new_profile(&profile, &self.config).into_result()?;
        let created = self.store.insert_profile(identity, profile)?;
        tracing::info!("Provisioned {} profile for {}", created.role, identity);
        Ok(created)
    }

    pub fn update_profile(&self, session: &SessionContext, patch: ProfilePatch) -> DirectoryResult<Profile> {
        let identity = session.require_identity()?;
        validation::validate_profile_patch(&patch, &self.config).into_result()?;
        if self.store.get_profile(identity)?.is_none() {
            return Err(DirectoryError::NotFound(format!("profile {}", identity)));
        }
        Ok(self.store.update_profile(identity, patch)?)
    }

    /// Reviewer name, "Anonymous" when the profile cannot be read
    pub fn display_name(&self, identity: &IdentityId) -> String {
        match self.store.get_profile(identity) {
            Ok(Some(profile)) => profile.display_name(),
            Ok(None) => ANONYMOUS.to_string(),
            Err(err) => {
                tracing::warn!("Profile lookup for {} failed: {}", identity, err);
                ANONYMOUS.to_string()
            }
        }
    }

    // ------------------------------------------------------------------
    // Doctors
    // ------------------------------------------------------------------

    pub fn can_create_profile(&self, session: &SessionContext) -> bool {
        session
            .identity()
            .map(|identity| self.resolver().can_create_profile(identity))
            .unwrap_or(false)
    }

    /// Create a listing owned by the caller. Rejected before any write when
    /// the caller is not a doctor or already created a listing.
    pub fn create_doctor(&self, session: &SessionContext, mut draft: NewDoctor) -> DirectoryResult<DoctorRecord> {
        let identity = session.require_identity()?;
        draft.normalize();
        validation::validate_new_doctor(&draft, &self.config).into_result()?;

        if !self.resolver().can_create_profile(identity) {
            return Err(DirectoryError::Permission(
                "Only doctors without an existing profile can create one".to_string(),
            ));
        }

        draft.created_by_identity = Some(identity.clone());
        let doctor = self.store.insert_doctor(draft)?;
        tracing::info!("{} created doctor profile {}", identity, doctor.id);
        Ok(doctor)
    }

    pub fn update_doctor(
        &self,
        session: &SessionContext,
        doctor_id: &DoctorId,
        mut patch: DoctorPatch,
    ) -> DirectoryResult<DoctorRecord> {
        let identity = session.require_identity()?;
        patch.normalize();
        validation::validate_doctor_patch(&patch, &self.config).into_result()?;

        if self.store.get_doctor(doctor_id)?.is_none() {
            return Err(DirectoryError::NotFound(format!("doctor {}", doctor_id)));
        }
        if !self.resolver().can_manage(doctor_id, Some(identity)) {
            return Err(DirectoryError::Permission(format!(
                "{} may not edit doctor {}",
                identity, doctor_id
            )));
        }
        if patch.is_empty() {
            return self.require_doctor(doctor_id);
        }
        Ok(self.store.update_doctor(doctor_id, patch)?)
    }

    /// Doctor detail. With `heal_on_read` the cached average is recomputed
    /// and persisted first; a failed recompute falls back to the stored value.
    pub fn get_doctor(&self, doctor_id: &DoctorId) -> DirectoryResult<DoctorRecord> {
        let mut doctor = self.require_doctor(doctor_id)?;
        if self.config.heal_on_read {
            match self.aggregator().recompute_average(doctor_id) {
                Ok(average) => doctor.rating = average,
                Err(err) => tracing::warn!("Heal on read for {} failed: {}", doctor_id, err),
            }
        }
        Ok(doctor)
    }

    pub fn doctor_view(&self, doctor_id: &DoctorId, session: &SessionContext) -> DirectoryResult<DoctorView> {
        let doctor = self.get_doctor(doctor_id)?;
        let resolver = self.resolver();
        let viewer = session.identity();
        let standing = resolver.classify(doctor_id, viewer);
        Ok(DoctorView {
            doctor,
            verification: standing.verification,
            relation: standing.relation,
            can_manage: standing.relation.can_manage(),
            can_claim: resolver.can_claim(doctor_id, viewer),
        })
    }

    /// Listings matching `filter`, each carrying the average of its live
    /// rating set. Nothing is persisted.
    pub fn list_doctors(&self, filter: &DoctorFilter) -> DirectoryResult<Vec<DoctorRecord>> {
        let aggregator = self.aggregator();
        let mut doctors = self.store.list_doctors(filter)?;
        for doctor in doctors.iter_mut() {
            match aggregator.current_average(&doctor.id) {
                Ok(average) => doctor.rating = average,
                Err(err) => tracing::warn!("Listing average for {} failed: {}", doctor.id, err),
            }
        }
        Ok(doctors)
    }

    pub fn list_doctors_page(
        &self,
        filter: &DoctorFilter,
        pagination: &PaginationInput,
    ) -> DirectoryResult<Page<DoctorRecord>> {
        pagination.validate()?;
        let doctors = self.list_doctors(filter)?;
        Ok(Page::slice(doctors, pagination))
    }

    /// Distinct specialties across all listings, sorted
    pub fn specialties(&self) -> DirectoryResult<Vec<String>> {
        let doctors = self.store.list_doctors(&DoctorFilter::default())?;
        let specialties: BTreeSet<String> = doctors
            .into_iter()
            .map(|d| d.specialty.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(specialties.into_iter().collect())
    }

    pub fn is_verified(&self, doctor_id: &DoctorId) -> bool {
        self.resolver().is_verified(doctor_id)
    }

    pub fn can_manage(&self, doctor_id: &DoctorId, session: &SessionContext) -> bool {
        self.resolver().can_manage(doctor_id, session.identity())
    }

    pub fn can_claim(&self, doctor_id: &DoctorId, session: &SessionContext) -> bool {
        self.resolver().can_claim(doctor_id, session.identity())
    }

    // ------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------

    pub fn claim_doctor(&self, session: &SessionContext, doctor_id: &DoctorId) -> DirectoryResult<VerificationRecord> {
        Ok(self.resolver().request_claim(doctor_id, session.identity())?)
    }

    /// Doctors the identity holds verified claims for
    pub fn claimed_doctors(&self, identity: &IdentityId) -> DirectoryResult<Vec<DoctorRecord>> {
        let claims = self.store.list_verified_by_identity(identity)?;
        let mut doctors = Vec::with_capacity(claims.len());
        for claim in claims {
            match self.store.get_doctor(&claim.doctor_id)? {
                Some(doctor) => doctors.push(doctor),
                None => tracing::warn!("Claim {} points at missing doctor {}", claim.id, claim.doctor_id),
            }
        }
        Ok(doctors)
    }

    // ------------------------------------------------------------------
    // Ratings
    // ------------------------------------------------------------------

    pub fn submit_rating(
        &self,
        session: &SessionContext,
        doctor_id: &DoctorId,
        rating: u8,
        comment: Option<String>,
    ) -> DirectoryResult<RatingRecord> {
        let rater = session.require_identity()?;
        self.aggregator().submit_rating(doctor_id, rater, rating, comment)
    }

    pub fn respond_to_rating(
        &self,
        session: &SessionContext,
        rating_id: &RatingId,
        response_text: &str,
    ) -> DirectoryResult<()> {
        let responder = session.require_identity()?;
        self.aggregator().respond_to_rating(rating_id, response_text, responder)
    }

    pub fn recompute_average(&self, doctor_id: &DoctorId) -> DirectoryResult<f64> {
        self.aggregator().recompute_average(doctor_id)
    }

    /// All ratings for a doctor, newest first
    pub fn ratings(&self, doctor_id: &DoctorId) -> DirectoryResult<Vec<RatingRecord>> {
        let mut ratings = self.store.list_ratings_by_doctor(doctor_id)?;
        ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(ratings)
    }

    pub fn reviews(&self, doctor_id: &DoctorId) -> DirectoryResult<Vec<Review>> {
        Ok(self
            .ratings(doctor_id)?
            .into_iter()
            .map(|rating| Review {
                reviewer_name: self.display_name(&rating.rater_identity_id),
                rating,
            })
            .collect())
    }

    pub fn my_rating(&self, session: &SessionContext, doctor_id: &DoctorId) -> DirectoryResult<Option<RatingRecord>> {
        match session.identity() {
            Some(rater) => Ok(self.store.get_rating_by_doctor_and_rater(doctor_id, rater)?),
            None => Ok(None),
        }
    }

    /// Ratings still waiting for a response, for the listing's managers only
    pub fn unanswered_ratings(
        &self,
        session: &SessionContext,
        doctor_id: &DoctorId,
    ) -> DirectoryResult<Vec<RatingRecord>> {
        let identity = session.require_identity()?;
        if !self.resolver().can_manage(doctor_id, Some(identity)) {
            return Err(DirectoryError::Permission(format!(
                "{} may not read notifications for doctor {}",
                identity, doctor_id
            )));
        }
        Ok(self
            .ratings(doctor_id)?
            .into_iter()
            .filter(|r| r.doctor_response.is_none())
            .collect())
    }

    fn require_doctor(&self, doctor_id: &DoctorId) -> DirectoryResult<DoctorRecord> {
        self.store
            .get_doctor(doctor_id)?
            .ok_or_else(|| DirectoryError::NotFound(format!("doctor {}", doctor_id)))
    }
}
