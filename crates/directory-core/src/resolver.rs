//! Ownership / Verification Resolver
//!
//! Answers three questions for a (doctor, viewer) pair:
//! - is the doctor verified (badge shown to everyone)?
//! - may the viewer manage the listing (edit, respond to reviews)?
//! - may the viewer claim the listing?
//!
//! Nothing here is persisted state; every answer is derived from the stores
//! on each call. Read queries never fail: a store error is logged and the
//! most restrictive answer is returned.
//!
//! Two sources feed "verified". An explicit `verified=true` claim always
//! wins. Without one, a listing whose creator has the `doctor` role is
//! treated as verified (configurable fallback).

use serde::{Deserialize, Serialize};

use crate::config::DirectoryConfig;
use crate::error::ClaimError;
use crate::model::*;
use crate::store::{DirectoryStore, StoreError, StoreResult};

/// Doctor-level verification, independent of the viewer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationState {
    Unclaimed,
    /// No explicit claim, but the creator's profile role is `doctor`
    ImplicitlyVerified,
    /// At least one claim for the doctor has `verified=true`
    ExplicitlyVerified,
}

impl VerificationState {
    pub fn is_verified(self) -> bool {
        !matches!(self, VerificationState::Unclaimed)
    }
}

/// How the viewer relates to a listing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewerRelation {
    Anonymous,
    Unrelated,
    /// Viewer created the listing; independent of verification
    OwnedByCreator,
    /// Viewer holds a verified claim on the listing
    OwnedByClaimer,
}

impl ViewerRelation {
    pub fn can_manage(self) -> bool {
        matches!(self, ViewerRelation::OwnedByCreator | ViewerRelation::OwnedByClaimer)
    }
}

/// Full classification of a (doctor, viewer) pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorStanding {
    pub verification: VerificationState,
    pub relation: ViewerRelation,
}

pub struct OwnershipResolver<'a, S> {
    store: &'a S,
    config: &'a DirectoryConfig,
}

impl<'a, S: DirectoryStore> OwnershipResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a DirectoryConfig) -> Self {
        Self { store, config }
    }

    pub fn verification_state(&self, doctor_id: &DoctorId) -> VerificationState {
        self.try_verification_state(doctor_id).unwrap_or_else(|err| {
            tracing::warn!("Verification lookup for {} failed: {}", doctor_id, err);
            VerificationState::Unclaimed
        })
    }

    pub fn is_verified(&self, doctor_id: &DoctorId) -> bool {
        self.verification_state(doctor_id).is_verified()
    }

    pub fn viewer_relation(&self, doctor_id: &DoctorId, viewer: Option<&IdentityId>) -> ViewerRelation {
        let viewer = match viewer {
            Some(viewer) => viewer,
            None => return ViewerRelation::Anonymous,
        };
        self.try_viewer_relation(doctor_id, viewer).unwrap_or_else(|err| {
            tracing::warn!("Ownership lookup for {} by {} failed: {}", doctor_id, viewer, err);
            ViewerRelation::Unrelated
        })
    }

    /// Gate for editing a listing and responding to its reviews
    pub fn can_manage(&self, doctor_id: &DoctorId, viewer: Option<&IdentityId>) -> bool {
        self.viewer_relation(doctor_id, viewer).can_manage()
    }

    pub fn classify(&self, doctor_id: &DoctorId, viewer: Option<&IdentityId>) -> DoctorStanding {
        DoctorStanding {
            verification: self.verification_state(doctor_id),
            relation: self.viewer_relation(doctor_id, viewer),
        }
    }

    /// Whether a claim by `viewer` would currently be accepted
    pub fn can_claim(&self, doctor_id: &DoctorId, viewer: Option<&IdentityId>) -> bool {
        let viewer = match viewer {
            Some(viewer) => viewer,
            None => return false,
        };
        let check = || -> StoreResult<bool> {
            if self.store.get_doctor(doctor_id)?.is_none() {
                return Ok(false);
            }
            if self.try_viewer_relation(doctor_id, viewer)?.can_manage() {
                return Ok(false);
            }
            Ok(self.store.list_verified_by_identity(viewer)?.is_empty())
        };
        check().unwrap_or_else(|err| {
            tracing::warn!("Claim eligibility for {} by {} failed: {}", doctor_id, viewer, err);
            false
        })
    }

    /// One created listing per identity, and only for doctor-role profiles
    pub fn can_create_profile(&self, candidate: &IdentityId) -> bool {
        let check = || -> StoreResult<bool> {
            match self.store.get_profile(candidate)? {
                Some(profile) if profile.role == Role::Doctor => {}
                _ => return Ok(false),
            }
            let created = self.store.list_doctors(&DoctorFilter::created_by(candidate))?;
            Ok(created.is_empty())
        };
        check().unwrap_or_else(|err| {
            tracing::warn!("Profile creation check for {} failed: {}", candidate, err);
            false
        })
    }

    /// Record a verified claim of `doctor_id` by `claimant`.
    ///
    /// The one-claim-per-identity check here is best effort: two concurrent
    /// claims can both pass it. Stores that enforce uniqueness report the
    /// loser as a conflict, which maps to `AlreadyClaimedElsewhere`.
    pub fn request_claim(
        &self,
        doctor_id: &DoctorId,
        claimant: Option<&IdentityId>,
    ) -> Result<VerificationRecord, ClaimError> {
        let claimant = claimant.ok_or(ClaimError::Unauthenticated)?;
        let store_err = |err: StoreError| ClaimError::Store(err.to_string());

        if self.store.get_doctor(doctor_id).map_err(store_err)?.is_none() {
            return Err(ClaimError::DoctorNotFound(doctor_id.clone()));
        }

        let held = self.store.list_verified_by_identity(claimant).map_err(store_err)?;
        if held.iter().any(|claim| &claim.doctor_id == doctor_id) {
            return Err(ClaimError::AlreadyClaimed);
        }
        if !held.is_empty() {
            return Err(ClaimError::AlreadyClaimedElsewhere);
        }

        let claim = NewVerification {
            doctor_id: doctor_id.clone(),
            identity_id: claimant.clone(),
            verified: true,
        };
        match self.store.insert_verification(claim) {
            Ok(record) => {
                tracing::info!("{} claimed doctor profile {}", claimant, doctor_id);
                Ok(record)
            }
            Err(StoreError::Conflict(_)) => Err(ClaimError::AlreadyClaimedElsewhere),
            Err(err) => Err(store_err(err)),
        }
    }

    fn try_verification_state(&self, doctor_id: &DoctorId) -> StoreResult<VerificationState> {
        let claims = self.store.list_verifications_by_doctor(doctor_id)?;
        if claims.iter().any(|claim| claim.verified) {
            return Ok(VerificationState::ExplicitlyVerified);
        }
        if !self.config.implicit_creator_verification {
            return Ok(VerificationState::Unclaimed);
        }

        let creator = match self.store.get_doctor(doctor_id)?.and_then(|d| d.created_by_identity) {
            Some(creator) => creator,
            None => return Ok(VerificationState::Unclaimed),
        };

        // A creator that no longer resolves is simply not a doctor
        match self.store.get_profile(&creator) {
            Ok(Some(profile)) if profile.role == Role::Doctor => Ok(VerificationState::ImplicitlyVerified),
            Ok(_) => Ok(VerificationState::Unclaimed),
            Err(err) => {
                tracing::warn!("Creator profile lookup for {} failed: {}", doctor_id, err);
                Ok(VerificationState::Unclaimed)
            }
        }
    }

    fn try_viewer_relation(&self, doctor_id: &DoctorId, viewer: &IdentityId) -> StoreResult<ViewerRelation> {
        let doctor = match self.store.get_doctor(doctor_id)? {
            Some(doctor) => doctor,
            None => return Ok(ViewerRelation::Unrelated),
        };
        if doctor.created_by_identity.as_ref() == Some(viewer) {
            return Ok(ViewerRelation::OwnedByCreator);
        }
        match self.store.get_verification_by_doctor_and_identity(doctor_id, viewer)? {
            Some(claim) if claim.verified => Ok(ViewerRelation::OwnedByClaimer),
            _ => Ok(ViewerRelation::Unrelated),
        }
    }
}
