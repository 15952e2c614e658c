//! Doctors Coordinator Zome
//!
//! Provides extern functions for the doctor directory including:
//! - Profile provisioning and edits
//! - Listing creation, edits, search and detail views
//! - Ratings, reviews and doctor responses
//! - Listing claims, ownership and verification checks
//!
//! Every extern runs the directory service over the DHT store with the
//! calling agent as the session identity.

use directory_core::{
    DirectoryService, DoctorFilter, DoctorId, DoctorPatch, DoctorRecord, DoctorView, IdentityId,
    IdentityProvider, NewDoctor, NewProfile, Page, PaginationInput, Profile, ProfilePatch, RatingId,
    RatingRecord, Review, Session, SessionContext, VerificationRecord,
};
use doctor_directory_shared::{id_from_agent, IntoExternResult};
use doctors_integrity::directory_config;
use hdk::prelude::*;

mod store;

pub use store::DhtStore;

/// Session source for externs: the agent running this cell
struct AgentIdentity;

impl IdentityProvider for AgentIdentity {
    fn current_session(&self) -> Option<Session> {
        match agent_info() {
            Ok(info) => Some(Session {
                identity_id: IdentityId::new(id_from_agent(&info.agent_initial_pubkey)),
            }),
            Err(err) => {
                warn!("Agent info unavailable: {:?}", err);
                None
            }
        }
    }
}

fn directory() -> DirectoryService<DhtStore> {
    DirectoryService::new(DhtStore, directory_config())
}

fn session() -> SessionContext {
    let mut ctx = SessionContext::anonymous();
    ctx.refresh(&AgentIdentity);
    ctx
}

// ============================================================================
// Profile Functions
// ============================================================================

/// Create the caller's profile if it does not exist yet
#[hdk_extern]
pub fn provision_profile(profile: NewProfile) -> ExternResult<Profile> {
    directory().provision_profile(&session(), profile).to_extern()
}

#[hdk_extern]
pub fn update_profile(patch: ProfilePatch) -> ExternResult<Profile> {
    directory().update_profile(&session(), patch).to_extern()
}

#[hdk_extern]
pub fn get_profile(identity: IdentityId) -> ExternResult<Option<Profile>> {
    directory().profile(&identity).to_extern()
}

#[hdk_extern]
pub fn get_my_profile(_: ()) -> ExternResult<Option<Profile>> {
    let ctx = session();
    match ctx.identity() {
        Some(identity) => directory().profile(identity).to_extern(),
        None => Ok(None),
    }
}

// ============================================================================
// Listing Functions
// ============================================================================

#[hdk_extern]
pub fn can_create_profile(_: ()) -> ExternResult<bool> {
    Ok(directory().can_create_profile(&session()))
}

/// Create a listing owned by the calling doctor
#[hdk_extern]
pub fn create_doctor(draft: NewDoctor) -> ExternResult<DoctorRecord> {
    let doctor = directory().create_doctor(&session(), draft).to_extern()?;
    debug!("Created doctor listing {}", doctor.id);
    Ok(doctor)
}

/// Input for editing a listing
#[derive(Serialize, Deserialize, Debug)]
pub struct UpdateDoctorInput {
    pub doctor_id: DoctorId,
    pub patch: DoctorPatch,
}

#[hdk_extern]
pub fn update_doctor(input: UpdateDoctorInput) -> ExternResult<DoctorRecord> {
    directory()
        .update_doctor(&session(), &input.doctor_id, input.patch)
        .to_extern()
}

/// Listing detail with its average refreshed from the reviews
#[hdk_extern]
pub fn get_doctor(doctor_id: DoctorId) -> ExternResult<DoctorRecord> {
    directory().get_doctor(&doctor_id).to_extern()
}

#[hdk_extern]
pub fn get_doctor_view(doctor_id: DoctorId) -> ExternResult<DoctorView> {
    directory().doctor_view(&doctor_id, &session()).to_extern()
}

#[hdk_extern]
pub fn list_doctors(filter: DoctorFilter) -> ExternResult<Vec<DoctorRecord>> {
    directory().list_doctors(&filter).to_extern()
}

/// Input for paged listing queries
#[derive(Serialize, Deserialize, Debug)]
pub struct ListDoctorsPageInput {
    pub filter: DoctorFilter,
    pub pagination: Option<PaginationInput>,
}

#[hdk_extern]
pub fn list_doctors_page(input: ListDoctorsPageInput) -> ExternResult<Page<DoctorRecord>> {
    let pagination = input.pagination.unwrap_or_default();
    directory().list_doctors_page(&input.filter, &pagination).to_extern()
}

#[hdk_extern]
pub fn get_specialties(_: ()) -> ExternResult<Vec<String>> {
    directory().specialties().to_extern()
}

// ============================================================================
// Ownership and Verification Functions
// ============================================================================

#[hdk_extern]
pub fn is_verified(doctor_id: DoctorId) -> ExternResult<bool> {
    Ok(directory().is_verified(&doctor_id))
}

#[hdk_extern]
pub fn can_manage(doctor_id: DoctorId) -> ExternResult<bool> {
    Ok(directory().can_manage(&doctor_id, &session()))
}

#[hdk_extern]
pub fn can_claim(doctor_id: DoctorId) -> ExternResult<bool> {
    Ok(directory().can_claim(&doctor_id, &session()))
}

/// Claim a listing as the calling agent
#[hdk_extern]
pub fn claim_doctor(doctor_id: DoctorId) -> ExternResult<VerificationRecord> {
    directory().claim_doctor(&session(), &doctor_id).to_extern()
}

#[hdk_extern]
pub fn get_claimed_doctors(identity: IdentityId) -> ExternResult<Vec<DoctorRecord>> {
    directory().claimed_doctors(&identity).to_extern()
}

// ============================================================================
// Rating Functions
// ============================================================================

/// Input for rating a doctor
#[derive(Serialize, Deserialize, Debug)]
pub struct SubmitRatingInput {
    pub doctor_id: DoctorId,
    pub rating: u8,
    pub comment: Option<String>,
}

/// Rate a doctor, replacing the caller's earlier rating if any
#[hdk_extern]
pub fn submit_rating(input: SubmitRatingInput) -> ExternResult<RatingRecord> {
    directory()
        .submit_rating(&session(), &input.doctor_id, input.rating, input.comment)
        .to_extern()
}

/// Input for answering a review
#[derive(Serialize, Deserialize, Debug)]
pub struct RespondToRatingInput {
    pub rating_id: RatingId,
    pub response: String,
}

#[hdk_extern]
pub fn respond_to_rating(input: RespondToRatingInput) -> ExternResult<()> {
    directory()
        .respond_to_rating(&session(), &input.rating_id, &input.response)
        .to_extern()
}

#[hdk_extern]
pub fn recompute_average(doctor_id: DoctorId) -> ExternResult<f64> {
    directory().recompute_average(&doctor_id).to_extern()
}

/// Ratings for a doctor, newest first
#[hdk_extern]
pub fn get_ratings(doctor_id: DoctorId) -> ExternResult<Vec<RatingRecord>> {
    directory().ratings(&doctor_id).to_extern()
}

#[hdk_extern]
pub fn get_reviews(doctor_id: DoctorId) -> ExternResult<Vec<Review>> {
    directory().reviews(&doctor_id).to_extern()
}

#[hdk_extern]
pub fn get_my_rating(doctor_id: DoctorId) -> ExternResult<Option<RatingRecord>> {
    directory().my_rating(&session(), &doctor_id).to_extern()
}

/// Reviews still waiting for a response; polled by the owner's dashboard
#[hdk_extern]
pub fn get_unanswered_ratings(doctor_id: DoctorId) -> ExternResult<Vec<RatingRecord>> {
    directory().unanswered_ratings(&session(), &doctor_id).to_extern()
}
