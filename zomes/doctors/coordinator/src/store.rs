//! DHT-backed directory store
//!
//! Records are addressed by the hash of their original create action.
//! Updates link original -> new action, and reads follow the newest link.
//!
//! The DHT has no transactions: `upsert_rating` is the default
//! read-then-write and two verified claims by one agent published
//! concurrently from different devices are not detected.

use directory_core::*;
use doctor_directory_shared::{
    action_from_id, agent_from_id, all_doctors_anchor, decode_entry, id_from_action, id_from_agent,
    latest_action_hash, link_targets, specialty_anchor, store_unavailable, to_datetime,
};
use doctors_integrity::*;
use hdk::prelude::*;

/// Directory store reading and writing this cell's DHT
#[derive(Clone, Copy, Debug, Default)]
pub struct DhtStore;

type Host<T> = ExternResult<T>;

fn host<T>(result: Host<T>) -> StoreResult<T> {
    result.map_err(store_unavailable)
}

fn linked(base: impl Into<AnyLinkableHash>, link_type: LinkTypes) -> Host<Vec<ActionHash>> {
    let links = get_links(LinkQuery::try_new(base, link_type)?, GetStrategy::default())?;
    Ok(link_targets(links))
}

/// Newest version of the entry created at `original`
fn latest<T>(original: &ActionHash, updates: LinkTypes) -> Host<Option<(ActionHash, T)>>
where
    T: TryFrom<SerializedBytes, Error = SerializedBytesError>,
{
    let latest_hash = latest_action_hash(original, updates)?;
    let record = match get(latest_hash.clone(), GetOptions::default())? {
        Some(record) => record,
        None => return Ok(None),
    };
    Ok(decode_entry::<T>(&record)?.map(|entry| (latest_hash, entry)))
}

fn created(hash: ActionHash, what: &str) -> Host<Record> {
    get(hash, GetOptions::default())?
        .ok_or(wasm_error!(WasmErrorInner::Guest(format!("Could not find new {}", what))))
}

// ============================================================================
// Conversions between entries and directory records
// ============================================================================

fn doctor_record(original: &ActionHash, listing: DoctorListing) -> DoctorRecord {
    DoctorRecord {
        id: DoctorId::new(id_from_action(original)),
        name: listing.name,
        specialty: listing.specialty,
        subspecialties: listing.subspecialties,
        hospital: listing.hospital,
        rating: listing.rating,
        experience: listing.experience,
        education: listing.education,
        bio: listing.bio,
        languages: listing.languages,
        accepting_new_patients: listing.accepting_new_patients,
        image_url: listing.image_url,
        contact: listing.contact,
        created_by_identity: listing.created_by.as_ref().map(|agent| IdentityId::new(id_from_agent(agent))),
        created_at: to_datetime(listing.created_at),
        updated_at: to_datetime(listing.updated_at),
    }
}

fn rating_record(original: &ActionHash, review: DoctorReview) -> RatingRecord {
    RatingRecord {
        id: RatingId::new(id_from_action(original)),
        doctor_id: DoctorId::new(id_from_action(&review.doctor_hash)),
        rater_identity_id: IdentityId::new(id_from_agent(&review.rater)),
        rating: review.rating,
        comment: review.comment,
        doctor_response: review.doctor_response,
        created_at: to_datetime(review.created_at),
        updated_at: to_datetime(review.updated_at),
    }
}

fn verification_record(original: &ActionHash, claim: DoctorClaim) -> VerificationRecord {
    VerificationRecord {
        id: VerificationId::new(id_from_action(original)),
        doctor_id: DoctorId::new(id_from_action(&claim.doctor_hash)),
        identity_id: IdentityId::new(id_from_agent(&claim.claimant)),
        verified: claim.verified,
        created_at: to_datetime(claim.created_at),
        updated_at: to_datetime(claim.updated_at),
    }
}

fn profile_record(profile: UserProfile) -> Profile {
    Profile {
        id: IdentityId::new(id_from_agent(&profile.owner)),
        first_name: profile.first_name,
        last_name: profile.last_name,
        role: profile.role,
        created_at: to_datetime(profile.created_at),
        updated_at: to_datetime(profile.updated_at),
    }
}

/// Ids that do not decode cannot name anything on this DHT
fn parse_doctor(id: &DoctorId) -> Option<ActionHash> {
    action_from_id(id.as_str()).ok()
}

fn parse_agent(id: &IdentityId) -> Option<AgentPubKey> {
    agent_from_id(id.as_str()).ok()
}

fn require_agent(id: &IdentityId) -> StoreResult<AgentPubKey> {
    parse_agent(id).ok_or_else(|| StoreError::NotFound(format!("identity {}", id)))
}

fn require_doctor(id: &DoctorId) -> StoreResult<ActionHash> {
    parse_doctor(id).ok_or_else(|| StoreError::NotFound(format!("doctor {}", id)))
}

impl DhtStore {
    fn load_doctor(&self, original: &ActionHash) -> Host<Option<(ActionHash, DoctorListing)>> {
        latest::<DoctorListing>(original, LinkTypes::DoctorUpdates)
    }

    fn load_review(&self, original: &ActionHash) -> Host<Option<(ActionHash, DoctorReview)>> {
        latest::<DoctorReview>(original, LinkTypes::ReviewUpdates)
    }

    fn load_claims(&self, originals: Vec<ActionHash>) -> Host<Vec<VerificationRecord>> {
        let mut claims = Vec::with_capacity(originals.len());
        for original in originals {
            if let Some(record) = get(original.clone(), GetOptions::default())? {
                if let Some(claim) = decode_entry::<DoctorClaim>(&record)? {
                    claims.push(verification_record(&original, claim));
                }
            }
        }
        Ok(claims)
    }

    fn load_reviews(&self, originals: Vec<ActionHash>) -> Host<Vec<RatingRecord>> {
        let mut ratings = Vec::with_capacity(originals.len());
        for original in originals {
            if let Some((_, review)) = self.load_review(&original)? {
                ratings.push(rating_record(&original, review));
            }
        }
        Ok(ratings)
    }

    /// Original hash and newest version of the agent's profile
    fn load_profile(&self, agent: &AgentPubKey) -> Host<Option<(ActionHash, ActionHash, UserProfile)>> {
        let original = match linked(agent.clone(), LinkTypes::AgentToProfile)?.into_iter().next() {
            Some(original) => original,
            None => return Ok(None),
        };
        Ok(latest::<UserProfile>(&original, LinkTypes::ProfileUpdates)?
            .map(|(latest_hash, profile)| (original, latest_hash, profile)))
    }

    fn candidate_doctors(&self, filter: &DoctorFilter) -> Host<Vec<ActionHash>> {
        if let Some(agent) = filter.created_by.as_ref().and_then(parse_agent) {
            return linked(agent, LinkTypes::CreatorToDoctors);
        }
        if let Some(specialty) = filter.specialty.as_deref().filter(|s| !s.trim().is_empty()) {
            return linked(specialty_anchor(specialty)?, LinkTypes::SpecialtyToDoctors);
        }
        linked(all_doctors_anchor()?, LinkTypes::AllDoctors)
    }
}

// ============================================================================
// Doctor listings
// ============================================================================

impl DoctorStore for DhtStore {
    fn get_doctor(&self, id: &DoctorId) -> StoreResult<Option<DoctorRecord>> {
        let original = match parse_doctor(id) {
            Some(original) => original,
            None => return Ok(None),
        };
        Ok(host(self.load_doctor(&original))?.map(|(_, listing)| doctor_record(&original, listing)))
    }

    fn list_doctors(&self, filter: &DoctorFilter) -> StoreResult<Vec<DoctorRecord>> {
        if filter.created_by.is_some() && filter.created_by.as_ref().and_then(parse_agent).is_none() {
            return Ok(Vec::new());
        }
        let mut doctors = Vec::new();
        for original in host(self.candidate_doctors(filter))? {
            if let Some((_, listing)) = host(self.load_doctor(&original))? {
                let doctor = doctor_record(&original, listing);
                // Index links can be stale after an edit; the record decides
                if filter.matches(&doctor) {
                    doctors.push(doctor);
                }
            }
        }
        Ok(doctors)
    }

    fn insert_doctor(&self, doctor: NewDoctor) -> StoreResult<DoctorRecord> {
        let created_by = match doctor.created_by_identity {
            Some(ref identity) => Some(require_agent(identity)?),
            None => None,
        };
        let insert = || -> Host<DoctorRecord> {
            let now = sys_time()?;
            let listing = DoctorListing {
                name: doctor.name.clone(),
                specialty: doctor.specialty.clone(),
                subspecialties: doctor.subspecialties.clone(),
                hospital: doctor.hospital.clone(),
                rating: 0.0,
                experience: doctor.experience,
                education: doctor.education.clone(),
                bio: doctor.bio.clone(),
                languages: doctor.languages.clone(),
                accepting_new_patients: doctor.accepting_new_patients,
                image_url: doctor.image_url.clone(),
                contact: doctor.contact.clone(),
                created_by: created_by.clone(),
                created_at: now,
                updated_at: now,
            };
            let hash = create_entry(&EntryTypes::DoctorListing(listing.clone()))?;
            created(hash.clone(), "doctor listing")?;

            create_link(all_doctors_anchor()?, hash.clone(), LinkTypes::AllDoctors, ())?;
            create_link(specialty_anchor(&listing.specialty)?, hash.clone(), LinkTypes::SpecialtyToDoctors, ())?;
            if let Some(ref creator) = created_by {
                create_link(creator.clone(), hash.clone(), LinkTypes::CreatorToDoctors, ())?;
            }

            Ok(doctor_record(&hash, listing))
        };
        host(insert())
    }

    fn update_doctor(&self, id: &DoctorId, patch: DoctorPatch) -> StoreResult<DoctorRecord> {
        let original = require_doctor(id)?;
        let (latest_hash, listing) = host(self.load_doctor(&original))?
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", id)))?;
        let created_by = listing.created_by.clone();
        let created_at = listing.created_at;
        let previous_specialty = listing.specialty.clone();

        let mut doctor = doctor_record(&original, listing);
        patch.apply_to(&mut doctor);

        let listing = DoctorListing {
            name: doctor.name.clone(),
            specialty: doctor.specialty.clone(),
            subspecialties: doctor.subspecialties.clone(),
            hospital: doctor.hospital.clone(),
            rating: doctor.rating,
            experience: doctor.experience,
            education: doctor.education.clone(),
            bio: doctor.bio.clone(),
            languages: doctor.languages.clone(),
            accepting_new_patients: doctor.accepting_new_patients,
            image_url: doctor.image_url.clone(),
            contact: doctor.contact.clone(),
            created_by,
            created_at,
            updated_at: host(sys_time())?,
        };
        let updated_hash = host(update_entry(latest_hash, &listing))?;
        host(create_link(original.clone(), updated_hash, LinkTypes::DoctorUpdates, ()))?;

        if specialty_anchor_changed(&previous_specialty, &listing.specialty) {
            let anchor = host(specialty_anchor(&listing.specialty))?;
            host(create_link(anchor, original.clone(), LinkTypes::SpecialtyToDoctors, ()))?;
        }

        Ok(doctor_record(&original, listing))
    }
}

fn specialty_anchor_changed(previous: &str, current: &str) -> bool {
    previous.trim().to_lowercase() != current.trim().to_lowercase()
}

// ============================================================================
// Ratings
// ============================================================================

impl RatingStore for DhtStore {
    fn get_rating(&self, id: &RatingId) -> StoreResult<Option<RatingRecord>> {
        let original = match action_from_id(id.as_str()) {
            Ok(original) => original,
            Err(_) => return Ok(None),
        };
        Ok(host(self.load_review(&original))?.map(|(_, review)| rating_record(&original, review)))
    }

    fn list_ratings_by_doctor(&self, doctor_id: &DoctorId) -> StoreResult<Vec<RatingRecord>> {
        let doctor = match parse_doctor(doctor_id) {
            Some(doctor) => doctor,
            None => return Ok(Vec::new()),
        };
        host(linked(doctor, LinkTypes::DoctorToReviews).and_then(|originals| self.load_reviews(originals)))
    }

    fn get_rating_by_doctor_and_rater(
        &self,
        doctor_id: &DoctorId,
        rater: &IdentityId,
    ) -> StoreResult<Option<RatingRecord>> {
        let agent = match parse_agent(rater) {
            Some(agent) => agent,
            None => return Ok(None),
        };
        let ratings = host(linked(agent, LinkTypes::RaterToReviews).and_then(|originals| self.load_reviews(originals)))?;
        Ok(ratings.into_iter().find(|rating| &rating.doctor_id == doctor_id))
    }

    fn insert_rating(&self, rating: NewRating) -> StoreResult<RatingRecord> {
        let doctor_hash = require_doctor(&rating.doctor_id)?;
        let rater = require_agent(&rating.rater_identity_id)?;
        let insert = || -> Host<RatingRecord> {
            let now = sys_time()?;
            let review = DoctorReview {
                doctor_hash: doctor_hash.clone(),
                rater: rater.clone(),
                rating: rating.rating,
                comment: rating.comment.clone(),
                doctor_response: None,
                created_at: now,
                updated_at: now,
            };
            let hash = create_entry(&EntryTypes::DoctorReview(review.clone()))?;
            created(hash.clone(), "review")?;

            create_link(doctor_hash.clone(), hash.clone(), LinkTypes::DoctorToReviews, ())?;
            create_link(rater.clone(), hash.clone(), LinkTypes::RaterToReviews, ())?;

            Ok(rating_record(&hash, review))
        };
        host(insert())
    }

    fn update_rating(&self, id: &RatingId, patch: RatingPatch) -> StoreResult<RatingRecord> {
        let original = action_from_id(id.as_str())
            .map_err(|_| StoreError::NotFound(format!("rating {}", id)))?;
        let (latest_hash, mut review) = host(self.load_review(&original))?
            .ok_or_else(|| StoreError::NotFound(format!("rating {}", id)))?;

        if let Some(score) = patch.rating {
            review.rating = score;
        }
        if let Some(comment) = patch.comment {
            review.comment = comment;
        }
        if let Some(response) = patch.doctor_response {
            review.doctor_response = Some(response);
        }
        review.updated_at = host(sys_time())?;

        let updated_hash = host(update_entry(latest_hash, &review))?;
        host(create_link(original.clone(), updated_hash, LinkTypes::ReviewUpdates, ()))?;
        Ok(rating_record(&original, review))
    }
}

// ============================================================================
// Claims
// ============================================================================

impl VerificationStore for DhtStore {
    fn get_verification_by_doctor_and_identity(
        &self,
        doctor_id: &DoctorId,
        identity: &IdentityId,
    ) -> StoreResult<Option<VerificationRecord>> {
        let agent = match parse_agent(identity) {
            Some(agent) => agent,
            None => return Ok(None),
        };
        let claims = host(linked(agent, LinkTypes::ClaimantToClaims).and_then(|originals| self.load_claims(originals)))?;
        Ok(claims.into_iter().find(|claim| &claim.doctor_id == doctor_id))
    }

    fn list_verified_by_identity(&self, identity: &IdentityId) -> StoreResult<Vec<VerificationRecord>> {
        let agent = match parse_agent(identity) {
            Some(agent) => agent,
            None => return Ok(Vec::new()),
        };
        let claims = host(linked(agent, LinkTypes::ClaimantToClaims).and_then(|originals| self.load_claims(originals)))?;
        Ok(claims.into_iter().filter(|claim| claim.verified).collect())
    }

    fn list_verifications_by_doctor(&self, doctor_id: &DoctorId) -> StoreResult<Vec<VerificationRecord>> {
        let doctor = match parse_doctor(doctor_id) {
            Some(doctor) => doctor,
            None => return Ok(Vec::new()),
        };
        host(linked(doctor, LinkTypes::DoctorToClaims).and_then(|originals| self.load_claims(originals)))
    }

    fn insert_verification(&self, verification: NewVerification) -> StoreResult<VerificationRecord> {
        let doctor_hash = require_doctor(&verification.doctor_id)?;
        let claimant = require_agent(&verification.identity_id)?;
        let insert = || -> Host<VerificationRecord> {
            let now = sys_time()?;
            let claim = DoctorClaim {
                doctor_hash: doctor_hash.clone(),
                claimant: claimant.clone(),
                verified: verification.verified,
                created_at: now,
                updated_at: now,
            };
            let hash = create_entry(&EntryTypes::DoctorClaim(claim.clone()))?;
            created(hash.clone(), "claim")?;

            create_link(doctor_hash.clone(), hash.clone(), LinkTypes::DoctorToClaims, ())?;
            create_link(claimant.clone(), hash.clone(), LinkTypes::ClaimantToClaims, ())?;

            Ok(verification_record(&hash, claim))
        };
        host(insert())
    }
}

// ============================================================================
// Profiles
// ============================================================================

impl ProfileStore for DhtStore {
    fn get_profile(&self, identity: &IdentityId) -> StoreResult<Option<Profile>> {
        let agent = match parse_agent(identity) {
            Some(agent) => agent,
            None => return Ok(None),
        };
        Ok(host(self.load_profile(&agent))?.map(|(_, _, profile)| profile_record(profile)))
    }

    fn insert_profile(&self, identity: &IdentityId, profile: NewProfile) -> StoreResult<Profile> {
        let owner = require_agent(identity)?;
        if host(self.load_profile(&owner))?.is_some() {
            return Err(StoreError::Conflict(format!("profile {} exists", identity)));
        }
        let insert = || -> Host<Profile> {
            let now = sys_time()?;
            let entry = UserProfile {
                owner: owner.clone(),
                first_name: profile.first_name.clone(),
                last_name: profile.last_name.clone(),
                role: profile.role,
                created_at: now,
                updated_at: now,
            };
            let hash = create_entry(&EntryTypes::UserProfile(entry.clone()))?;
            created(hash.clone(), "profile")?;
            create_link(owner.clone(), hash, LinkTypes::AgentToProfile, ())?;
            Ok(profile_record(entry))
        };
        host(insert())
    }

    fn update_profile(&self, identity: &IdentityId, patch: ProfilePatch) -> StoreResult<Profile> {
        let owner = require_agent(identity)?;
        let (original, latest_hash, mut entry) = host(self.load_profile(&owner))?
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", identity)))?;

        if let Some(ref first) = patch.first_name {
            entry.first_name = Some(first.clone());
        }
        if let Some(ref last) = patch.last_name {
            entry.last_name = Some(last.clone());
        }
        entry.updated_at = host(sys_time())?;

        let updated_hash = host(update_entry(latest_hash, &entry))?;
        host(create_link(original, updated_hash, LinkTypes::ProfileUpdates, ()))?;
        Ok(profile_record(entry))
    }
}
