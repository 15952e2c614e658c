//! Doctors Integrity Zome
//!
//! Defines entry types for the doctor directory:
//! - User profiles (name and patient/doctor role per agent)
//! - Doctor listings with a cached average rating
//! - Reviews with an optional doctor response
//! - Ownership claims on listings
//!
//! Content rules are shared with the coordinator through `directory-core`.
//! Updates keep owner fields fixed, profiles change only by their owner and
//! update links must lead back to their base. Who may edit a listing or
//! answer a review depends on claims held elsewhere on the DHT and is
//! enforced by the coordinator.

use directory_core::validation::{self, ValidationResult};
use directory_core::{Contact, DirectoryConfig, NewProfile, Role};
use hdi::prelude::*;

// ============================================================================
// Entry Types
// ============================================================================

/// Application profile for one agent
#[hdk_entry_helper]
#[derive(Clone, PartialEq)]
pub struct UserProfile {
    pub owner: AgentPubKey,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Directory listing for a doctor
#[hdk_entry_helper]
#[derive(Clone, PartialEq)]
pub struct DoctorListing {
    pub name: String,
    pub specialty: String,
    pub subspecialties: Option<Vec<String>>,
    pub hospital: String,
    /// Cached average of the listing's reviews, one decimal
    pub rating: f64,
    pub experience: u32,
    pub education: Vec<String>,
    pub bio: String,
    pub languages: Vec<String>,
    pub accepting_new_patients: bool,
    pub image_url: String,
    pub contact: Contact,
    /// Agent that created the listing; absent for imported listings
    pub created_by: Option<AgentPubKey>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One agent's review of one listing
#[hdk_entry_helper]
#[derive(Clone, PartialEq)]
pub struct DoctorReview {
    /// Original create action of the listing
    pub doctor_hash: ActionHash,
    pub rater: AgentPubKey,
    pub rating: u8,
    pub comment: Option<String>,
    pub doctor_response: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Claim by an agent to be the doctor behind a listing
#[hdk_entry_helper]
#[derive(Clone, PartialEq)]
pub struct DoctorClaim {
    pub doctor_hash: ActionHash,
    pub claimant: AgentPubKey,
    pub verified: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ============================================================================
// Entry and Link Type Enums
// ============================================================================

#[hdk_entry_types]
#[unit_enum(UnitEntryTypes)]
pub enum EntryTypes {
    UserProfile(UserProfile),
    DoctorListing(DoctorListing),
    DoctorReview(DoctorReview),
    DoctorClaim(DoctorClaim),
}

#[hdk_link_types]
pub enum LinkTypes {
    /// All listings anchor
    AllDoctors,
    /// Specialty anchor to listings
    SpecialtyToDoctors,
    /// Creating agent to their listings
    CreatorToDoctors,
    /// Listing updates
    DoctorUpdates,
    /// Listing to its reviews
    DoctorToReviews,
    /// Rating agent to their reviews
    RaterToReviews,
    /// Review updates (resubmissions and responses)
    ReviewUpdates,
    /// Listing to claims on it
    DoctorToClaims,
    /// Claiming agent to their claims
    ClaimantToClaims,
    /// Agent to their profile
    AgentToProfile,
    /// Profile updates
    ProfileUpdates,
}

// ============================================================================
// Configuration
// ============================================================================

/// Directory settings from the DNA properties, defaults when absent or
/// unreadable
pub fn directory_config() -> DirectoryConfig {
    match dna_info() {
        Ok(info) => {
            holochain_serialized_bytes::decode::<_, DirectoryConfig>(info.modifiers.properties.bytes())
                .unwrap_or_default()
        }
        Err(_) => DirectoryConfig::default(),
    }
}

// ============================================================================
// Validation Functions
// ============================================================================

#[hdk_extern]
pub fn validate(op: Op) -> ExternResult<ValidateCallbackResult> {
    match op.flattened::<EntryTypes, LinkTypes>()? {
        FlatOp::StoreEntry(store_entry) => match store_entry {
            OpEntry::CreateEntry { app_entry, action } => {
                let config = directory_config();
                let authorship = validate_authorship(&app_entry, &action.author);
                if authorship != ValidateCallbackResult::Valid {
                    return Ok(authorship);
                }
                Ok(validate_entry_content(&app_entry, &config))
            }
            OpEntry::UpdateEntry {
                app_entry,
                action,
                original_action_hash,
                ..
            } => {
                let previous_record = must_get_valid_record(original_action_hash)?;
                if previous_record.action().entry_type() != Some(&action.entry_type) {
                    return Ok(ValidateCallbackResult::Invalid(
                        "Entries can only be updated to the same type".to_string(),
                    ));
                }
                let previous = match previous_entry(&previous_record, &app_entry)? {
                    Some(previous) => previous,
                    None => {
                        return Ok(ValidateCallbackResult::Invalid(
                            "Updated entry could not be read".to_string(),
                        ))
                    }
                };
                let rules = validate_update(&previous, &app_entry, &action.author);
                if rules != ValidateCallbackResult::Valid {
                    return Ok(rules);
                }
                Ok(validate_entry_content(&app_entry, &directory_config()))
            }
            _ => Ok(ValidateCallbackResult::Valid),
        },
        FlatOp::RegisterCreateLink {
            link_type,
            base_address,
            target_address,
            action,
            ..
        } => {
            let result = validate_create_link(link_type, &base_address, &action.author);
            if result != ValidateCallbackResult::Valid {
                return Ok(result);
            }
            match link_type {
                LinkTypes::DoctorUpdates | LinkTypes::ReviewUpdates | LinkTypes::ProfileUpdates => {
                    validate_update_link(&base_address, &target_address)
                }
                _ => Ok(ValidateCallbackResult::Valid),
            }
        }
        _ => Ok(ValidateCallbackResult::Valid),
    }
}

/// Decode the entry of `record` as the same type as `updated`
fn previous_entry(record: &Record, updated: &EntryTypes) -> ExternResult<Option<EntryTypes>> {
    let entry = record.entry();
    let decoded = match updated {
        EntryTypes::UserProfile(_) => entry.to_app_option::<UserProfile>().map(|e| e.map(EntryTypes::UserProfile)),
        EntryTypes::DoctorListing(_) => entry.to_app_option::<DoctorListing>().map(|e| e.map(EntryTypes::DoctorListing)),
        EntryTypes::DoctorReview(_) => entry.to_app_option::<DoctorReview>().map(|e| e.map(EntryTypes::DoctorReview)),
        EntryTypes::DoctorClaim(_) => entry.to_app_option::<DoctorClaim>().map(|e| e.map(EntryTypes::DoctorClaim)),
    };
    decoded.map_err(|e| wasm_error!(WasmErrorInner::Guest(e.to_string())))
}

/// Fields that tie an entry to an agent or a listing are fixed at creation.
///
/// Profiles are edited by their owner only. A review's score and comment
/// belong to the rater, its response to anyone else; which agents may
/// respond or edit a listing depends on claims and is checked by the
/// coordinator. Claims are never updated.
pub fn validate_update(previous: &EntryTypes, updated: &EntryTypes, author: &AgentPubKey) -> ValidateCallbackResult {
    let invalid = |message: &str| ValidateCallbackResult::Invalid(message.to_string());
    match (previous, updated) {
        (EntryTypes::UserProfile(previous), EntryTypes::UserProfile(updated)) => {
            if updated.owner != previous.owner || updated.role != previous.role {
                return invalid("Profile owner and role cannot change");
            }
            if &previous.owner != author {
                return invalid("Profiles can only be updated by their owner");
            }
            if updated.created_at != previous.created_at {
                return invalid("Creation time cannot change");
            }
            ValidateCallbackResult::Valid
        }
        (EntryTypes::DoctorListing(previous), EntryTypes::DoctorListing(updated)) => {
            if updated.created_by != previous.created_by {
                return invalid("Listing creator cannot change");
            }
            if updated.created_at != previous.created_at {
                return invalid("Creation time cannot change");
            }
            ValidateCallbackResult::Valid
        }
        (EntryTypes::DoctorReview(previous), EntryTypes::DoctorReview(updated)) => {
            if updated.rater != previous.rater || updated.doctor_hash != previous.doctor_hash {
                return invalid("Review rater and doctor cannot change");
            }
            if updated.created_at != previous.created_at {
                return invalid("Creation time cannot change");
            }
            if &previous.rater == author {
                if updated.doctor_response != previous.doctor_response {
                    return invalid("Raters cannot answer their own review");
                }
            } else if updated.rating != previous.rating || updated.comment != previous.comment {
                return invalid("Only the rater can change a review's score or comment");
            }
            ValidateCallbackResult::Valid
        }
        (EntryTypes::DoctorClaim(_), EntryTypes::DoctorClaim(_)) => invalid("Claims cannot be updated"),
        _ => invalid("Entries can only be updated to the same type"),
    }
}

/// Update links must point at an update whose chain leads back to the base
fn validate_update_link(
    base_address: &AnyLinkableHash,
    target_address: &AnyLinkableHash,
) -> ExternResult<ValidateCallbackResult> {
    let (base, target) = match (base_address.clone().into_action_hash(), target_address.clone().into_action_hash()) {
        (Some(base), Some(target)) => (base, target),
        _ => {
            return Ok(ValidateCallbackResult::Invalid(
                "Update links must join two actions".to_string(),
            ))
        }
    };
    if base == target {
        return Ok(ValidateCallbackResult::Invalid(
            "Update links must point at an update".to_string(),
        ));
    }
    match update_chain_root(target)? {
        Some(root) if root == base => Ok(ValidateCallbackResult::Valid),
        _ => Ok(ValidateCallbackResult::Invalid(
            "Update link target is not an update of its base".to_string(),
        )),
    }
}

/// Create action an update chain starts from
fn update_chain_root(mut hash: ActionHash) -> ExternResult<Option<ActionHash>> {
    loop {
        let signed = must_get_action(hash.clone())?;
        match signed.action() {
            Action::Update(update) => hash = update.original_action_address.clone(),
            Action::Create(_) => return Ok(Some(hash)),
            _ => return Ok(None),
        }
    }
}

/// Entries naming an agent may only be created by that agent
pub fn validate_authorship(entry: &EntryTypes, author: &AgentPubKey) -> ValidateCallbackResult {
    let (owner, what) = match entry {
        EntryTypes::UserProfile(profile) => (Some(&profile.owner), "Profiles"),
        EntryTypes::DoctorListing(listing) => (listing.created_by.as_ref(), "Listings"),
        EntryTypes::DoctorReview(review) => (Some(&review.rater), "Reviews"),
        EntryTypes::DoctorClaim(claim) => (Some(&claim.claimant), "Claims"),
    };
    match owner {
        Some(owner) if owner != author => ValidateCallbackResult::Invalid(format!(
            "{} can only be created by the agent they name",
            what
        )),
        _ => ValidateCallbackResult::Valid,
    }
}

pub fn validate_entry_content(entry: &EntryTypes, config: &DirectoryConfig) -> ValidateCallbackResult {
    let result = match entry {
        EntryTypes::UserProfile(profile) => validate_user_profile(profile, config),
        EntryTypes::DoctorListing(listing) => validate_doctor_listing(listing, config),
        EntryTypes::DoctorReview(review) => validate_doctor_review(review, config),
        EntryTypes::DoctorClaim(_) => ValidationResult::new(),
    };
    match result.message() {
        Some(message) => ValidateCallbackResult::Invalid(message),
        None => ValidateCallbackResult::Valid,
    }
}

fn validate_user_profile(profile: &UserProfile, config: &DirectoryConfig) -> ValidationResult {
    let names = NewProfile {
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        role: profile.role,
    };
    validation::validate_new_profile(&names, config)
}

fn validate_doctor_listing(listing: &DoctorListing, config: &DirectoryConfig) -> ValidationResult {
    let max = config.max_text_length;
    let mut result = ValidationResult::new();
    result.merge(validation::validate_required_text(&listing.name, "name", max));
    result.merge(validation::validate_required_text(&listing.specialty, "specialty", max));
    result.merge(validation::validate_required_text(&listing.hospital, "hospital", max));
    result.merge(validation::validate_experience(listing.experience));
    result.merge(validation::validate_required_list(&listing.education, "education", max));
    result.merge(validation::validate_required_list(&listing.languages, "languages", max));
    result.merge(validation::validate_text_length(&listing.bio, "bio", config.max_comment_length));
    result.merge(validation::validate_contact(&listing.contact, config));

    let in_range = listing.rating.is_finite()
        && listing.rating >= 0.0
        && listing.rating <= f64::from(validation::MAX_RATING);
    if !in_range {
        result.add_error(
            "rating",
            "Cached rating must be between 0 and 5",
            validation::ValidationErrorCode::OutOfRange,
        );
    }
    result
}

fn validate_doctor_review(review: &DoctorReview, config: &DirectoryConfig) -> ValidationResult {
    let mut result = validation::validate_rating_submission(review.rating, review.comment.as_deref(), config);
    if let Some(ref response) = review.doctor_response {
        result.merge(validation::validate_response(response, config));
    }
    result
}

/// Agent-rooted index links may only be written by that agent
pub fn validate_create_link(
    link_type: LinkTypes,
    base_address: &AnyLinkableHash,
    author: &AgentPubKey,
) -> ValidateCallbackResult {
    match link_type {
        LinkTypes::CreatorToDoctors
        | LinkTypes::RaterToReviews
        | LinkTypes::ClaimantToClaims
        | LinkTypes::AgentToProfile => {
            if *base_address != AnyLinkableHash::from(author.clone()) {
                return ValidateCallbackResult::Invalid(
                    "Agent index links must be based on the author".to_string(),
                );
            }
            ValidateCallbackResult::Valid
        }
        LinkTypes::AllDoctors
        | LinkTypes::SpecialtyToDoctors
        | LinkTypes::DoctorUpdates
        | LinkTypes::DoctorToReviews
        | LinkTypes::ReviewUpdates
        | LinkTypes::DoctorToClaims
        | LinkTypes::ProfileUpdates => ValidateCallbackResult::Valid,
    }
}
