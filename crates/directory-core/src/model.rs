//! Directory data model
//!
//! Records as the store hands them out, plus the drafts and patches the
//! service sends back in. Identifiers are opaque strings chosen by the store.

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

record_id!(
    /// Stable principal issued by the identity provider
    IdentityId
);
record_id!(DoctorId);
record_id!(RatingId);
record_id!(VerificationId);

// ============================================================================
// Profiles
// ============================================================================

/// Flat user roles. There is no hierarchy beyond these two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[display(fmt = "patient")]
    Patient,
    #[display(fmt = "doctor")]
    Doctor,
}

/// Application-level record attached to an identity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: IdentityId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Name shown next to reviews and in headers
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let last = self.last_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (first, last) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.to_string(),
            _ => ANONYMOUS.to_string(),
        }
    }
}

/// Display name used when a reviewer has no readable profile
pub const ANONYMOUS: &str = "Anonymous";

/// Fields supplied when a profile is provisioned on first sign-in
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
}

/// Owner edits to a profile. The role is fixed at provisioning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfilePatch {
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(ref first) = self.first_name {
            profile.first_name = Some(first.clone());
        }
        if let Some(ref last) = self.last_name {
            profile.last_name = Some(last.clone());
        }
    }
}

// ============================================================================
// Doctor listings
// ============================================================================

/// Structured contact details. City and region are explicit fields and are
/// never packed into the address line.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: Option<String>,
    pub region: Option<String>,
}

/// A directory listing for a doctor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: DoctorId,
    pub name: String,
    pub specialty: String,
    pub subspecialties: Option<Vec<String>>,
    pub hospital: String,
    /// Cached average of the doctor's ratings; the rating set is authoritative
    pub rating: f64,
    pub experience: u32,
    pub education: Vec<String>,
    pub bio: String,
    pub languages: Vec<String>,
    pub accepting_new_patients: bool,
    pub image_url: String,
    pub contact: Contact,
    pub created_by_identity: Option<IdentityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing fields supplied by a creator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub specialty: String,
    pub subspecialties: Option<Vec<String>>,
    pub hospital: String,
    pub experience: u32,
    pub education: Vec<String>,
    pub bio: String,
    pub languages: Vec<String>,
    pub accepting_new_patients: bool,
    pub image_url: String,
    pub contact: Contact,
    /// Stamped by the service from the session, never taken from input
    #[serde(default)]
    pub created_by_identity: Option<IdentityId>,
}

impl NewDoctor {
    /// Trim list entries, drop blank ones, and store an empty subspecialty
    /// list as absent.
    pub fn normalize(&mut self) {
        self.education = clean_list(&self.education);
        self.languages = clean_list(&self.languages);
        self.subspecialties = self
            .subspecialties
            .as_ref()
            .map(|items| clean_list(items))
            .filter(|items| !items.is_empty());
    }
}

/// Absent field stays `None`, an explicit `null` becomes `Some(None)`
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update to a listing. `rating` is only ever set by the aggregator.
///
/// `subspecialties: null` clears the list; leaving the field out keeps it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorPatch {
    pub name: Option<String>,
    pub specialty: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub subspecialties: Option<Option<Vec<String>>>,
    pub hospital: Option<String>,
    pub rating: Option<f64>,
    pub experience: Option<u32>,
    pub education: Option<Vec<String>>,
    pub bio: Option<String>,
    pub languages: Option<Vec<String>>,
    pub accepting_new_patients: Option<bool>,
    pub image_url: Option<String>,
    pub contact: Option<Contact>,
}

impl DoctorPatch {
    pub fn rating_only(rating: f64) -> Self {
        Self {
            rating: Some(rating),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn normalize(&mut self) {
        if let Some(ref education) = self.education {
            self.education = Some(clean_list(education));
        }
        if let Some(ref languages) = self.languages {
            self.languages = Some(clean_list(languages));
        }
        if let Some(Some(ref subspecialties)) = self.subspecialties {
            let cleaned = clean_list(subspecialties);
            self.subspecialties = Some(if cleaned.is_empty() { None } else { Some(cleaned) });
        }
    }

    pub fn apply_to(&self, doctor: &mut DoctorRecord) {
        if let Some(ref name) = self.name {
            doctor.name = name.clone();
        }
        if let Some(ref specialty) = self.specialty {
            doctor.specialty = specialty.clone();
        }
        if let Some(ref subspecialties) = self.subspecialties {
            doctor.subspecialties = subspecialties.clone();
        }
        if let Some(ref hospital) = self.hospital {
            doctor.hospital = hospital.clone();
        }
        if let Some(rating) = self.rating {
            doctor.rating = rating;
        }
        if let Some(experience) = self.experience {
            doctor.experience = experience;
        }
        if let Some(ref education) = self.education {
            doctor.education = education.clone();
        }
        if let Some(ref bio) = self.bio {
            doctor.bio = bio.clone();
        }
        if let Some(ref languages) = self.languages {
            doctor.languages = languages.clone();
        }
        if let Some(accepting) = self.accepting_new_patients {
            doctor.accepting_new_patients = accepting;
        }
        if let Some(ref image_url) = self.image_url {
            doctor.image_url = image_url.clone();
        }
        if let Some(ref contact) = self.contact {
            doctor.contact = contact.clone();
        }
    }
}

/// Listing query. Blank strings are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorFilter {
    /// Exact specialty match
    pub specialty: Option<String>,
    /// Case-insensitive substring over name, specialty and hospital
    pub search: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub created_by: Option<IdentityId>,
    #[serde(default)]
    pub accepting_new_patients_only: bool,
}

impl DoctorFilter {
    pub fn created_by(identity: &IdentityId) -> Self {
        Self {
            created_by: Some(identity.clone()),
            ..Self::default()
        }
    }

    pub fn matches(&self, doctor: &DoctorRecord) -> bool {
        if let Some(specialty) = non_blank(&self.specialty) {
            if doctor.specialty != specialty {
                return false;
            }
        }

        if let Some(term) = non_blank(&self.search) {
            let term = term.to_lowercase();
            let hit = [&doctor.name, &doctor.specialty, &doctor.hospital]
                .iter()
                .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }

        if let Some(city) = non_blank(&self.city) {
            if !contains_ignore_case(doctor.contact.city.as_deref(), city) {
                return false;
            }
        }

        if let Some(region) = non_blank(&self.region) {
            if !contains_ignore_case(doctor.contact.region.as_deref(), region) {
                return false;
            }
        }

        if let Some(ref creator) = self.created_by {
            if doctor.created_by_identity.as_ref() != Some(creator) {
                return false;
            }
        }

        !self.accepting_new_patients_only || doctor.accepting_new_patients
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Ratings
// ============================================================================

/// One rater's review of one doctor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub id: RatingId,
    pub doctor_id: DoctorId,
    pub rater_identity_id: IdentityId,
    pub rating: u8,
    pub comment: Option<String>,
    pub doctor_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRating {
    pub doctor_id: DoctorId,
    pub rater_identity_id: IdentityId,
    pub rating: u8,
    pub comment: Option<String>,
}

/// Partial update to a rating. `comment: Some(None)` clears the comment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingPatch {
    pub rating: Option<u8>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub comment: Option<Option<String>>,
    pub doctor_response: Option<String>,
}

impl RatingPatch {
    /// Patch replacing score and comment, leaving any doctor response intact
    pub fn resubmission(rating: u8, comment: Option<String>) -> Self {
        Self {
            rating: Some(rating),
            comment: Some(comment),
            doctor_response: None,
        }
    }

    pub fn response(text: impl Into<String>) -> Self {
        Self {
            doctor_response: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, rating: &mut RatingRecord) {
        if let Some(score) = self.rating {
            rating.rating = score;
        }
        if let Some(ref comment) = self.comment {
            rating.comment = comment.clone();
        }
        if let Some(ref response) = self.doctor_response {
            rating.doctor_response = Some(response.clone());
        }
    }
}

// ============================================================================
// Verification claims
// ============================================================================

/// Assertion by an identity that they are the doctor behind a listing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: VerificationId,
    pub doctor_id: DoctorId,
    pub identity_id: IdentityId,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewVerification {
    pub doctor_id: DoctorId,
    pub identity_id: IdentityId,
    pub verified: bool,
}
