//! Input validation for directory writes
//!
//! Validators accumulate every problem into a `ValidationResult` so a form can
//! highlight all bad fields at once. The primitive validators are also used
//! by the DHT integrity callbacks.

use serde::{Deserialize, Serialize};

use crate::config::DirectoryConfig;
use crate::error::DirectoryError;
use crate::model::{Contact, DoctorPatch, NewDoctor, NewProfile, ProfilePatch};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Longest plausible career, in years
pub const MAX_EXPERIENCE_YEARS: u32 = 80;

/// Validation error with detailed context
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: ValidationErrorCode,
}

/// Specific validation error codes for programmatic handling
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValidationErrorCode {
    Required,
    InvalidFormat,
    OutOfRange,
    TooLong,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({:?})", self.field, self.message, self.code)
    }
}

/// Validation result that can accumulate multiple errors
#[derive(Clone, Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add_error(&mut self, field: &str, message: &str, code: ValidationErrorCode) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
            code,
        });
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    /// Joined message, or `None` when valid
    pub fn message(&self) -> Option<String> {
        if self.is_valid() {
            return None;
        }
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        Some(messages.join("; "))
    }

    pub fn into_result(self) -> Result<(), DirectoryError> {
        match self.message() {
            None => Ok(()),
            Some(message) => Err(DirectoryError::Validation(message)),
        }
    }
}

/// Rating score must be a whole number of stars in 1..=5
pub fn validate_rating_score(score: u8) -> ValidationResult {
    let mut result = ValidationResult::new();
    if !(MIN_RATING..=MAX_RATING).contains(&score) {
        result.add_error(
            "rating",
            &format!("Rating must be between {} and {}", MIN_RATING, MAX_RATING),
            ValidationErrorCode::OutOfRange,
        );
    }
    result
}

/// Required free text: present after trimming and within `max_len` characters
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> ValidationResult {
    let mut result = ValidationResult::new();
    if value.trim().is_empty() {
        result.add_error(field, &format!("{} is required", field), ValidationErrorCode::Required);
        return result;
    }
    result.merge(validate_text_length(value, field, max_len));
    result
}

pub fn validate_text_length(value: &str, field: &str, max_len: usize) -> ValidationResult {
    let mut result = ValidationResult::new();
    if value.chars().count() > max_len {
        result.add_error(
            field,
            &format!("{} cannot exceed {} characters", field, max_len),
            ValidationErrorCode::TooLong,
        );
    }
    result
}

pub fn validate_optional_text(value: Option<&str>, field: &str, max_len: usize) -> ValidationResult {
    match value {
        Some(text) => validate_text_length(text, field, max_len),
        None => ValidationResult::new(),
    }
}

/// Free-form list that must carry at least one non-blank entry
pub fn validate_required_list(items: &[String], field: &str, max_len: usize) -> ValidationResult {
    let mut result = ValidationResult::new();
    if items.iter().all(|item| item.trim().is_empty()) {
        result.add_error(
            field,
            &format!("At least one {} entry is required", field),
            ValidationErrorCode::Required,
        );
    }
    for item in items {
        result.merge(validate_text_length(item, field, max_len));
    }
    result
}

/// Loose email shape check; empty is allowed since email is optional on listings
pub fn validate_email(email: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    let email = email.trim();
    if email.is_empty() {
        return result;
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        result.add_error("email", "Email address is not valid", ValidationErrorCode::InvalidFormat);
    }
    result
}

pub fn validate_experience(years: u32) -> ValidationResult {
    let mut result = ValidationResult::new();
    if years > MAX_EXPERIENCE_YEARS {
        result.add_error(
            "experience",
            &format!("Experience cannot exceed {} years", MAX_EXPERIENCE_YEARS),
            ValidationErrorCode::OutOfRange,
        );
    }
    result
}

pub fn validate_contact(contact: &Contact, config: &DirectoryConfig) -> ValidationResult {
    let max = config.max_text_length;
    let mut result = ValidationResult::new();
    result.merge(validate_required_text(&contact.phone, "phone", max));
    result.merge(validate_required_text(&contact.address, "address", max));
    result.merge(validate_required_text(contact.city.as_deref().unwrap_or(""), "city", max));
    result.merge(validate_required_text(contact.region.as_deref().unwrap_or(""), "region", max));
    result.merge(validate_email(&contact.email));
    result
}

/// Validate a listing draft. Call after `NewDoctor::normalize`.
pub fn validate_new_doctor(doctor: &NewDoctor, config: &DirectoryConfig) -> ValidationResult {
    let max = config.max_text_length;
    let mut result = ValidationResult::new();
    result.merge(validate_required_text(&doctor.name, "name", max));
    result.merge(validate_required_text(&doctor.specialty, "specialty", max));
    result.merge(validate_required_text(&doctor.hospital, "hospital", max));
    result.merge(validate_experience(doctor.experience));
    result.merge(validate_required_list(&doctor.education, "education", max));
    result.merge(validate_required_list(&doctor.languages, "languages", max));
    result.merge(validate_text_length(&doctor.bio, "bio", config.max_comment_length));
    result.merge(validate_contact(&doctor.contact, config));
    result
}

/// Validate the fields an edit actually touches
pub fn validate_doctor_patch(patch: &DoctorPatch, config: &DirectoryConfig) -> ValidationResult {
    let max = config.max_text_length;
    let mut result = ValidationResult::new();
    if let Some(ref name) = patch.name {
        result.merge(validate_required_text(name, "name", max));
    }
    if let Some(ref specialty) = patch.specialty {
        result.merge(validate_required_text(specialty, "specialty", max));
    }
    if let Some(ref hospital) = patch.hospital {
        result.merge(validate_required_text(hospital, "hospital", max));
    }
    if let Some(experience) = patch.experience {
        result.merge(validate_experience(experience));
    }
    if let Some(ref education) = patch.education {
        result.merge(validate_required_list(education, "education", max));
    }
    if let Some(ref languages) = patch.languages {
        result.merge(validate_required_list(languages, "languages", max));
    }
    if let Some(ref bio) = patch.bio {
        result.merge(validate_text_length(bio, "bio", config.max_comment_length));
    }
    if let Some(ref contact) = patch.contact {
        result.merge(validate_contact(contact, config));
    }
    if patch.rating.is_some() {
        result.add_error(
            "rating",
            "Rating is derived from reviews and cannot be edited",
            ValidationErrorCode::InvalidFormat,
        );
    }
    result
}

pub fn validate_rating_submission(score: u8, comment: Option<&str>, config: &DirectoryConfig) -> ValidationResult {
    let mut result = validate_rating_score(score);
    result.merge(validate_optional_text(comment, "comment", config.max_comment_length));
    result
}

pub fn validate_response(text: &str, config: &DirectoryConfig) -> ValidationResult {
    validate_required_text(text, "response", config.max_response_length)
}

fn validate_name_part(value: Option<&str>, field: &str, max_len: usize) -> ValidationResult {
    match value {
        Some(name) => validate_required_text(name, field, max_len),
        None => ValidationResult::new(),
    }
}

pub fn validate_new_profile(profile: &NewProfile, config: &DirectoryConfig) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.merge(validate_name_part(profile.first_name.as_deref(), "first_name", config.max_text_length));
    result.merge(validate_name_part(profile.last_name.as_deref(), "last_name", config.max_text_length));
    result
}

pub fn validate_profile_patch(patch: &ProfilePatch, config: &DirectoryConfig) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.merge(validate_name_part(patch.first_name.as_deref(), "first_name", config.max_text_length));
    result.merge(validate_name_part(patch.last_name.as_deref(), "last_name", config.max_text_length));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn draft() -> NewDoctor {
        NewDoctor {
            name: "Dr. Yacine Mansouri".to_string(),
            specialty: "Pediatrics".to_string(),
            subspecialties: None,
            hospital: "EHS Canastel".to_string(),
            experience: 8,
            education: vec!["Faculté de médecine d'Oran".to_string()],
            bio: "Pediatrician".to_string(),
            languages: vec!["Arabic".to_string()],
            accepting_new_patients: true,
            image_url: String::new(),
            contact: Contact {
                phone: "041 00 00 00".to_string(),
                email: "yacine@example.org".to_string(),
                address: "Boulevard de l'ALN".to_string(),
                city: Some("Oran".to_string()),
                region: Some("Oran".to_string()),
            },
            created_by_identity: None,
        }
    }

    #[test]
    fn test_validate_rating_score_bounds() {
        assert!(validate_rating_score(1).is_valid());
        assert!(validate_rating_score(5).is_valid());

        let result = validate_rating_score(0);
        assert!(!result.is_valid());
        assert_eq!(result.errors[0].code, ValidationErrorCode::OutOfRange);

        assert!(!validate_rating_score(6).is_valid());
    }

    #[test]
    fn test_validate_new_doctor_valid() {
        let config = DirectoryConfig::default();
        assert!(validate_new_doctor(&draft(), &config).is_valid());
    }

    #[test]
    fn test_validate_new_doctor_collects_all_errors() {
        let config = DirectoryConfig::default();
        let mut doctor = draft();
        doctor.name = "  ".to_string();
        doctor.languages = vec![];
        doctor.contact.city = None;
        doctor.contact.email = "not-an-email".to_string();

        let result = validate_new_doctor(&doctor, &config);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "languages", "city", "email"]);
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("").is_valid());
        assert!(validate_email("a@b.dz").is_valid());
        assert!(!validate_email("@b.dz").is_valid());
        assert!(!validate_email("a@.dz").is_valid());
        assert!(!validate_email("a@localhost").is_valid());
    }

    #[test]
    fn test_validate_patch_rejects_rating() {
        let config = DirectoryConfig::default();
        let patch = DoctorPatch::rating_only(4.5);
        let result = validate_doctor_patch(&patch, &config);
        assert!(!result.is_valid());
        assert_eq!(result.errors[0].field, "rating");
    }

    #[test]
    fn test_validate_response_requires_text() {
        let config = DirectoryConfig::default();
        assert!(!validate_response("   ", &config).is_valid());
        assert!(validate_response("Thank you for the feedback", &config).is_valid());

        let long = "a".repeat(config.max_response_length + 1);
        let result = validate_response(&long, &config);
        assert_eq!(result.errors[0].code, ValidationErrorCode::TooLong);
    }

    #[test]
    fn test_validate_profile_names() {
        let config = DirectoryConfig::default();
        let profile = NewProfile {
            first_name: Some(String::new()),
            last_name: None,
            role: Role::Patient,
        };
        assert!(!validate_new_profile(&profile, &config).is_valid());
    }

    #[test]
    fn test_validation_result_merge_and_message() {
        let mut result = ValidationResult::new();
        result.add_error("a", "first", ValidationErrorCode::Required);

        let mut other = ValidationResult::new();
        other.add_error("b", "second", ValidationErrorCode::TooLong);

        result.merge(other);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(
            result.message().unwrap(),
            "a: first (Required); b: second (TooLong)"
        );
        assert!(matches!(result.into_result(), Err(DirectoryError::Validation(_))));
    }
}
