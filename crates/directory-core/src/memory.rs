//! In-memory directory backend
//!
//! Used by native callers and tests. Every table sits behind one lock, so
//! rating upserts are atomic and a second verified claim for the same
//! identity is rejected with a conflict.
//!
//! Failures can be injected per table group to exercise the degraded paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crate::model::*;
use crate::session::{IdentityProvider, Session};
use crate::store::*;

#[derive(Default)]
struct Tables {
    doctors: Vec<DoctorRecord>,
    ratings: Vec<RatingRecord>,
    verifications: Vec<VerificationRecord>,
    profiles: Vec<Profile>,
    next_id: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    /// Wall clock, nudged forward so timestamps are strictly increasing
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    tables: Mutex<Tables>,
    fail_all: AtomicBool,
    fail_profile_reads: AtomicBool,
    fail_doctor_updates: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    pub fn fail_profile_reads(&self, failing: bool) {
        self.fail_profile_reads.store(failing, Ordering::SeqCst);
    }

    /// Fail doctor updates only, which is where the cached average is written
    pub fn fail_doctor_updates(&self, failing: bool) {
        self.fail_doctor_updates.store(failing, Ordering::SeqCst);
    }

    /// Overwrite a cached average without touching the ratings
    pub fn set_cached_rating(&self, id: &DoctorId, rating: f64) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let doctor = tables
            .doctors
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", id)))?;
        doctor.rating = rating;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("directory lock poisoned".to_string()))
    }

    fn check(flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {} failure", what)));
        }
        Ok(())
    }
}

impl DoctorStore for InMemoryDirectory {
    fn get_doctor(&self, id: &DoctorId) -> StoreResult<Option<DoctorRecord>> {
        let tables = self.lock()?;
        Ok(tables.doctors.iter().find(|d| &d.id == id).cloned())
    }

    fn list_doctors(&self, filter: &DoctorFilter) -> StoreResult<Vec<DoctorRecord>> {
        let tables = self.lock()?;
        Ok(tables.doctors.iter().filter(|d| filter.matches(d)).cloned().collect())
    }

    fn insert_doctor(&self, doctor: NewDoctor) -> StoreResult<DoctorRecord> {
        let mut tables = self.lock()?;
        let id = DoctorId::new(tables.next_id("doctor"));
        let now = tables.now();
        let record = DoctorRecord {
            id,
            name: doctor.name,
            specialty: doctor.specialty,
            subspecialties: doctor.subspecialties,
            hospital: doctor.hospital,
            rating: 0.0,
            experience: doctor.experience,
            education: doctor.education,
            bio: doctor.bio,
            languages: doctor.languages,
            accepting_new_patients: doctor.accepting_new_patients,
            image_url: doctor.image_url,
            contact: doctor.contact,
            created_by_identity: doctor.created_by_identity,
            created_at: now,
            updated_at: now,
        };
        tables.doctors.push(record.clone());
        Ok(record)
    }

    fn update_doctor(&self, id: &DoctorId, patch: DoctorPatch) -> StoreResult<DoctorRecord> {
        Self::check(&self.fail_doctor_updates, "doctor update")?;
        let mut tables = self.lock()?;
        let now = tables.now();
        let doctor = tables
            .doctors
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", id)))?;
        patch.apply_to(doctor);
        doctor.updated_at = now;
        Ok(doctor.clone())
    }
}

impl RatingStore for InMemoryDirectory {
    fn get_rating(&self, id: &RatingId) -> StoreResult<Option<RatingRecord>> {
        let tables = self.lock()?;
        Ok(tables.ratings.iter().find(|r| &r.id == id).cloned())
    }

    fn list_ratings_by_doctor(&self, doctor_id: &DoctorId) -> StoreResult<Vec<RatingRecord>> {
        let tables = self.lock()?;
        Ok(tables
            .ratings
            .iter()
            .filter(|r| &r.doctor_id == doctor_id)
            .cloned()
            .collect())
    }

    fn get_rating_by_doctor_and_rater(
        &self,
        doctor_id: &DoctorId,
        rater: &IdentityId,
    ) -> StoreResult<Option<RatingRecord>> {
        let tables = self.lock()?;
        Ok(tables
            .ratings
            .iter()
            .find(|r| &r.doctor_id == doctor_id && &r.rater_identity_id == rater)
            .cloned())
    }

    fn insert_rating(&self, rating: NewRating) -> StoreResult<RatingRecord> {
        let mut tables = self.lock()?;
        insert_rating_locked(&mut tables, rating)
    }

    fn update_rating(&self, id: &RatingId, patch: RatingPatch) -> StoreResult<RatingRecord> {
        let mut tables = self.lock()?;
        let now = tables.now();
        let rating = tables
            .ratings
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("rating {}", id)))?;
        patch.apply_to(rating);
        rating.updated_at = now;
        Ok(rating.clone())
    }

    fn upsert_rating(&self, rating: NewRating) -> StoreResult<RatingRecord> {
        let mut tables = self.lock()?;
        let existing = tables
            .ratings
            .iter()
            .position(|r| r.doctor_id == rating.doctor_id && r.rater_identity_id == rating.rater_identity_id);
        match existing {
            Some(index) => {
                let now = tables.now();
                let record = &mut tables.ratings[index];
                RatingPatch::resubmission(rating.rating, rating.comment).apply_to(record);
                record.updated_at = now;
                Ok(record.clone())
            }
            None => insert_rating_locked(&mut tables, rating),
        }
    }
}

fn insert_rating_locked(tables: &mut Tables, rating: NewRating) -> StoreResult<RatingRecord> {
    let duplicate = tables
        .ratings
        .iter()
        .any(|r| r.doctor_id == rating.doctor_id && r.rater_identity_id == rating.rater_identity_id);
    if duplicate {
        return Err(StoreError::Conflict(format!(
            "{} already rated doctor {}",
            rating.rater_identity_id, rating.doctor_id
        )));
    }
    let id = RatingId::new(tables.next_id("rating"));
    let now = tables.now();
    let record = RatingRecord {
        id,
        doctor_id: rating.doctor_id,
        rater_identity_id: rating.rater_identity_id,
        rating: rating.rating,
        comment: rating.comment,
        doctor_response: None,
        created_at: now,
        updated_at: now,
    };
    tables.ratings.push(record.clone());
    Ok(record)
}

impl VerificationStore for InMemoryDirectory {
    fn get_verification_by_doctor_and_identity(
        &self,
        doctor_id: &DoctorId,
        identity: &IdentityId,
    ) -> StoreResult<Option<VerificationRecord>> {
        let tables = self.lock()?;
        Ok(tables
            .verifications
            .iter()
            .find(|v| &v.doctor_id == doctor_id && &v.identity_id == identity)
            .cloned())
    }

    fn list_verified_by_identity(&self, identity: &IdentityId) -> StoreResult<Vec<VerificationRecord>> {
        let tables = self.lock()?;
        Ok(tables
            .verifications
            .iter()
            .filter(|v| &v.identity_id == identity && v.verified)
            .cloned()
            .collect())
    }

    fn list_verifications_by_doctor(&self, doctor_id: &DoctorId) -> StoreResult<Vec<VerificationRecord>> {
        let tables = self.lock()?;
        Ok(tables
            .verifications
            .iter()
            .filter(|v| &v.doctor_id == doctor_id)
            .cloned()
            .collect())
    }

    fn insert_verification(&self, verification: NewVerification) -> StoreResult<VerificationRecord> {
        let mut tables = self.lock()?;
        if verification.verified
            && tables
                .verifications
                .iter()
                .any(|v| v.identity_id == verification.identity_id && v.verified)
        {
            return Err(StoreError::Conflict(format!(
                "{} already holds a verified claim",
                verification.identity_id
            )));
        }
        let id = VerificationId::new(tables.next_id("verification"));
        let now = tables.now();
        let record = VerificationRecord {
            id,
            doctor_id: verification.doctor_id,
            identity_id: verification.identity_id,
            verified: verification.verified,
            created_at: now,
            updated_at: now,
        };
        tables.verifications.push(record.clone());
        Ok(record)
    }
}

impl ProfileStore for InMemoryDirectory {
    fn get_profile(&self, identity: &IdentityId) -> StoreResult<Option<Profile>> {
        Self::check(&self.fail_profile_reads, "profile read")?;
        let tables = self.lock()?;
        Ok(tables.profiles.iter().find(|p| &p.id == identity).cloned())
    }

    fn insert_profile(&self, identity: &IdentityId, profile: NewProfile) -> StoreResult<Profile> {
        let mut tables = self.lock()?;
        if tables.profiles.iter().any(|p| &p.id == identity) {
            return Err(StoreError::Conflict(format!("profile {} exists", identity)));
        }
        let now = tables.now();
        let record = Profile {
            id: identity.clone(),
            first_name: profile.first_name,
            last_name: profile.last_name,
            role: profile.role,
            created_at: now,
            updated_at: now,
        };
        tables.profiles.push(record.clone());
        Ok(record)
    }

    fn update_profile(&self, identity: &IdentityId, patch: ProfilePatch) -> StoreResult<Profile> {
        let mut tables = self.lock()?;
        let now = tables.now();
        let profile = tables
            .profiles
            .iter_mut()
            .find(|p| &p.id == identity)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", identity)))?;
        patch.apply_to(profile);
        profile.updated_at = now;
        Ok(profile.clone())
    }
}

/// Identity provider holding at most one signed-in identity
#[derive(Default)]
pub struct MemoryIdentityProvider {
    current: Mutex<Option<IdentityId>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, identity: IdentityId) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(identity);
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn current_session(&self) -> Option<Session> {
        self.current
            .lock()
            .ok()
            .and_then(|current| current.clone())
            .map(|identity_id| Session { identity_id })
    }
}
