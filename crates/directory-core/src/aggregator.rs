//! Rating Aggregator
//!
//! Keeps `DoctorRecord.rating` consistent with the doctor's rating set. The
//! cached value is always derived from a fresh read of the ratings, so
//! recomputing is idempotent and any drift heals on the next run.

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::model::*;
use crate::resolver::OwnershipResolver;
use crate::store::DirectoryStore;
use crate::validation;

/// Mean of `scores` rounded half-up to one decimal; `0.0` for no scores.
///
/// Computed in integer tenths so values such as x.x5 round the same way on
/// every platform.
pub fn average_rating<I>(scores: I) -> f64
where
    I: IntoIterator<Item = u8>,
{
    let (sum, count) = scores
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), score| (sum + u64::from(score), count + 1));
    if count == 0 {
        return 0.0;
    }
    let tenths = (sum * 20 + count) / (count * 2);
    tenths as f64 / 10.0
}

/// Render a rating with exactly one decimal digit
pub fn format_rating(rating: f64) -> String {
    if rating.is_finite() {
        format!("{:.1}", rating)
    } else {
        "0.0".to_string()
    }
}

pub struct RatingAggregator<'a, S> {
    store: &'a S,
    config: &'a DirectoryConfig,
}

impl<'a, S: DirectoryStore> RatingAggregator<'a, S> {
    pub fn new(store: &'a S, config: &'a DirectoryConfig) -> Self {
        Self { store, config }
    }

    /// Average of the doctor's current ratings, without persisting it
    pub fn current_average(&self, doctor_id: &DoctorId) -> DirectoryResult<f64> {
        let ratings = self.store.list_ratings_by_doctor(doctor_id)?;
        Ok(average_rating(ratings.iter().map(|r| r.rating)))
    }

    /// Recompute the average from the stored ratings and persist it. The
    /// listing is only written when the cached value is stale.
    pub fn recompute_average(&self, doctor_id: &DoctorId) -> DirectoryResult<f64> {
        let doctor = self
            .store
            .get_doctor(doctor_id)?
            .ok_or_else(|| DirectoryError::NotFound(format!("doctor {}", doctor_id)))?;
        let average = self.current_average(doctor_id)?;
        if doctor.rating == average {
            return Ok(average);
        }
        self.store.update_doctor(doctor_id, DoctorPatch::rating_only(average))?;
        tracing::debug!("Doctor {} average rating is now {}", doctor_id, format_rating(average));
        Ok(average)
    }

    /// Insert or resubmit the rater's rating, then refresh the average.
    ///
    /// The rating write is the operation's result. A failed recompute
    /// afterwards is logged and left for the next read to heal.
    pub fn submit_rating(
        &self,
        doctor_id: &DoctorId,
        rater: &IdentityId,
        rating: u8,
        comment: Option<String>,
    ) -> DirectoryResult<RatingRecord> {
        let comment = comment.filter(|c| !c.trim().is_empty());
        validation::validate_rating_submission(rating, comment.as_deref(), self.config).into_result()?;

        if self.store.get_doctor(doctor_id)?.is_none() {
            return Err(DirectoryError::NotFound(format!("doctor {}", doctor_id)));
        }

        let stored = self.store.upsert_rating(NewRating {
            doctor_id: doctor_id.clone(),
            rater_identity_id: rater.clone(),
            rating,
            comment,
        })?;

        if let Err(err) = self.recompute_average(doctor_id) {
            tracing::warn!("Average recompute for {} after rating failed: {}", doctor_id, err);
        }

        Ok(stored)
    }

    /// Attach the doctor's public response to a rating
    pub fn respond_to_rating(
        &self,
        rating_id: &RatingId,
        response_text: &str,
        responder: &IdentityId,
    ) -> DirectoryResult<()> {
        let response_text = response_text.trim();
        validation::validate_response(response_text, self.config).into_result()?;

        let rating = self
            .store
            .get_rating(rating_id)?
            .ok_or_else(|| DirectoryError::NotFound(format!("rating {}", rating_id)))?;

        let resolver = OwnershipResolver::new(self.store, self.config);
        if !resolver.can_manage(&rating.doctor_id, Some(responder)) {
            return Err(DirectoryError::Permission(format!(
                "{} may not respond to reviews of doctor {}",
                responder, rating.doctor_id
            )));
        }

        self.store.update_rating(rating_id, RatingPatch::response(response_text))?;
        Ok(())
    }
}
