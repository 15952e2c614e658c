//! Integration tests for the directory service
//!
//! Drives the in-memory store through whole user flows: profile provisioning,
//! listing creation, rating, claiming and ownership checks.

use directory_core::{
    average_rating, format_rating, ClaimError, Contact, DirectoryConfig, DirectoryError, DirectoryService, DoctorFilter,
    DoctorId, DoctorPatch, DoctorStore, IdentityId, IdentityProvider, InMemoryDirectory,
    MemoryIdentityProvider, NewDoctor, NewProfile, PaginationInput, ProfilePatch, RatingStore, Role,
    SessionContext, VerificationState, VerificationStore, ViewerRelation, ANONYMOUS,
};

// =============================================================================
// Fixtures
// =============================================================================

fn service() -> DirectoryService<InMemoryDirectory> {
    DirectoryService::new(InMemoryDirectory::new(), DirectoryConfig::default())
}

fn session(name: &str) -> SessionContext {
    SessionContext::signed_in(IdentityId::new(name))
}

fn sign_up(directory: &DirectoryService<InMemoryDirectory>, name: &str, role: Role) -> SessionContext {
    let ctx = session(name);
    directory
        .provision_profile(
            &ctx,
            NewProfile {
                first_name: Some(name.to_string()),
                last_name: None,
                role,
            },
        )
        .unwrap();
    ctx
}

fn draft(name: &str, specialty: &str) -> NewDoctor {
    NewDoctor {
        name: name.to_string(),
        specialty: specialty.to_string(),
        subspecialties: Some(vec![]),
        hospital: "CHU Beni Messous".to_string(),
        experience: 10,
        education: vec!["Université d'Alger".to_string(), "  ".to_string()],
        bio: String::new(),
        languages: vec!["Arabic".to_string(), "French".to_string()],
        accepting_new_patients: true,
        image_url: String::new(),
        contact: Contact {
            phone: "023 00 00 00".to_string(),
            email: String::new(),
            address: "Route de Beni Messous".to_string(),
            city: Some("Beni Messous".to_string()),
            region: Some("Alger".to_string()),
        },
        created_by_identity: None,
    }
}

/// A listing owned by a doctor-role creator
fn listed_doctor(directory: &DirectoryService<InMemoryDirectory>, owner: &str) -> (SessionContext, DoctorId) {
    let ctx = sign_up(directory, owner, Role::Doctor);
    let doctor = directory.create_doctor(&ctx, draft("Dr. Samira Kaci", "Cardiology")).unwrap();
    (ctx, doctor.id)
}

/// A listing inserted directly, with no creator, as imported seed data
fn seeded_doctor(directory: &DirectoryService<InMemoryDirectory>, name: &str, specialty: &str) -> DoctorId {
    directory.store().insert_doctor(draft(name, specialty)).unwrap().id
}

// =============================================================================
// Rating aggregation
// =============================================================================

mod aggregation {
    use super::*;

    #[test]
    fn test_worked_example_four_then_three_and_a_half_then_two_and_a_half() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");
        let raters: Vec<SessionContext> = ["r1", "r2", "r3", "r4"].iter().map(|r| session(r)).collect();

        for (ctx, score) in raters.iter().zip([5u8, 4, 3]) {
            directory.submit_rating(ctx, &doctor, score, None).unwrap();
        }
        assert_eq!(directory.store().get_doctor(&doctor).unwrap().unwrap().rating, 4.0);

        directory.submit_rating(&raters[3], &doctor, 2, None).unwrap();
        assert_eq!(directory.store().get_doctor(&doctor).unwrap().unwrap().rating, 3.5);

        directory.submit_rating(&raters[0], &doctor, 1, Some("Changed my mind".to_string())).unwrap();
        let stored = directory.store().get_doctor(&doctor).unwrap().unwrap();
        assert_eq!(stored.rating, 2.5);
        assert_eq!(format_rating(stored.rating), "2.5");
        assert_eq!(directory.ratings(&doctor).unwrap().len(), 4);
    }

    #[test]
    fn test_resubmissions_leave_one_record_with_last_values() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");
        let rater = session("patient-1");

        for (score, comment) in [(5u8, "Great"), (3, "Okay"), (4, "Good after all")] {
            directory
                .submit_rating(&rater, &doctor, score, Some(comment.to_string()))
                .unwrap();
        }

        let ratings = directory.ratings(&doctor).unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].rating, 4);
        assert_eq!(ratings[0].comment.as_deref(), Some("Good after all"));
        assert_eq!(directory.store().get_doctor(&doctor).unwrap().unwrap().rating, 4.0);
    }

    #[test]
    fn test_recompute_is_idempotent_and_heals_drift() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");
        directory.submit_rating(&session("a"), &doctor, 5, None).unwrap();
        directory.submit_rating(&session("b"), &doctor, 4, None).unwrap();

        directory.store().set_cached_rating(&doctor, 1.0).unwrap();
        let first = directory.recompute_average(&doctor).unwrap();
        let second = directory.recompute_average(&doctor).unwrap();
        assert_eq!(first, 4.5);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_ratings_is_zero() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");
        assert_eq!(directory.recompute_average(&doctor).unwrap(), 0.0);
        assert_eq!(format_rating(directory.get_doctor(&doctor).unwrap().rating), "0.0");
    }

    #[test]
    fn test_out_of_range_rating_is_rejected_without_write() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");

        let err = directory.submit_rating(&session("a"), &doctor, 6, None).unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
        let err = directory.submit_rating(&session("a"), &doctor, 0, None).unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
        assert!(directory.ratings(&doctor).unwrap().is_empty());
    }

    #[test]
    fn test_rating_requires_session_and_existing_doctor() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");

        let err = directory
            .submit_rating(&SessionContext::anonymous(), &doctor, 4, None)
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Permission(_)));

        let err = directory
            .submit_rating(&session("a"), &DoctorId::new("doctor-404"), 4, None)
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(_)));
    }

    #[test]
    fn test_failed_recompute_keeps_rating_write() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");

        directory.store().fail_doctor_updates(true);
        let stored = directory.submit_rating(&session("a"), &doctor, 5, None).unwrap();
        assert_eq!(stored.rating, 5);
        assert_eq!(directory.store().get_doctor(&doctor).unwrap().unwrap().rating, 0.0);

        // Listing still shows the live average and the next read heals it
        let listed = directory.list_doctors(&DoctorFilter::default()).unwrap();
        assert_eq!(listed[0].rating, 5.0);

        directory.store().fail_doctor_updates(false);
        assert_eq!(directory.get_doctor(&doctor).unwrap().rating, 5.0);
        assert_eq!(directory.store().get_doctor(&doctor).unwrap().unwrap().rating, 5.0);
    }

    #[test]
    fn test_detail_reads_do_not_touch_a_current_listing() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");
        let before = directory.store().get_doctor(&doctor).unwrap().unwrap().updated_at;

        for _ in 0..3 {
            directory.get_doctor(&doctor).unwrap();
        }
        assert_eq!(directory.store().get_doctor(&doctor).unwrap().unwrap().updated_at, before);

        directory.submit_rating(&session("a"), &doctor, 4, None).unwrap();
        let rated = directory.store().get_doctor(&doctor).unwrap().unwrap().updated_at;
        assert!(rated > before);

        directory.get_doctor(&doctor).unwrap();
        directory.recompute_average(&doctor).unwrap();
        assert_eq!(directory.store().get_doctor(&doctor).unwrap().unwrap().updated_at, rated);
    }

    #[test]
    fn test_recompute_of_unknown_doctor_is_not_found() {
        let directory = service();
        let err = directory.recompute_average(&DoctorId::new("doctor-404")).unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(_)));
    }

    #[test]
    fn test_heal_on_read_can_be_disabled() {
        let config = DirectoryConfig {
            heal_on_read: false,
            ..DirectoryConfig::default()
        };
        let directory = DirectoryService::new(InMemoryDirectory::new(), config);
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");
        directory.submit_rating(&session("a"), &doctor, 3, None).unwrap();

        directory.store().set_cached_rating(&doctor, 1.0).unwrap();
        assert_eq!(directory.get_doctor(&doctor).unwrap().rating, 1.0);
    }
}

// =============================================================================
// Ownership and verification
// =============================================================================

mod ownership {
    use super::*;

    #[test]
    fn test_creator_manages_without_verification() {
        let directory = service();
        let (owner, doctor) = listed_doctor(&directory, "dr-kaci");

        assert!(directory.can_manage(&doctor, &owner));
        assert!(directory.store().list_verifications_by_doctor(&doctor).unwrap().is_empty());
    }

    #[test]
    fn test_verified_claimer_manages() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Rachid Benali", "Neurology");
        let claimer = sign_up(&directory, "dr-benali", Role::Doctor);

        assert!(!directory.can_manage(&doctor, &claimer));
        directory.claim_doctor(&claimer, &doctor).unwrap();
        assert!(directory.can_manage(&doctor, &claimer));

        let view = directory.doctor_view(&doctor, &claimer).unwrap();
        assert_eq!(view.relation, ViewerRelation::OwnedByClaimer);
        assert_eq!(view.verification, VerificationState::ExplicitlyVerified);
    }

    #[test]
    fn test_others_and_anonymous_cannot_manage() {
        let directory = service();
        let (_, doctor) = listed_doctor(&directory, "dr-kaci");
        let stranger = sign_up(&directory, "patient-1", Role::Patient);

        assert!(!directory.can_manage(&doctor, &stranger));
        assert!(!directory.can_manage(&doctor, &SessionContext::anonymous()));

        let view = directory.doctor_view(&doctor, &SessionContext::anonymous()).unwrap();
        assert_eq!(view.relation, ViewerRelation::Anonymous);
        assert!(!view.can_manage);
        assert!(!view.can_claim);
    }

    #[test]
    fn test_second_claim_elsewhere_is_refused() {
        let directory = service();
        let first = seeded_doctor(&directory, "Dr. Rachid Benali", "Neurology");
        let second = seeded_doctor(&directory, "Dr. Lina Saidi", "Oncology");
        let claimer = sign_up(&directory, "dr-benali", Role::Doctor);

        directory.claim_doctor(&claimer, &first).unwrap();
        let err = directory.claim_doctor(&claimer, &second).unwrap_err();
        assert_eq!(err, DirectoryError::Claim(ClaimError::AlreadyClaimedElsewhere));

        let err = directory.claim_doctor(&claimer, &first).unwrap_err();
        assert_eq!(err, DirectoryError::Claim(ClaimError::AlreadyClaimed));

        assert!(!directory.is_verified(&second));
        assert!(!directory.can_claim(&second, &claimer));
        assert_eq!(directory.claimed_doctors(claimer.identity().unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn test_store_uniqueness_backs_the_claim_check() {
        let directory = service();
        let first = seeded_doctor(&directory, "Dr. Rachid Benali", "Neurology");
        let second = seeded_doctor(&directory, "Dr. Lina Saidi", "Oncology");
        let claimer = IdentityId::new("dr-benali");

        // Simulates a concurrent claim landing between pre-check and insert
        directory
            .store()
            .insert_verification(directory_core::NewVerification {
                doctor_id: first,
                identity_id: claimer.clone(),
                verified: true,
            })
            .unwrap();
        let err = directory
            .store()
            .insert_verification(directory_core::NewVerification {
                doctor_id: second,
                identity_id: claimer,
                verified: true,
            })
            .unwrap_err();
        assert!(matches!(err, directory_core::StoreError::Conflict(_)));
    }

    #[test]
    fn test_claim_errors() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Rachid Benali", "Neurology");

        let err = directory.claim_doctor(&SessionContext::anonymous(), &doctor).unwrap_err();
        assert_eq!(err, DirectoryError::Claim(ClaimError::Unauthenticated));

        let missing = DoctorId::new("doctor-404");
        let err = directory.claim_doctor(&session("x"), &missing).unwrap_err();
        assert_eq!(err, DirectoryError::Claim(ClaimError::DoctorNotFound(missing)));

        directory.store().set_unavailable(true);
        let err = directory.claim_doctor(&session("x"), &doctor).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_creator_role_decides_implicit_verification() {
        let directory = service();

        let patient = sign_up(&directory, "patient-1", Role::Patient);
        let mut by_patient = draft("Dr. Imported", "Cardiology");
        by_patient.created_by_identity = patient.identity().cloned();
        let by_patient = directory.store().insert_doctor(by_patient).unwrap().id;
        assert!(!directory.is_verified(&by_patient));

        let (_, by_doctor) = listed_doctor(&directory, "dr-kaci");
        assert!(directory.is_verified(&by_doctor));
        assert_eq!(
            directory.resolver().verification_state(&by_doctor),
            VerificationState::ImplicitlyVerified
        );
    }

    #[test]
    fn test_implicit_verification_can_be_disabled() {
        let config = DirectoryConfig {
            implicit_creator_verification: false,
            ..DirectoryConfig::default()
        };
        let directory = DirectoryService::new(InMemoryDirectory::new(), config);
        let (owner, doctor) = listed_doctor(&directory, "dr-kaci");

        assert!(!directory.is_verified(&doctor));
        // Ownership does not depend on verification
        assert!(directory.can_manage(&doctor, &owner));
    }

    #[test]
    fn test_failed_creator_lookup_is_not_verified() {
        let directory = service();
        let (_, doctor) = listed_doctor(&directory, "dr-kaci");

        directory.store().fail_profile_reads(true);
        assert!(!directory.is_verified(&doctor));
    }

    #[test]
    fn test_resolver_degrades_when_store_is_down() {
        let directory = service();
        let (owner, doctor) = listed_doctor(&directory, "dr-kaci");

        directory.store().set_unavailable(true);
        assert!(!directory.is_verified(&doctor));
        assert!(!directory.can_manage(&doctor, &owner));
        assert!(!directory.can_claim(&doctor, &session("dr-other")));
        assert!(!directory.can_create_profile(&session("dr-other")));
    }
}

// =============================================================================
// Doctor listings
// =============================================================================

mod listings {
    use super::*;

    #[test]
    fn test_one_listing_per_doctor_identity() {
        let directory = service();
        let (owner, _) = listed_doctor(&directory, "dr-kaci");

        assert!(!directory.can_create_profile(&owner));
        let err = directory
            .create_doctor(&owner, draft("Dr. Samira Kaci (2)", "Cardiology"))
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Permission(_)));
        assert_eq!(directory.list_doctors(&DoctorFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_patients_cannot_create_listings() {
        let directory = service();
        let patient = sign_up(&directory, "patient-1", Role::Patient);

        assert!(!directory.can_create_profile(&patient));
        let err = directory.create_doctor(&patient, draft("Dr. Fake", "Cardiology")).unwrap_err();
        assert!(matches!(err, DirectoryError::Permission(_)));
    }

    #[test]
    fn test_create_normalizes_and_stamps_creator() {
        let directory = service();
        let owner = sign_up(&directory, "dr-kaci", Role::Doctor);

        let mut input = draft("Dr. Samira Kaci", "Cardiology");
        input.created_by_identity = Some(IdentityId::new("someone-else"));
        let doctor = directory.create_doctor(&owner, input).unwrap();

        assert_eq!(doctor.created_by_identity.as_ref(), owner.identity());
        assert_eq!(doctor.rating, 0.0);
        assert_eq!(doctor.subspecialties, None);
        assert_eq!(doctor.education, vec!["Université d'Alger".to_string()]);
    }

    #[test]
    fn test_invalid_draft_is_rejected_before_insert() {
        let directory = service();
        let owner = sign_up(&directory, "dr-kaci", Role::Doctor);

        let mut input = draft("Dr. Samira Kaci", "Cardiology");
        input.languages = vec![" ".to_string()];
        let err = directory.create_doctor(&owner, input).unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
        assert!(directory.can_create_profile(&owner));
    }

    #[test]
    fn test_update_requires_manager_and_never_sets_rating() {
        let directory = service();
        let (owner, doctor) = listed_doctor(&directory, "dr-kaci");

        let patch = DoctorPatch {
            bio: Some("Interventional cardiologist".to_string()),
            accepting_new_patients: Some(false),
            ..DoctorPatch::default()
        };
        let err = directory.update_doctor(&session("intruder"), &doctor, patch.clone()).unwrap_err();
        assert!(matches!(err, DirectoryError::Permission(_)));

        let updated = directory.update_doctor(&owner, &doctor, patch).unwrap();
        assert_eq!(updated.bio, "Interventional cardiologist");
        assert!(!updated.accepting_new_patients);

        let err = directory
            .update_doctor(&owner, &doctor, DoctorPatch::rating_only(5.0))
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
    }

    #[test]
    fn test_filters_and_specialties() {
        let directory = service();
        seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");
        seeded_doctor(&directory, "Dr. Karim Zerrouki", "Cardiology");
        seeded_doctor(&directory, "Dr. Lina Saidi", "Cardiology");

        let cardiology = DoctorFilter {
            specialty: Some("Cardiology".to_string()),
            ..DoctorFilter::default()
        };
        assert_eq!(directory.list_doctors(&cardiology).unwrap().len(), 2);

        let search = DoctorFilter {
            search: Some("ouali".to_string()),
            region: Some("alger".to_string()),
            ..DoctorFilter::default()
        };
        assert_eq!(directory.list_doctors(&search).unwrap().len(), 1);

        assert_eq!(
            directory.specialties().unwrap(),
            vec!["Cardiology".to_string(), "Dermatology".to_string()]
        );
    }

    #[test]
    fn test_listing_pages() {
        let directory = service();
        for i in 0..5 {
            seeded_doctor(&directory, &format!("Dr. Number {}", i), "Cardiology");
        }

        let page = directory
            .list_doctors_page(&DoctorFilter::default(), &PaginationInput { offset: 3, limit: 2 })
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);
        assert!(!page.has_more);

        let err = directory
            .list_doctors_page(&DoctorFilter::default(), &PaginationInput { offset: 0, limit: 500 })
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
    }

    #[test]
    fn test_store_outage_surfaces_as_retryable() {
        let directory = service();
        directory.store().set_unavailable(true);

        let err = directory.list_doctors(&DoctorFilter::default()).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), "Something went wrong, please try again");
    }
}

// =============================================================================
// Reviews and responses
// =============================================================================

mod reviews {
    use super::*;

    #[test]
    fn test_owner_responds_and_response_survives_resubmission() {
        let directory = service();
        let (owner, doctor) = listed_doctor(&directory, "dr-kaci");
        let patient = sign_up(&directory, "patient-1", Role::Patient);

        let rating = directory
            .submit_rating(&patient, &doctor, 2, Some("Long wait".to_string()))
            .unwrap();
        assert_eq!(directory.unanswered_ratings(&owner, &doctor).unwrap().len(), 1);

        directory
            .respond_to_rating(&owner, &rating.id, "  We have added staff  ")
            .unwrap();
        assert!(directory.unanswered_ratings(&owner, &doctor).unwrap().is_empty());

        directory.submit_rating(&patient, &doctor, 4, None).unwrap();
        let mine = directory.my_rating(&patient, &doctor).unwrap().unwrap();
        assert_eq!(mine.rating, 4);
        assert_eq!(mine.comment, None);
        assert_eq!(mine.doctor_response.as_deref(), Some("We have added staff"));
    }

    #[test]
    fn test_non_owner_cannot_respond() {
        let directory = service();
        let (_, doctor) = listed_doctor(&directory, "dr-kaci");
        let patient = sign_up(&directory, "patient-1", Role::Patient);
        let rating = directory.submit_rating(&patient, &doctor, 3, None).unwrap();

        let err = directory
            .respond_to_rating(&patient, &rating.id, "I am the doctor")
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Permission(_)));
        let err = directory.unanswered_ratings(&patient, &doctor).unwrap_err();
        assert!(matches!(err, DirectoryError::Permission(_)));

        let stored = directory.store().get_rating(&rating.id).unwrap().unwrap();
        assert_eq!(stored.doctor_response, None);
    }

    #[test]
    fn test_reviews_newest_first_with_names() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");

        let amel = sign_up(&directory, "Amel", Role::Patient);
        directory.submit_rating(&amel, &doctor, 5, None).unwrap();
        directory.submit_rating(&session("ghost"), &doctor, 3, None).unwrap();

        let reviews = directory.reviews(&doctor).unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].reviewer_name, ANONYMOUS);
        assert_eq!(reviews[1].reviewer_name, "Amel");
    }

    #[test]
    fn test_reviewer_names_fall_back_when_profiles_fail() {
        let directory = service();
        let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");
        let amel = sign_up(&directory, "Amel", Role::Patient);
        directory.submit_rating(&amel, &doctor, 5, None).unwrap();

        directory.store().fail_profile_reads(true);
        let reviews = directory.reviews(&doctor).unwrap();
        assert_eq!(reviews[0].reviewer_name, ANONYMOUS);
    }
}

// =============================================================================
// Profiles and sessions
// =============================================================================

mod profiles {
    use super::*;

    #[test]
    fn test_provisioning_is_idempotent() {
        let directory = service();
        let ctx = sign_up(&directory, "Karim", Role::Patient);

        let again = directory
            .provision_profile(
                &ctx,
                NewProfile {
                    first_name: Some("Someone".to_string()),
                    last_name: None,
                    role: Role::Doctor,
                },
            )
            .unwrap();
        assert_eq!(again.role, Role::Patient);
        assert_eq!(again.display_name(), "Karim");
    }

    #[test]
    fn test_update_profile_is_owner_only() {
        let directory = service();
        let ctx = sign_up(&directory, "Karim", Role::Patient);

        let updated = directory
            .update_profile(
                &ctx,
                ProfilePatch {
                    last_name: Some("Haddad".to_string()),
                    ..ProfilePatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.display_name(), "Karim Haddad");

        let err = directory
            .update_profile(&SessionContext::anonymous(), ProfilePatch::default())
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Permission(_)));

        let err = directory
            .update_profile(&session("nobody"), ProfilePatch::default())
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(_)));
    }

    #[test]
    fn test_session_follows_identity_provider() {
        let directory = service();
        let (_, doctor) = listed_doctor(&directory, "dr-kaci");
        let provider = MemoryIdentityProvider::new();
        let mut ctx = SessionContext::anonymous();

        provider.sign_in(IdentityId::new("dr-kaci"));
        ctx.refresh(&provider);
        assert!(directory.can_manage(&doctor, &ctx));

        provider.sign_out();
        ctx.refresh(&provider);
        assert!(provider.current_session().is_none());
        assert!(!directory.can_manage(&doctor, &ctx));
    }
}

// =============================================================================
// Aggregation properties over submission sequences
// =============================================================================

mod aggregation_properties {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    proptest! {
        /// After every submission the cached average matches each rater's
        /// latest score, and each rater owns exactly one record
        #[test]
        fn cached_average_tracks_latest_score_per_rater(
            submissions in proptest::collection::vec((0usize..5, 1u8..=5), 1..40)
        ) {
            let directory = service();
            let doctor = seeded_doctor(&directory, "Dr. Nadia Ouali", "Dermatology");
            let mut latest: BTreeMap<usize, u8> = BTreeMap::new();

            for (rater, score) in submissions {
                let ctx = session(&format!("rater-{}", rater));
                directory.submit_rating(&ctx, &doctor, score, None).unwrap();
                latest.insert(rater, score);

                let stored = directory.store().get_doctor(&doctor).unwrap().unwrap();
                prop_assert_eq!(stored.rating, average_rating(latest.values().copied()));

                let ratings = directory.ratings(&doctor).unwrap();
                prop_assert_eq!(ratings.len(), latest.len());

                let mine = directory.my_rating(&ctx, &doctor).unwrap().unwrap();
                prop_assert_eq!(mine.rating, score);
            }
        }
    }
}
