//! Validation rules for briefs and amendments.

use super::*;
use rstest::{fixture, rstest};

#[fixture]
fn draft() -> CustomizationDraft {
    CustomizationDraft {
        recipient_name: "Sam".into(),
        author_name: "Alex".into(),
        occasion: "birthday".into(),
        length_seconds: 90,
        moods: vec!["happy".into(), "upbeat".into()],
        genre: "pop".into(),
        special_memories: Some("Our trip to Skye".into()),
        things_to_avoid: Some("   ".into()),
        pronunciation: None,
        occasion_date: NaiveDate::from_ymd_opt(2026, 6, 1),
    }
}

#[rstest]
fn accepts_a_well_formed_draft(draft: CustomizationDraft) {
    let brief = CustomizationBrief::try_from(draft).expect("valid draft");
    assert_eq!(brief.occasion, Occasion::Birthday);
    assert_eq!(brief.length, SongLength::Standard);
    assert_eq!(brief.moods, vec![Mood::Happy, Mood::Upbeat]);
    assert_eq!(brief.things_to_avoid, None);
}

#[rstest]
fn rejects_blank_names(mut draft: CustomizationDraft) {
    draft.recipient_name = "  ".into();
    let err = CustomizationBrief::try_from(draft).expect_err("blank name");
    assert_eq!(err.field(), "recipientName");
}

#[rstest]
fn rejects_names_over_the_limit(mut draft: CustomizationDraft) {
    draft.author_name = "a".repeat(NAME_MAX_CHARS + 1);
    let err = CustomizationBrief::try_from(draft).expect_err("long name");
    assert!(matches!(err, CustomizationValidationError::TooLong { field: "authorName", .. }));
}

#[rstest]
#[case(vec![])]
#[case(vec!["happy".into(), "calm".into(), "epic".into(), "funny".into()])]
fn rejects_mood_counts_outside_the_range(mut draft: CustomizationDraft, #[case] moods: Vec<String>) {
    draft.moods = moods;
    assert_eq!(
        CustomizationBrief::try_from(draft),
        Err(CustomizationValidationError::MoodCount)
    );
}

#[rstest]
fn duplicate_moods_collapse(mut draft: CustomizationDraft) {
    draft.moods = vec!["calm".into(), "calm".into()];
    let brief = CustomizationBrief::try_from(draft).expect("valid draft");
    assert_eq!(brief.moods, vec![Mood::Calm]);
}

#[rstest]
fn rejects_unknown_genre(mut draft: CustomizationDraft) {
    draft.genre = "polka".into();
    let err = CustomizationBrief::try_from(draft).expect_err("unknown genre");
    assert_eq!(err.field(), "genre");
}

#[rstest]
#[case(60, true)]
#[case(90, true)]
#[case(120, true)]
#[case(45, false)]
fn only_three_lengths_are_offered(mut draft: CustomizationDraft, #[case] seconds: u32, #[case] ok: bool) {
    draft.length_seconds = seconds;
    assert_eq!(CustomizationBrief::try_from(draft).is_ok(), ok);
}

#[rstest]
fn free_text_is_capped(mut draft: CustomizationDraft) {
    draft.special_memories = Some("x".repeat(FREE_TEXT_MAX_CHARS + 1));
    let err = CustomizationBrief::try_from(draft).expect_err("too long");
    assert_eq!(err.field(), "specialMemories");
}

#[rstest]
fn empty_amendments_are_rejected() {
    assert_eq!(
        TweakAmendment::new(None, Some(" ".into()), None),
        Err(CustomizationValidationError::EmptyAmendment)
    );
}

#[rstest]
fn latest_tweak_overrides_only_the_fields_it_sets(draft: CustomizationDraft) {
    let brief = CustomizationBrief::try_from(draft).expect("valid draft");
    let customization = Customization {
        id: CustomizationId::random(),
        user_id: UserId::random(),
        brief,
        latest_tweak: Some(TweakAmendment {
            pronunciation: Some("Sam as 'Sahm'".into()),
            ..TweakAmendment::default()
        }),
        created_at: Utc::now(),
    };
    assert_eq!(customization.special_memories(), Some("Our trip to Skye"));
    assert_eq!(customization.pronunciation(), Some("Sam as 'Sahm'"));
}
