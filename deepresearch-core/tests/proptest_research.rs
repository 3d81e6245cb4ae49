//! Property-based tests for the research workflow using proptest.

use proptest::prelude::*;
use std::collections::HashSet;

use deepresearch_core::research::{
    RawNote, Stage, StageOutput, extract_sources, extract_title, next_stage,
};
use deepresearch_core::structured::{ResearchPlan, parse_structured};

fn note_strategy() -> impl Strategy<Value = RawNote> {
    (prop::option::of(0u8..40), "[a-z ]{0,20}").prop_map(|(site, content)| {
        RawNote::new(site.map(|n| format!("https://site{}.example", n)), content)
    })
}

// --- Source list properties ---

proptest! {
    #[test]
    fn sources_are_capped_and_unique(notes in prop::collection::vec(note_strategy(), 0..80)) {
        let sources = extract_sources(&notes, 25);
        prop_assert!(sources.len() <= 25);
        let unique: HashSet<&String> = sources.iter().collect();
        prop_assert_eq!(unique.len(), sources.len());
    }

    #[test]
    fn sources_keep_first_seen_order(notes in prop::collection::vec(note_strategy(), 0..80)) {
        let sources = extract_sources(&notes, usize::MAX);
        let mut expected: Vec<String> = Vec::new();
        for note in &notes {
            if let Some(source) = &note.source
                && !expected.contains(source)
            {
                expected.push(source.clone());
            }
        }
        prop_assert_eq!(sources, expected);
    }

    #[test]
    fn sources_cap_is_a_prefix(notes in prop::collection::vec(note_strategy(), 0..80), cap in 0usize..30) {
        let all = extract_sources(&notes, usize::MAX);
        let capped = extract_sources(&notes, cap);
        prop_assert_eq!(&all[..capped.len()], &capped[..]);
    }
}

// --- Title properties ---

proptest! {
    #[test]
    fn title_is_idempotent_and_bounded(draft in "(\\PC{0,150}\n){0,15}") {
        let first = extract_title(&draft);
        let second = extract_title(&draft);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.chars().count() <= 100);
        prop_assert!(!first.starts_with('#'));
        prop_assert!(!first.starts_with('='));
    }
}

// --- Transition properties ---

proptest! {
    #[test]
    fn critique_never_exceeds_cap(
        verdicts in prop::collection::vec(any::<bool>(), 1..20),
        max in 0u32..5,
    ) {
        let mut count = 0u32;
        let mut stage = Stage::Critique;
        for needs_revision in verdicts {
            if stage != Stage::Critique {
                break;
            }
            let output = StageOutput::Verdict { needs_revision, revision_count: count, max_revisions: max };
            let next = next_stage(stage, &output);
            if next == Stage::Write {
                count += 1;
                stage = next_stage(Stage::Write, &StageOutput::Done);
                prop_assert_eq!(stage, Stage::Critique);
            } else {
                prop_assert_eq!(next, Stage::Finalize);
                stage = next;
            }
            prop_assert!(count <= max);
        }
    }
}

// --- Structured parsing properties ---

proptest! {
    #[test]
    fn arbitrary_text_never_panics_and_falls_back(text in "[^{}]{0,200}") {
        let plan: ResearchPlan = parse_structured(&text, "prompt");
        prop_assert_eq!(plan.search_queries, vec!["general search".to_string()]);
    }
}
