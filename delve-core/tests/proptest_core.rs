//! Property-based tests for core components using proptest.

use proptest::prelude::*;

use delve_core::brain::extract_json_object;
use delve_core::research::report::{collect_sources, dedup_ordered};
use delve_core::research::sources::FetchOptions;
use delve_core::research::{Finding, ResearchPhase, ResearchState};

fn phase() -> impl Strategy<Value = ResearchPhase> {
    prop::sample::select(ResearchPhase::ALL.to_vec())
}

fn url() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-c]{1,2}".prop_map(|host| format!("https://{host}.example.com")),
        "[a-c]{1,2}".prop_map(|path| format!("http://docs.example.org/{path}")),
        Just("unknown".to_string()),
    ]
}

// --- Source deduplication properties ---

proptest! {
    #[test]
    fn dedup_has_no_duplicates(items in prop::collection::vec("[a-d]{1,2}", 0..40)) {
        let deduped = dedup_ordered(items.iter().map(String::as_str));
        let mut seen = std::collections::HashSet::new();
        for item in &deduped {
            prop_assert!(seen.insert(item.clone()));
        }
        // Every input survives exactly once.
        for item in &items {
            prop_assert!(deduped.contains(item));
        }
    }

    #[test]
    fn dedup_keeps_first_seen_order(items in prop::collection::vec("[a-d]{1,2}", 0..40)) {
        let deduped = dedup_ordered(items.iter().map(String::as_str));
        let first_positions: Vec<usize> = deduped
            .iter()
            .map(|d| items.iter().position(|i| i == d).unwrap())
            .collect();
        prop_assert!(first_positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn collected_sources_are_cited_web_urls(sources in prop::collection::vec(url(), 0..30)) {
        let findings: Vec<Finding> = sources
            .iter()
            .map(|s| Finding::new("content", s.clone()))
            .collect();
        let collected = collect_sources(&findings);
        for source in &collected {
            prop_assert!(source.starts_with("http://") || source.starts_with("https://"));
            prop_assert!(sources.contains(source));
        }
        prop_assert!(!collected.contains(&"unknown".to_string()));
    }
}

// --- Phase transition properties ---

proptest! {
    #[test]
    fn transitions_never_regress(steps in prop::collection::vec(phase(), 0..20)) {
        let mut state = ResearchState::new("q");
        for step in steps {
            let before = state.current_phase();
            let result = state.transition(step);
            let after = state.current_phase();
            prop_assert!(after >= before);
            if result.is_err() {
                prop_assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn transition_allowed_iff_same_or_next(from in phase(), to in phase()) {
        let expected = from == to || from.next() == Some(to);
        prop_assert_eq!(from.can_transition_to(to), expected);
    }
}

// --- Misc ---

proptest! {
    #[test]
    fn fetch_window_never_exceeds_max_length(
        text in "\\PC{0,200}",
        max_length in 0usize..120,
        start_index in 0usize..120,
    ) {
        let options = FetchOptions { max_length, start_index };
        let windowed = options.window(&text);
        prop_assert!(windowed.chars().count() <= max_length);
        let expected: String = text.chars().skip(start_index).take(max_length).collect();
        prop_assert_eq!(windowed, expected);
    }

    #[test]
    fn extracted_json_is_braced(prefix in "[^{}]{0,20}", body in "[a-z:\" ]{0,20}", suffix in "[^{}]{0,20}") {
        let text = format!("{prefix}{{{body}}}{suffix}");
        let extracted = extract_json_object(&text).unwrap();
        prop_assert!(extracted.starts_with('{'), "extracted should start with an opening brace");
        prop_assert!(extracted.ends_with('}'), "extracted should end with a closing brace");
        prop_assert_eq!(extracted, format!("{{{body}}}"));
    }
}
