use proptest::prelude::*;
use std::time::Duration;
use uidmatrix_intent::{
    ClassifyError, IntentClassifier, LookupType, OfflineOracle, OracleError, ScriptedOracle,
    INSTRUCTION,
};

#[test]
fn sends_instruction_and_trimmed_query() {
    let oracle =
        ScriptedOracle::replying(r#"{"lookup_type":"by_unique_id","value":"MC000001.00001"}"#);
    let classifier = IntentClassifier::new(&oracle).with_max_output_tokens(64);

    let intent = classifier.classify("  Get xpath for ID MC000001.00001 \n").unwrap();
    assert_eq!(intent.lookup_type, LookupType::ByUniqueId);
    assert_eq!(intent.search_value, "MC000001.00001");

    let requests = oracle.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].instruction, INSTRUCTION);
    assert_eq!(requests[0].query_text, "Get xpath for ID MC000001.00001");
    assert_eq!(requests[0].max_output_tokens, 64);
}

#[test]
fn instruction_demands_bare_json_and_lists_vocabulary() {
    for t in LookupType::ALL {
        assert!(INSTRUCTION.contains(t.as_str()));
    }
    assert!(INSTRUCTION.contains("Return only JSON."));
}

#[test]
fn empty_query_never_reaches_the_oracle() {
    let oracle = ScriptedOracle::new();
    let classifier = IntentClassifier::new(&oracle);
    for text in ["", "   ", "\n\t"] {
        assert!(matches!(classifier.classify(text), Err(ClassifyError::EmptyQuery)));
    }
    assert_eq!(oracle.call_count(), 0);
}

#[test]
fn oracle_failure_is_not_retried() {
    let oracle = ScriptedOracle::new()
        .then_fail(OracleError::Timeout(Duration::from_secs(30)))
        .then_reply(r#"{"lookup_type":"by_unique_id","value":"MC000001.00001"}"#);
    let classifier = IntentClassifier::new(&oracle);

    let err = classifier.classify("Get xpath for ID MC000001.00001").unwrap_err();
    assert!(matches!(
        err,
        ClassifyError::OracleUnavailable(OracleError::Timeout(_))
    ));
    assert_eq!(oracle.call_count(), 1);
}

#[test]
fn fenced_reply_with_commentary_still_classifies() {
    let oracle = ScriptedOracle::replying(
        "Sure, here it is:\n```json\n{\"lookup_type\": \"by_reference_id\", \"value\": \"MD000001\"}\n```",
    );
    let intent = IntentClassifier::new(&oracle)
        .classify("Show all instances of MD000001")
        .unwrap();
    assert_eq!(intent.lookup_type, LookupType::ByReferenceId);
    assert_eq!(intent.search_value, "MD000001");
}

#[test]
fn unknown_lookup_type_is_rejected() {
    let oracle = ScriptedOracle::replying(r#"{"lookup_type":"by_something_else","value":"X"}"#);
    let err = IntentClassifier::new(&oracle).classify("whatever").unwrap_err();
    assert!(matches!(err, ClassifyError::InvalidLookupType { .. }));
}

#[test]
fn offline_oracle_handles_canonical_queries_and_gibberish() {
    let classifier = IntentClassifier::new(OfflineOracle::new());

    let intent = classifier
        .classify("Find ID for //MESSAGE/ABOUT_VERSIONS/ABOUT_VERSION/")
        .unwrap();
    assert_eq!(intent.lookup_type, LookupType::ByXpath);

    assert!(matches!(
        classifier.classify("asdkjasd"),
        Err(ClassifyError::MalformedIntentResponse { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Whatever the oracle says, the classifier returns an intent or a typed error.
    #[test]
    fn arbitrary_replies_never_panic(reply in ".{0,200}") {
        let oracle = ScriptedOracle::replying(reply);
        let _ = IntentClassifier::new(&oracle).classify("Get xpath for ID MC000001.00001");
        prop_assert_eq!(oracle.call_count(), 1);
    }

    #[test]
    fn wrapped_objects_round_trip_value(
        prefix in "[A-Za-z ,.:!]{0,40}",
        suffix in "[A-Za-z ,.:!]{0,40}",
        value in "[A-Z]{2}[0-9]{6}\\.[0-9]{5}",
    ) {
        let reply = format!(
            "{prefix}\n```json\n{{\"lookup_type\": \"by_unique_id\", \"value\": \"{value}\"}}\n```\n{suffix}"
        );
        let oracle = ScriptedOracle::replying(reply);
        let intent = IntentClassifier::new(&oracle).classify("q").unwrap();
        prop_assert_eq!(intent.lookup_type, LookupType::ByUniqueId);
        prop_assert_eq!(intent.search_value, value);
    }

    #[test]
    fn offline_unique_ids_classify_exactly(value in "[A-Za-z]{2}[0-9]{6}\\.[0-9]{5}") {
        let intent = IntentClassifier::new(OfflineOracle::new())
            .classify(&format!("Get xpath for ID {value}"))
            .unwrap();
        prop_assert_eq!(intent.lookup_type, LookupType::ByUniqueId);
        prop_assert_eq!(intent.search_value, value);
    }
}
