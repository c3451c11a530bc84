//! Check url resolution and result-key mapping against the JSON vectors in
//! `test-vectors/`.
//!
//! Mapped values are compared as parsed JSON, not raw bytes, so key order in
//! the vector files does not matter.

use courier_core::descriptor::resolve_url;
use courier_core::{mapper, NetworkError, RequestDescriptor};
use serde_json::Value;

fn cases(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Url resolution
// ---------------------------------------------------------------------------

#[test]
fn url_resolution_vectors() {
    for case in cases(include_str!("../../test-vectors/url-resolution.json")) {
        let name = case["name"].as_str().unwrap();
        let base = case["base_url"].as_str().unwrap();
        let path = case["path"].as_str().unwrap();
        let expected = case["expected"].as_str().unwrap();

        assert_eq!(resolve_url(base, path), expected, "{name}: resolve_url");
        assert_eq!(
            RequestDescriptor::get(base, path).resolved_url(),
            expected,
            "{name}: descriptor"
        );
    }
}

// ---------------------------------------------------------------------------
// Path mapping
// ---------------------------------------------------------------------------

#[test]
fn path_mapping_vectors() {
    for case in cases(include_str!("../../test-vectors/path-mapping.json")) {
        let name = case["name"].as_str().unwrap();
        let body = serde_json::to_vec(&case["body"]).unwrap();
        let path = case["path"].as_str().unwrap();

        match (mapper::extract(&body, path), case.get("error")) {
            (Ok(bytes), None) => {
                let actual: Value = serde_json::from_slice(&bytes).unwrap();
                assert_eq!(actual, case["expected"], "{name}: extracted value");
            }
            (Err(NetworkError::PathExtraction { partial_path }), Some(error)) => {
                assert_eq!(partial_path, error["partial_path"].as_str().unwrap(), "{name}: partial path");
            }
            (outcome, expected_error) => {
                panic!("{name}: got {outcome:?}, expected error {expected_error:?}")
            }
        }
    }
}

#[test]
fn malformed_body_is_a_decode_error() {
    let err = mapper::extract(b"not json", "a.b").unwrap_err();
    assert!(matches!(err, NetworkError::Decode(_)));
}
