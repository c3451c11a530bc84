//! JSON encoding and decoding with optional key-style conversion.
//!
//! # Design
//! serde decides field names at compile time. `KeyStyle::SnakeCase` adds a
//! runtime pass over the encoded document instead: object keys are rewritten
//! from camelCase to snake_case when encoding, and from snake_case to
//! camelCase before decoding. Types that serialize with camelCase names
//! (`#[serde(rename_all = "camelCase")]`, or maps built by hand) can talk to
//! snake_case APIs without a second set of DTOs.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::NetworkError;

/// How object keys are spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStyle {
    /// Keys are sent and read exactly as serde produces them.
    #[default]
    Literal,
    /// Keys are converted between camelCase (in Rust) and snake_case (on the wire).
    SnakeCase,
}

/// Encode `value` to a JSON document, applying `style` to every object key.
pub fn encode<T: Serialize + ?Sized>(value: &T, style: KeyStyle) -> Result<Value, NetworkError> {
    let value = serde_json::to_value(value).map_err(|e| NetworkError::Encode(e.to_string()))?;
    Ok(match style {
        KeyStyle::Literal => value,
        KeyStyle::SnakeCase => convert_keys(value, &to_snake_case),
    })
}

/// Decode `bytes` into `T`, reading snake_case keys as camelCase when `style`
/// asks for it.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], style: KeyStyle) -> Result<T, NetworkError> {
    match style {
        KeyStyle::Literal => serde_json::from_slice(bytes).map_err(NetworkError::Decode),
        KeyStyle::SnakeCase => {
            let value = convert_keys(parse(bytes)?, &to_camel_case);
            serde_json::from_value(value).map_err(NetworkError::Decode)
        }
    }
}

/// Parse `bytes` into an untyped JSON value.
pub fn parse(bytes: &[u8]) -> Result<Value, NetworkError> {
    serde_json::from_slice(bytes).map_err(NetworkError::Decode)
}

/// Rewrite every object key in `value`, recursing into nested objects and arrays.
pub fn convert_keys(value: Value, convert: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (convert(&key), convert_keys(value, convert)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|value| convert_keys(value, convert))
                .collect(),
        ),
        other => other,
    }
}

/// `myURLProperty` → `my_url_property`. Leading and trailing underscores are kept.
pub fn to_snake_case(key: &str) -> String {
    let (lead, core, trail) = split_underscores(key);
    let chars: Vec<char> = core.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    out.push_str(lead);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out.push_str(trail);
    out
}

/// `my_url_property` → `myUrlProperty`. Leading and trailing underscores are kept.
pub fn to_camel_case(key: &str) -> String {
    let (lead, core, trail) = split_underscores(key);
    if !core.contains('_') {
        return key.to_string();
    }
    let mut parts = core.split('_');
    let mut out = String::with_capacity(key.len());
    out.push_str(lead);
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for part in parts {
        let mut chars = part.chars();
        if let Some(head) = chars.next() {
            out.extend(head.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out.push_str(trail);
    out
}

fn split_underscores(key: &str) -> (&str, &str, &str) {
    let start = key.len() - key.trim_start_matches('_').len();
    if start == key.len() {
        return (key, "", "");
    }
    let end = key.trim_end_matches('_').len();
    (&key[..start], &key[start..end], &key[end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("oneTwoThree"), "one_two_three");
        assert_eq!(to_snake_case("myURLProperty"), "my_url_property");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("_privateKey_"), "_private_key_");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_snake_case("__"), "__");
    }

    #[test]
    fn camel_case_conversion() {
        assert_eq!(to_camel_case("one_two_three"), "oneTwoThree");
        assert_eq!(to_camel_case("my_url_property"), "myUrlProperty");
        assert_eq!(to_camel_case("_leading_key"), "_leadingKey");
        assert_eq!(to_camel_case("plain"), "plain");
        assert_eq!(to_camel_case(""), "");
    }

    #[test]
    fn encode_snake_case_rewrites_nested_keys() {
        let value = json!({ "userId": 1, "homeAddress": { "zipCode": "100" }, "tags": [{ "tagName": "a" }] });
        let encoded = encode(&value, KeyStyle::SnakeCase).unwrap();
        assert_eq!(
            encoded,
            json!({ "user_id": 1, "home_address": { "zip_code": "100" }, "tags": [{ "tag_name": "a" }] })
        );
    }

    #[test]
    fn encode_literal_keeps_names() {
        let value = json!({ "userId": 1 });
        assert_eq!(encode(&value, KeyStyle::Literal).unwrap(), value);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Profile {
        display_name: String,
        follower_count: u32,
    }

    #[test]
    fn decode_snake_case_into_camel_case_type() {
        let body = br#"{"display_name":"KK","follower_count":3}"#;
        let profile: Profile = decode(body, KeyStyle::SnakeCase).unwrap();
        assert_eq!(
            profile,
            Profile {
                display_name: "KK".to_string(),
                follower_count: 3
            }
        );
    }

    #[test]
    fn encode_then_decode_reproduces_value() {
        let profile = Profile {
            display_name: "KK".to_string(),
            follower_count: 7,
        };
        let encoded = encode(&profile, KeyStyle::SnakeCase).unwrap();
        let bytes = serde_json::to_vec(&encoded).unwrap();
        let decoded: Profile = decode(&bytes, KeyStyle::SnakeCase).unwrap();
        assert_eq!(decoded, profile);
    }

    #[test]
    fn decode_bad_json_is_decode_error() {
        let err = decode::<Profile>(b"not json", KeyStyle::Literal).unwrap_err();
        assert!(matches!(err, NetworkError::Decode(_)));
        let err = parse(b"").unwrap_err();
        assert!(matches!(err, NetworkError::Decode(_)));
    }
}
