//! Snapshot extraction for captured exchanges

use hyper::header::{CONTENT_TYPE, COOKIE};
use hyper::HeaderMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Header map flattened to strings; repeated headers are joined with ", "
pub fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match map.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                map.insert(name.as_str().to_string(), value.into_owned());
            }
        }
    }
    map
}

/// Cookies from every `Cookie` header
pub fn cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}

/// Decode a request body according to its content type.
///
/// Form bodies become an object of fields, JSON bodies their value; any other
/// content type, or a body that does not decode, yields null.
pub fn decode_body(headers: &HeaderMap, body: &[u8]) -> Value {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return Value::Null;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/x-www-form-urlencoded" => {
            let mut fields = Map::new();
            for (key, value) in url::form_urlencoded::parse(body) {
                fields.insert(key.into_owned(), Value::String(value.into_owned()));
            }
            Value::Object(fields)
        }
        "application/json" if body.is_empty() => Value::Null,
        "application/json" => serde_json::from_slice(body).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_json_body() {
        let h = headers(&[("content-type", "application/json")]);
        assert_eq!(decode_body(&h, br#"{"a":1}"#), json!({"a": 1}));
    }

    #[test]
    fn test_json_with_charset_parameter() {
        let h = headers(&[("content-type", "Application/JSON; charset=utf-8")]);
        assert_eq!(decode_body(&h, b"[1,2]"), json!([1, 2]));
    }

    #[test]
    fn test_malformed_json_is_null() {
        let h = headers(&[("content-type", "application/json")]);
        assert_eq!(decode_body(&h, b"{oops"), Value::Null);
        assert_eq!(decode_body(&h, b""), Value::Null);
    }

    #[test]
    fn test_form_body() {
        let h = headers(&[("content-type", "application/x-www-form-urlencoded")]);
        assert_eq!(
            decode_body(&h, b"name=ada+lovelace&lang=en%21"),
            json!({"name": "ada lovelace", "lang": "en!"})
        );
    }

    #[test]
    fn test_other_content_types_are_opaque() {
        let h = headers(&[("content-type", "text/plain")]);
        assert_eq!(decode_body(&h, b"{\"a\":1}"), Value::Null);
        assert_eq!(decode_body(&HeaderMap::new(), b"{\"a\":1}"), Value::Null);
    }

    #[test]
    fn test_cookies() {
        let h = headers(&[("cookie", "session=abc; theme=\"dark\""), ("cookie", "lang=en")]);
        let jar = cookies(&h);
        assert_eq!(jar.get("session").map(String::as_str), Some("abc"));
        assert_eq!(jar.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(jar.get("lang").map(String::as_str), Some("en"));
    }

    #[test]
    fn test_header_map_joins_repeats() {
        let h = headers(&[("x-tag", "a"), ("x-tag", "b"), ("accept", "*/*")]);
        let map = header_map(&h);
        assert_eq!(map.get("x-tag").map(String::as_str), Some("a, b"));
        assert_eq!(map.get("accept").map(String::as_str), Some("*/*"));
    }
}
