//! Characteristic value codec

use crate::{DecodeError, StatusEvent, WifiNetwork};

/// Decode a raw characteristic value as UTF-8 text
pub fn decode(bytes: &[u8]) -> Result<String, DecodeError> {
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Encode text for a characteristic write
pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Recover a JSON array of objects that was cut off by the attribute MTU.
///
/// A value that already parses as an array is returned as is. Otherwise the
/// text is split on `},` boundaries and the last fragment is dropped, since
/// it is the one the MTU cut through. Every surviving fragment gets its `}`
/// back. Object values containing `},` will confuse this; the device never
/// sends nested objects.
///
/// Only the head of an array of objects is repaired. Anything else is
/// returned unchanged so that parsing it fails.
pub fn repair_truncated_json_array(raw: &str) -> String {
    let raw = raw.trim();
    if is_complete_array(raw) {
        return raw.to_string();
    }

    let Some(body) = raw.strip_prefix('[') else {
        return raw.to_string();
    };
    let body = body.trim_start();
    if !body.is_empty() && !body.starts_with('{') {
        return raw.to_string();
    }
    let body = body.strip_suffix(']').unwrap_or(body);

    let mut fragments: Vec<&str> = body.split("},").collect();
    fragments.pop();

    let repaired: Vec<String> = fragments
        .into_iter()
        .map(|fragment| {
            let fragment = fragment.trim();
            if fragment.ends_with('}') {
                fragment.to_string()
            } else {
                format!("{fragment}}}")
            }
        })
        .collect();

    format!("[{}]", repaired.join(","))
}

fn is_complete_array(text: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(text),
        Ok(serde_json::Value::Array(_))
    )
}

/// Decode, repair and parse a scan characteristic value.
///
/// An empty value means the device has no scan results yet.
pub fn parse_scan_list(bytes: &[u8]) -> Result<Vec<WifiNetwork>, DecodeError> {
    let text = decode(bytes)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let repaired = repair_truncated_json_array(&text);
    Ok(serde_json::from_str(&repaired)?)
}

/// Decode and parse one status notification
pub fn parse_status(bytes: &[u8]) -> Result<StatusEvent, DecodeError> {
    let text = decode(bytes)?;
    Ok(serde_json::from_str(&text)?)
}
