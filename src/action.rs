//! Action parameters: normalization and identifier generation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{HEADER_ACTION, HEADER_ACTION_ID};
use crate::error::{AmiError, AmiResult};

/// Header name/value pairs for one action.
///
/// Keys are canonicalized and values trimmed by [`normalize`] before
/// transmission; header order is not significant on the wire.
pub type Params = HashMap<String, String>;

/// Process-wide sequence mixed into generated action identifiers so that
/// back-to-back submissions are always distinguishable even when the clock
/// does not advance between them.
static ACTION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Canonicalize a header name: first letter of each hyphen-separated token
/// upper-cased, the rest lower-cased. `ActionID` becomes `Actionid`,
/// `eventmask` becomes `Eventmask`, `X-custom-HEADER` becomes
/// `X-Custom-Header`.
pub(crate) fn canonical_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '-' {
            out.push(c);
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Generate a fresh action identifier: nanosecond UNIX timestamp plus a
/// monotonic sequence number.
pub(crate) fn generate_action_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = ACTION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", nanos, seq)
}

/// Normalize action parameters for transmission: canonicalize header names,
/// trim value whitespace, and fill in a generated `Actionid` when absent.
///
/// Fails with [`AmiError::InvalidParams`] when the set is empty or carries no
/// `Action` key; nothing is written to the wire in that case.
pub(crate) fn normalize(params: Params) -> AmiResult<Params> {
    if params.is_empty() {
        return Err(AmiError::InvalidParams);
    }

    let mut fixed = Params::with_capacity(params.len() + 1);
    for (k, v) in params {
        fixed.insert(canonical_key(&k), v.trim().to_string());
    }

    if !fixed.contains_key(HEADER_ACTION) {
        return Err(AmiError::InvalidParams);
    }

    if !fixed.contains_key(HEADER_ACTION_ID) {
        fixed.insert(HEADER_ACTION_ID.to_string(), generate_action_id());
    }

    Ok(fixed)
}
