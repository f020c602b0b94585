//! Wire payload parsing for the upstream queue response.
//!
//! The response is `{"package": null}` or `{"package": {"killID":
//! <u64>, "zkb": {"hash": "<opaque>", ...}}}`. Both the legacy inline-event
//! payload (which carries the full killmail body alongside `zkb`) and the
//! id+hash-only payload satisfy this shape — this module never looks past
//! `killID`/`zkb.hash`, so either form parses identically and only an
//! [`gatewatch_core::EventRef`] escapes to the rest of the pipeline (Design
//! Notes: parse dynamic payloads into closed typed records at the edge).

use serde::Deserialize;

use gatewatch_core::EventRef;

#[derive(Debug, Deserialize)]
struct QueueResponse {
    package: Option<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    #[serde(rename = "killID")]
    kill_id: u64,
    zkb: ZkbBlock,
}

#[derive(Debug, Deserialize)]
struct ZkbBlock {
    hash: String,
}

/// Outcome of parsing one long-poll response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPayload {
    /// A resolvable event reference was present.
    Event(EventRef),
    /// `{"package": null}` — no event was waiting within `ttw`.
    Empty,
}

/// Parse a raw JSON response body .
///
/// Any payload lacking both `killID` and `zkb.hash` is treated as invalid
/// and the caller should log-and-skip rather than propagate a fatal error.
pub fn parse_queue_response(body: &str) -> Result<ParsedPayload, serde_json::Error> {
    let response: QueueResponse = serde_json::from_str(body)?;
    Ok(match response.package {
        None => ParsedPayload::Empty,
        Some(pkg) => ParsedPayload::Event(EventRef::new(pkg.kill_id, pkg.zkb.hash)),
    })
}
