//! This module holds typed parameters for various endpoint inputs.
//!
//! The purpose of this module is to define and manage the parameters that are used as inputs
//! for different endpoints in the web application. By using typed parameters, we can ensure
//! that the inputs are validated (by type) and correctly formatted before they are processed by the
//! application logic.
//!
//! Query parameters are accepted as raw strings and converted leniently: a
//! value that does not parse falls back to its default instead of rejecting
//! the request.

pub(crate) mod user;

use crate::Error;
use domain::Id;

/// Parses a `{id}` path segment.
pub(crate) fn parse_id(raw: &str) -> Result<Id, Error> {
    raw.parse::<Id>()
        .map_err(|_| Error::bad_request("Invalid ID"))
}

/// Loose boolean parsing: `1`, `t` and `true` in any case are true,
/// everything else is false.
pub(crate) fn parse_bool(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "t" | "true")
}
