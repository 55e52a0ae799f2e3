use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::signatures::SignatureTables;
use crate::RequestAttributes;

/// Returns `true` if the request carries any authentication signal.
pub fn detect_auth_enumeration(request: &RequestAttributes, tables: &SignatureTables) -> bool {
    if has_basic_credentials(request) {
        return true;
    }

    let header_hit = tables
        .auth_headers
        .iter()
        .any(|name| request.header(name).is_some_and(|v| !v.is_empty()));
    if header_hit {
        return true;
    }

    tables
        .auth_query_params
        .iter()
        .any(|name| request.query_param(name).is_some_and(|v| !v.is_empty()))
}

/// Returns `true` if `Authorization` holds well-formed HTTP Basic credentials.
///
/// The scheme is matched case-insensitively and the decoded payload must be
/// valid UTF-8 containing a `:` separator.
pub fn has_basic_credentials(request: &RequestAttributes) -> bool {
    let Some(value) = request.header("authorization") else {
        return false;
    };

    const PREFIX: &str = "basic ";
    let scheme_matches = value
        .get(..PREFIX.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(PREFIX));
    if !scheme_matches {
        return false;
    }

    STANDARD
        .decode(value[PREFIX.len()..].trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .is_some_and(|decoded| decoded.contains(':'))
}
