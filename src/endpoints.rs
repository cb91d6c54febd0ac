//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/records/{record_id}', use [format_endpoint].

use std::fmt::Display;

/// The summary page with the ledger counters and the record table.
pub const SUMMARY_VIEW: &str = "/";
/// The route for getting the log in page.
pub const LOG_IN_VIEW: &str = "/login";
/// The route for getting the sign-up page.
pub const SIGN_UP_VIEW: &str = "/signup";
/// The page for adding a new record.
pub const NEW_RECORD_VIEW: &str = "/add";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for static files.
pub const STATIC: &str = "/static";

/// The route for logging in with an email and password.
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for logging in as an anonymous guest.
pub const LOG_IN_ANONYMOUS_API: &str = "/api/log_in/anonymous";
/// The route for the client to log out the current identity.
pub const LOG_OUT: &str = "/api/log_out";
/// The route for signing up.
pub const USERS_API: &str = "/api/users";
/// The route to create records and list them as a table fragment.
pub const RECORDS_API: &str = "/api/records";
/// The route to access a single record.
pub const RECORD: &str = "/api/records/{record_id}";
/// The route that pushes updated ledger counters.
pub const COUNTERS_API: &str = "/api/counters";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace and ends with a
/// right brace. For example, in the endpoint path '/api/records/{record_id}',
/// '{record_id}' is the parameter. Only the first parameter is replaced.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: impl Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
