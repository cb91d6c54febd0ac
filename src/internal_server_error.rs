//! The page shown when the Tally server cannot complete a request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::Markup;

use crate::html::error_view;

/// A 500 page with a description of the failure and what the operator can do about it.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalServerError {
    pub description: String,
    pub fix: String,
}

impl Default for InternalServerError {
    fn default() -> Self {
        Self {
            description: "Sorry, something went wrong.".to_owned(),
            fix: "Try again later. If it keeps happening, check the log file given to the \
                Tally server with --log-path."
                .to_owned(),
        }
    }
}

impl InternalServerError {
    /// The ledger database could not be reached.
    pub fn database_unavailable() -> Self {
        Self {
            description: "The ledger database is unavailable.".to_owned(),
            fix: "Restart the Tally server and check that the file given with --db-path \
                can be opened."
                .to_owned(),
        }
    }

    /// The server was started with a timezone it cannot resolve.
    pub fn invalid_timezone(timezone: &str) -> Self {
        Self {
            description: "Invalid Timezone Settings".to_owned(),
            fix: format!(
                "Could not get the local timezone \"{timezone}\". Restart the Tally server \
                with --timezone set to a canonical timezone name, e.g. \"Pacific/Auckland\"."
            ),
        }
    }

    pub fn into_html(self) -> Markup {
        error_view("Internal Server Error", "500", &self.description, &self.fix)
    }
}

impl IntoResponse for InternalServerError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.into_html()).into_response()
    }
}

/// Route handler for the generic error page.
pub async fn get_internal_server_error_page() -> Response {
    InternalServerError::default().into_response()
}
