//! Tally is a web app for keeping track of your personal finances.
//!
//! Users sign in (with an email and password, or anonymously), record credits
//! and debits, and see their running balance, income and expense totals next to
//! a filterable, sortable list of their records.
//!
//! This library provides a REST API that directly serves HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod alert;
mod app_state;
mod auth;
mod db;
mod endpoints;
mod html;
mod identity;
mod internal_server_error;
mod ledger;
mod logging;
mod navigation;
mod not_found;
mod routing;
mod store;
mod timezone;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use identity::{Identity, IdentityEvent, IdentityId, IdentityProvider};
pub use ledger::{
    LedgerCounters, NewRecord, Record, RecordDate, RecordList, Tag, TransactionType,
    create_record, delete_record, get_records, read_counters,
};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use store::{DocumentStore, SqliteDocumentStore, StorePath, Subscription};

use crate::{alert::Alert, internal_server_error::InternalServerError, not_found::NotFound};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password did not match a registered identity.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Tried to sign up with an email that already belongs to an identity.
    #[error("the email {0} is already registered")]
    EmailAlreadyInUse(String),

    /// The string is not a valid email address.
    #[error("{0} is not a valid email address")]
    InvalidEmail(String),

    /// The password does not satisfy the password rules.
    ///
    /// The string explains which rule was broken and is safe to show to the user.
    #[error("{0}")]
    InvalidPassword(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A debit was larger than the current balance.
    ///
    /// Nothing is written to the store when this error is returned.
    #[error("Insufficient Funds")]
    InsufficientFunds {
        /// The balance at the time of the check.
        balance: f64,
        /// The amount of the rejected debit.
        amount: f64,
    },

    /// The amount of a record must be a positive, finite number.
    #[error("{0} is not a valid amount, the amount must be greater than zero")]
    InvalidAmount(f64),

    /// The date of a record could not be parsed or built.
    #[error("invalid record date: {0}")]
    InvalidDate(String),

    /// The string is not one of the fixed record tags.
    #[error("{0} is not a valid tag")]
    InvalidTag(String),

    /// The string is neither "Credit" nor "Debit".
    #[error("{0} is not a valid transaction type")]
    InvalidTransactionType(String),

    /// A store path was empty or contained a forbidden character.
    #[error("invalid store path \"{0}\"")]
    InvalidStorePath(String),

    /// A value read from the store did not have the expected shape.
    #[error("could not decode the stored value at \"{path}\": {reason}")]
    InvalidStoredValue {
        /// Where the value was read from.
        path: String,
        /// Why the value could not be decoded.
        reason: String,
    },

    /// An error occurred while serializing a value as JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The store stopped publishing updates for a subscription.
    #[error("the subscription to \"{0}\" was closed")]
    SubscriptionClosed(String),

    /// Tried to delete a record that does not exist.
    #[error("tried to delete a record that is not in the store")]
    DeleteMissingRecord,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => NotFound.into_response(),
            Error::InvalidTimezoneError(timezone) => {
                InternalServerError::invalid_timezone(&timezone).into_response()
            }
            Error::DatabaseLockError => InternalServerError::database_unavailable().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    /// Render the error as an alert fragment for HTMX requests.
    ///
    /// Known errors get a fixed, user-facing message. Everything else is
    /// logged and shown as a generic error.
    fn into_alert_response(self) -> Response {
        match self {
            Error::InvalidCredentials => Alert::error(
                "Could not log in",
                "Incorrect email or password",
            )
            .into_response_with_status(StatusCode::UNAUTHORIZED),
            Error::EmailAlreadyInUse(_) => Alert::error(
                "Could not create account",
                "An account is already registered with this email",
            )
            .into_response_with_status(StatusCode::CONFLICT),
            Error::InsufficientFunds { balance, amount } => Alert::error(
                "Insufficient Funds",
                &format!(
                    "Cannot debit {} when the balance is only {}.",
                    html::format_currency(amount),
                    html::format_currency(balance)
                ),
            )
            .into_response_with_status(StatusCode::UNPROCESSABLE_ENTITY),
            Error::InvalidAmount(amount) => Alert::error(
                "Invalid amount",
                &format!("{amount} is not a valid amount. Enter an amount greater than zero."),
            )
            .into_response_with_status(StatusCode::BAD_REQUEST),
            Error::InvalidDate(reason) => Alert::error("Invalid date", &reason)
                .into_response_with_status(StatusCode::BAD_REQUEST),
            Error::DeleteMissingRecord => Alert::error(
                "Could not delete record",
                "The record could not be found. \
                Try refreshing the page to see if the record has already been deleted.",
            )
            .into_response_with_status(StatusCode::NOT_FOUND),
            Error::InvalidTimezoneError(timezone) => Alert::error(
                "Invalid Timezone Settings",
                &format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            )
            .into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR),
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                Alert::error(
                    "Unexpected error encountered",
                    "Something went wrong, check the server logs for more details.",
                )
                .into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
