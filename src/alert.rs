//! Alert system for displaying success and error messages to users.
//!
//! Alerts are rendered as HTML fragments that HTMX swaps into the
//! `#alert-container` element of the base page (see `hx-target-error`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

/// Alert message types for styling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    Success,
    Error,
}

/// A message shown to the user after an action.
#[derive(Debug, Clone)]
pub struct Alert<'a> {
    pub alert_type: AlertType,
    pub message: &'a str,
    pub details: &'a str,
}

impl<'a> Alert<'a> {
    /// Create a new success alert
    pub fn success(message: &'a str, details: &'a str) -> Self {
        Self {
            alert_type: AlertType::Success,
            message,
            details,
        }
    }

    /// Create a new error alert
    pub fn error(message: &'a str, details: &'a str) -> Self {
        Self {
            alert_type: AlertType::Error,
            message,
            details,
        }
    }

    pub fn into_html(self) -> Markup {
        let style = match self.alert_type {
            AlertType::Success => {
                "flex items-start p-4 mb-4 text-sm text-green-800 rounded-lg \
                bg-green-50 dark:bg-gray-800 dark:text-green-400 shadow-lg"
            }
            AlertType::Error => {
                "flex items-start p-4 mb-4 text-sm text-red-800 rounded-lg \
                bg-red-50 dark:bg-gray-800 dark:text-red-400 shadow-lg"
            }
        };

        html! {
            div
                class=(style)
                role="alert"
                data-alert-type=(match self.alert_type {
                    AlertType::Success => "success",
                    AlertType::Error => "error",
                })
            {
                div class="flex-1"
                {
                    p class="font-semibold" data-alert-message { (self.message) }

                    @if !self.details.is_empty() {
                        p data-alert-details { (self.details) }
                    }
                }

                button
                    type="button"
                    class="ms-3 font-bold"
                    aria-label="Dismiss"
                    onclick="this.parentElement.remove()"
                {
                    "×"
                }
            }
        }
    }

    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, self.into_html()).into_response()
    }
}
