//! The sign-up page and the handler that registers a new identity.

use axum::{
    Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::{PasswordHash, ValidatedPassword, password::PASSWORD_MIN_LENGTH},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, LINK_STYLE, base,
        email_input, loading_spinner, log_in_register, password_input,
    },
    identity::IdentityProvider,
};

/// Error messages shown next to the sign-up form fields.
#[derive(Debug, Default)]
struct SignUpErrors<'a> {
    email: Option<&'a str>,
    password: Option<&'a str>,
    confirm_password: Option<&'a str>,
}

fn confirm_password_input(error_message: Option<&str>) -> Markup {
    html! {
        div
        {
            label for="confirm-password" class=(FORM_LABEL_STYLE)
            {
                "Confirm Password"
            }

            input
                type="password"
                name="confirm_password"
                id="confirm-password"
                placeholder="••••••••"
                class=(FORM_TEXT_INPUT_STYLE)
                required
                minlength=(PASSWORD_MIN_LENGTH)
                autofocus[error_message.is_some()]
            ;

            @if let Some(error_message) = error_message
            {
                p class="text-red-500 text-base" { (error_message) }
            }
        }
    }
}

fn sign_up_form(email: &str, errors: SignUpErrors<'_>) -> Markup {
    html! {
        form
            hx-post=(endpoints::USERS_API)
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            hx-indicator="#indicator"
            hx-disabled-elt="#email, #password, #confirm-password, #submit-button"
            class="space-y-4 md:space-y-6"
        {
            (email_input(email, errors.email))
            (password_input("", PASSWORD_MIN_LENGTH, errors.password))
            (confirm_password_input(errors.confirm_password))

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Sign up"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Already have an account? "

                a href=(endpoints::LOG_IN_VIEW) tabindex="0" class=(LINK_STYLE)
                {
                  "Log in now"
                }
            }
        }
    }
}

/// Display the sign-up page.
pub async fn get_sign_up_page() -> Response {
    let form = sign_up_form("", SignUpErrors::default());
    let content = log_in_register("Create an account", &form);

    base("Sign Up", &[], &content).into_response()
}

/// The state needed for creating a new identity.
#[derive(Debug, Clone)]
pub struct SignUpState {
    pub identities: IdentityProvider,
}

impl FromRef<AppState> for SignUpState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            identities: state.identities.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Register a new identity and send the client to the log-in page.
///
/// Validation errors are shown next to the form fields. An email that is
/// already registered is reported with an alert.
pub async fn post_sign_up(
    State(state): State<SignUpState>,
    Form(form): Form<SignUpForm>,
) -> Response {
    if !email_address::EmailAddress::is_valid(form.email.trim()) {
        return sign_up_form(
            &form.email,
            SignUpErrors {
                email: Some("Enter a valid email address"),
                ..Default::default()
            },
        )
        .into_response();
    }

    let validated_password = match ValidatedPassword::new(&form.password) {
        Ok(password) => password,
        Err(error) => {
            return sign_up_form(
                &form.email,
                SignUpErrors {
                    password: Some(&error.to_string()),
                    ..Default::default()
                },
            )
            .into_response();
        }
    };

    if form.password != form.confirm_password {
        return sign_up_form(
            &form.email,
            SignUpErrors {
                confirm_password: Some("Must be same as password"),
                ..Default::default()
            },
        )
        .into_response();
    }

    let result = PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST)
        .and_then(|password_hash| state.identities.sign_up(&form.email, password_hash));

    match result {
        Ok(_) => (
            HxRedirect(format!("{}?registered=true", endpoints::LOG_IN_VIEW)),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(Error::InvalidEmail(_)) => sign_up_form(
            &form.email,
            SignUpErrors {
                email: Some("Enter a valid email address"),
                ..Default::default()
            },
        )
        .into_response(),
        Err(error) => error.into_alert_response(),
    }
}
