//! The log-in page and the handlers for signing in with a password or anonymously.

use axum::{
    Form,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    alert::Alert,
    auth::{invalidate_auth_cookie, redirect::parse_redirect_url, set_auth_cookie},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, LINK_STYLE, base, email_input,
        loading_spinner, log_in_register, password_input,
    },
    identity::{Identity, IdentityProvider},
    timezone::get_local_offset,
};

fn log_in_form(redirect_url: Option<&str>) -> Markup {
    html! {
        form
            hx-post=(endpoints::LOG_IN_API)
            hx-target-error="#alert-container"
            hx-indicator="#indicator"
            hx-disabled-elt="#email, #password, #submit-button"
            class="space-y-4 md:space-y-6"
        {
            @if let Some(redirect_url) = redirect_url {
                input type="hidden" name="redirect_url" value=(redirect_url);
            }

            (email_input("", None))
            (password_input("", 0, None))

            div class="flex items-center gap-x-3"
            {
                input
                    type="checkbox"
                    name="remember_me"
                    id="remember_me"
                    tabindex="0"
                    class="rounded-xs";

                label
                    for="remember_me"
                    class="block text-sm font-medium text-gray-900 dark:text-white"
                {
                    "Keep me logged in for one week"
                }
            }

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Log in"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400" {
                "Don't have an account? "
                a href=(endpoints::SIGN_UP_VIEW) tabindex="0" class=(LINK_STYLE)
                {
                  "Sign up now"
                }
            }
        }
    }
}

fn anonymous_log_in_form(redirect_url: Option<&str>) -> Markup {
    html! {
        form
            hx-post=(endpoints::LOG_IN_ANONYMOUS_API)
            hx-target-error="#alert-container"
            hx-disabled-elt="#guest-button"
        {
            @if let Some(redirect_url) = redirect_url {
                input type="hidden" name="redirect_url" value=(redirect_url);
            }

            button type="submit" id="guest-button" class=(BUTTON_SECONDARY_STYLE)
            {
                "Continue as a guest"
            }
        }
    }
}

/// Query parameters for the log-in page.
#[derive(Debug, Default, Deserialize)]
pub struct LogInQuery {
    /// Where to go after logging in.
    pub redirect_url: Option<String>,
    /// Set after a successful sign-up.
    pub registered: Option<String>,
}

/// Display the log-in page.
pub async fn get_log_in_page(Query(query): Query<LogInQuery>) -> Response {
    let redirect_url = parse_redirect_url(query.redirect_url.as_deref(), "log-in query");
    let redirect_url = redirect_url.as_deref();

    let content = html! {
        @if query.registered.is_some() {
            (Alert::success(
                "Account created successfully",
                "Log in with your email and password to continue.",
            ).into_html())
        }

        (log_in_form(redirect_url))

        div class="flex items-center gap-x-3 text-sm text-gray-500 dark:text-gray-400"
        {
            hr class="flex-1";
            "or"
            hr class="flex-1";
        }

        (anonymous_log_in_form(redirect_url))
    };

    base(
        "Log In",
        &[],
        &log_in_register("Log in to your account", &content),
    )
    .into_response()
}

/// How long the auth cookie should last if the user selects "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// The state needed to sign in.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    pub identities: IdentityProvider,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            local_timezone: state.local_timezone.clone(),
            identities: state.identities.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered by the user in the log-in form.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    pub email: String,
    pub password: String,

    /// Whether to extend the initial auth cookie duration.
    ///
    /// This value comes from a checkbox, so it either has a string value or is not set.
    /// The `Some` variant should be interpreted as `true` irregardless of the
    /// string value.
    pub remember_me: Option<String>,

    /// Optional URL to redirect to after logging in.
    pub redirect_url: Option<String>,
}

/// Handler for log-in requests with an email and password.
///
/// On success the auth cookie is set and the client is redirected to
/// `redirect_url` or the summary page. Otherwise an alert explains the problem.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<LogInData>,
) -> Response {
    let redirect_url = parse_redirect_url(user_data.redirect_url.as_deref(), "log-in form");

    let identity = match state
        .identities
        .sign_in_with_password(&user_data.email, &user_data.password)
    {
        Ok(identity) => identity,
        Err(error) => return error.into_alert_response(),
    };

    let cookie_duration = if user_data.remember_me.is_some() {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    start_session(&state, jar, identity, cookie_duration, redirect_url)
}

/// The hidden fields of the anonymous log-in form.
#[derive(Clone, Serialize, Deserialize)]
pub struct AnonymousLogInData {
    pub redirect_url: Option<String>,
}

/// Handler for signing in as a new anonymous identity.
pub async fn post_log_in_anonymously(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Form(form): Form<AnonymousLogInData>,
) -> Response {
    let redirect_url = parse_redirect_url(form.redirect_url.as_deref(), "anonymous log-in form");

    match state.identities.sign_in_anonymously() {
        Ok(identity) => {
            let cookie_duration = state.cookie_duration;
            start_session(&state, jar, identity, cookie_duration, redirect_url)
        }
        Err(error) => error.into_alert_response(),
    }
}

fn start_session(
    state: &LogInState,
    jar: PrivateCookieJar,
    identity: Identity,
    cookie_duration: Duration,
    redirect_url: Option<String>,
) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        return Error::InvalidTimezoneError(state.local_timezone.clone()).into_alert_response();
    };

    let redirect_url = redirect_url.unwrap_or_else(|| endpoints::SUMMARY_VIEW.to_owned());

    match set_auth_cookie(jar.clone(), identity.id, cookie_duration, local_offset) {
        Ok(updated_jar) => (StatusCode::SEE_OTHER, HxRedirect(redirect_url), updated_jar)
            .into_response(),
        Err(error) => {
            tracing::error!("Error setting auth cookie: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                HxRedirect(endpoints::INTERNAL_ERROR_VIEW.to_owned()),
                invalidate_auth_cookie(jar),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod log_in_page_tests {
    use axum::{extract::Query, http::StatusCode};
    use scraper::Selector;

    use crate::{
        auth::log_in::{LogInQuery, get_log_in_page},
        endpoints,
        test_utils::{
            assert_alert_message, assert_form_input, assert_hx_endpoint, assert_valid_html,
            parse_html_document,
        },
    };

    #[tokio::test]
    async fn log_in_page_displays_both_forms() {
        let response = get_log_in_page(Query(LogInQuery::default())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);

        let forms = document
            .select(&Selector::parse("form").unwrap())
            .collect::<Vec<_>>();
        assert_eq!(forms.len(), 2, "want 2 forms, got {}", forms.len());

        assert_hx_endpoint(&forms[0], endpoints::LOG_IN_API, "hx-post");
        assert_form_input(&forms[0], "email", "email");
        assert_form_input(&forms[0], "password", "password");
        assert_hx_endpoint(&forms[1], endpoints::LOG_IN_ANONYMOUS_API, "hx-post");

        let sign_up_link = forms[0]
            .select(&Selector::parse("a[href]").unwrap())
            .next()
            .expect("No sign up link");
        assert_eq!(
            sign_up_link.value().attr("href"),
            Some(endpoints::SIGN_UP_VIEW)
        );
    }

    #[tokio::test]
    async fn log_in_page_preserves_redirect_url_in_both_forms() {
        let response = get_log_in_page(Query(LogInQuery {
            redirect_url: Some("/add".to_owned()),
            registered: None,
        }))
        .await;

        let document = parse_html_document(response).await;
        let inputs = document
            .select(&Selector::parse("input[name=redirect_url]").unwrap())
            .collect::<Vec<_>>();
        assert_eq!(inputs.len(), 2);
        for input in inputs {
            assert_eq!(input.value().attr("value"), Some("/add"));
        }
    }

    #[tokio::test]
    async fn log_in_page_drops_unsafe_redirect_url() {
        let response = get_log_in_page(Query(LogInQuery {
            redirect_url: Some("https://example.com".to_owned()),
            registered: None,
        }))
        .await;

        let document = parse_html_document(response).await;
        let inputs = document
            .select(&Selector::parse("input[name=redirect_url]").unwrap())
            .count();
        assert_eq!(inputs, 0);
    }

    #[tokio::test]
    async fn log_in_page_confirms_registration() {
        let response = get_log_in_page(Query(LogInQuery {
            redirect_url: None,
            registered: Some("true".to_owned()),
        }))
        .await;

        let document = parse_html_document(response).await;
        assert_alert_message(&document, "Account created successfully");
    }
}
