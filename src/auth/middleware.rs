//! Authentication middleware that resolves the session's identity, extends
//! sessions and redirects signed-out clients to the log-in page.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use time::Duration;

use crate::{
    AppState,
    auth::{
        cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
        redirect::log_in_redirect_url,
        session::{AuthStateObserver, Guard, guard},
    },
    identity::IdentityProvider,
    timezone::get_local_offset,
};

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthGuardState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    pub identities: IdentityProvider,
}

impl FromRef<AppState> for AuthGuardState {
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
impl FromRef<AuthGuardState> for Key {
    fn from_ref(state: &AuthGuardState) -> Self {
        state.cookie_key.clone()
    }
}

/// Checks the session cookie, waits for the session's auth state to load and
/// either runs the request with the [Identity](crate::Identity) as an
/// extension or returns the response from `get_redirect`.
#[inline]
async fn auth_guard_internal(
    state: AuthGuardState,
    request: Request,
    next: Next,
    get_redirect: impl Fn(&str) -> Response,
) -> Response {
    let log_in_redirect_url = log_in_redirect_url(&request);
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        tracing::error!("Error getting local timezone. Redirecting to log in page.");
        return get_redirect(&log_in_redirect_url);
    };

    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}. Redirecting to log in page.");
            return get_redirect(&log_in_redirect_url);
        }
    };
    let Ok(token) = get_token_from_cookies(&jar) else {
        return get_redirect(&log_in_redirect_url);
    };

    let mut observer = AuthStateObserver::new(&state.identities, token.identity_id);
    let identity = match guard(&observer.wait_until_loaded().await) {
        Guard::Allow(identity) => identity,
        Guard::RedirectToLogIn => return get_redirect(&log_in_redirect_url),
        Guard::Loading => {
            tracing::error!("Auth state still loading after waiting for it. Redirecting.");
            return get_redirect(&log_in_redirect_url);
        }
    };

    parts.extensions.insert(identity);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let jar = match extend_auth_cookie_duration_if_needed(
        jar.clone(),
        state.cookie_duration,
        local_offset,
    ) {
        Ok(updated_jar) => updated_jar,
        Err(err) => {
            tracing::error!("Error extending cookie duration: {err:?}. Rolling back cookie jar.");
            jar
        }
    };
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}

/// Middleware for pages: signed-out clients get a `303 See Other` to the log-in page.
///
/// **Note**: Route handlers can use the function argument `Extension(identity): Extension<Identity>` to receive the identity.
pub async fn auth_guard(
    State(state): State<AuthGuardState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, |redirect_url| {
        Redirect::to(redirect_url).into_response()
    })
    .await
}

/// Middleware for HTMX API routes: signed-out clients get a `HX-Redirect` to the log-in page.
///
/// **Note**: Route handlers can use the function argument `Extension(identity): Extension<Identity>` to receive the identity.
pub async fn auth_guard_hx(
    State(state): State<AuthGuardState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, |redirect_url| {
        (HxRedirect(redirect_url.to_owned()), StatusCode::OK).into_response()
    })
    .await
}

#[cfg(test)]
mod auth_guard_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Router,
        extract::Path,
        middleware,
        routing::{get, post},
    };
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Cookie, Key, SameSite},
    };
    use axum_test::TestServer;
    use rusqlite::Connection;
    use sha2::Digest;
    use time::{Duration, OffsetDateTime, UtcOffset};

    use crate::{
        Error,
        auth::{
            COOKIE_TOKEN, DEFAULT_COOKIE_DURATION, auth_guard, auth_guard_hx,
            middleware::AuthGuardState, set_auth_cookie,
        },
        endpoints,
        identity::{Identity, IdentityId, IdentityProvider, create_identity_table},
        store::{SqliteDocumentStore, create_node_table},
    };

    async fn test_handler(Extension(identity): Extension<Identity>) -> String {
        identity.id.to_string()
    }

    /// Shorter than any session duration the tests configure, so every
    /// authenticated request extends the cookie.
    const LOG_IN_COOKIE_DURATION: Duration = Duration::seconds(5);

    async fn stub_log_in_route(
        Path(identity_id): Path<String>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        set_auth_cookie(
            jar,
            IdentityId::new(&identity_id),
            LOG_IN_COOKIE_DURATION,
            UtcOffset::UTC,
        )
    }

    const TEST_LOG_IN_ROUTE_PATH: &str = "/log_in/{identity_id}";
    const TEST_PROTECTED_ROUTE: &str = "/protected";
    const TEST_API_ROUTE: &str = "/api/protected";

    fn get_state(cookie_duration: Duration) -> AuthGuardState {
        let connection = Connection::open_in_memory().unwrap();
        create_identity_table(&connection).unwrap();
        create_node_table(&connection).unwrap();
        let connection = Arc::new(Mutex::new(connection));
        let store = Arc::new(SqliteDocumentStore::new(connection.clone()));
        let hash = sha2::Sha512::digest("nafstenoas");

        AuthGuardState {
            cookie_key: Key::from(&hash),
            cookie_duration,
            local_timezone: "Etc/UTC".to_owned(),
            identities: IdentityProvider::new(connection, store),
        }
    }

    fn get_test_server(state: AuthGuardState) -> TestServer {
        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(test_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .route(TEST_LOG_IN_ROUTE_PATH, post(stub_log_in_route))
            .merge(
                Router::new()
                    .route(TEST_API_ROUTE, get(test_handler))
                    .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
            )
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    fn log_in_path(identity_id: &IdentityId) -> String {
        endpoints::format_endpoint(TEST_LOG_IN_ROUTE_PATH, identity_id)
    }

    #[tokio::test]
    async fn protected_route_receives_identity() {
        let state = get_state(DEFAULT_COOKIE_DURATION);
        let identity = state.identities.sign_in_anonymously().unwrap();
        let server = get_test_server(state);
        let response = server.post(&log_in_path(&identity.id)).await;
        response.assert_status_ok();
        let token_cookie = response.cookie(COOKIE_TOKEN);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(token_cookie)
            .await;

        response.assert_status_ok();
        response.assert_text(identity.id.to_string());
    }

    #[track_caller]
    fn assert_date_time_close(left: OffsetDateTime, right: OffsetDateTime) {
        assert!(
            (left - right).abs() < Duration::seconds(1),
            "got date time {:?}, want {:?}",
            left,
            right
        );
    }

    #[tokio::test]
    async fn auth_guard_extends_cookie_by_configured_duration() {
        let session_duration = Duration::minutes(10);
        let state = get_state(session_duration);
        let identity = state.identities.sign_in_anonymously().unwrap();
        let server = get_test_server(state);
        let response = server.post(&log_in_path(&identity.id)).await;
        let jar = response.cookies();

        let response = server.get(TEST_PROTECTED_ROUTE).add_cookies(jar).await;

        let response_time = OffsetDateTime::now_utc();
        let auth_cookie = response.cookie(COOKIE_TOKEN);
        assert_date_time_close(
            auth_cookie.expires_datetime().unwrap(),
            response_time + session_duration,
        );
        assert_eq!(auth_cookie.secure(), Some(true));
        assert_eq!(auth_cookie.http_only(), Some(true));
        assert_eq!(auth_cookie.same_site(), Some(SameSite::Strict));
    }

    #[tokio::test]
    async fn no_auth_cookie_redirects_to_log_in() {
        let server = get_test_server(get_state(DEFAULT_COOKIE_DURATION));

        let response = server.get(TEST_PROTECTED_ROUTE).await;

        response.assert_status_see_other();
        assert_eq!(
            response.header("location"),
            "/login?redirect_url=%2Fprotected"
        );
    }

    #[tokio::test]
    async fn invalid_auth_cookie_redirects_to_log_in() {
        let server = get_test_server(get_state(DEFAULT_COOKIE_DURATION));

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(Cookie::build((COOKIE_TOKEN, "FOOBAR")).build())
            .await;

        response.assert_status_see_other();
    }

    #[tokio::test]
    async fn deleted_identity_redirects_to_log_in() {
        let state = get_state(DEFAULT_COOKIE_DURATION);
        let identity = state.identities.sign_in_anonymously().unwrap();
        let identities = state.identities.clone();
        let server = get_test_server(state);
        let token_cookie = server
            .post(&log_in_path(&identity.id))
            .await
            .cookie(COOKIE_TOKEN);
        identities.delete_identity(&identity.id).unwrap();

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(token_cookie)
            .await;

        response.assert_status_see_other();
    }

    #[tokio::test]
    async fn api_route_uses_hx_current_url_for_redirect() {
        let server = get_test_server(get_state(DEFAULT_COOKIE_DURATION));
        let current_url = "http://localhost:3000/?date=2024&type=Debit";

        let response = server
            .get(TEST_API_ROUTE)
            .add_header("HX-Request", "true")
            .add_header("HX-Current-URL", current_url)
            .await;

        response.assert_status_ok();
        let expected_query =
            serde_urlencoded::to_string([("redirect_url", "/?date=2024&type=Debit")]).unwrap();
        let expected_location = format!("{}?{}", endpoints::LOG_IN_VIEW, expected_query);
        assert_eq!(response.header("hx-redirect"), expected_location);
    }
}
