//! Log-out route handler that ends the session and redirects users.

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};

use crate::{
    AppState,
    auth::{cookie::get_token_from_cookies, invalidate_auth_cookie},
    endpoints,
    identity::IdentityProvider,
};

/// The state needed for logging out.
#[derive(Debug, Clone)]
pub struct LogOutState {
    pub cookie_key: Key,
    pub identities: IdentityProvider,
}

impl FromRef<AppState> for LogOutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            identities: state.identities.clone(),
        }
    }
}

impl FromRef<LogOutState> for Key {
    fn from_ref(state: &LogOutState) -> Self {
        state.cookie_key.clone()
    }
}

/// Sign out the session's identity, invalidate the auth cookie and redirect
/// the client to the log-in page.
///
/// Anonymous identities cannot sign in again, so they are deleted along with
/// their data.
pub async fn get_log_out(State(state): State<LogOutState>, jar: PrivateCookieJar) -> Response {
    if let Ok(token) = get_token_from_cookies(&jar) {
        let identity_id = token.identity_id;
        state.identities.sign_out(&identity_id);

        match state.identities.get_identity(&identity_id) {
            Ok(identity) if identity.is_anonymous => {
                if let Err(error) = state.identities.delete_identity(&identity_id) {
                    tracing::error!("Could not delete anonymous identity {identity_id}: {error}");
                }
            }
            Ok(_) => {}
            Err(error) => tracing::warn!("Could not look up identity {identity_id}: {error}"),
        }
    }

    let jar = invalidate_auth_cookie(jar);

    (jar, Redirect::to(endpoints::LOG_IN_VIEW)).into_response()
}
