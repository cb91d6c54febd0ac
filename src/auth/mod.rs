//! Authentication: passwords, session cookies, the auth guard middleware and
//! the log-in, sign-up and log-out pages.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod redirect;
mod session;
mod sign_up;
mod token;

pub use cookie::{
    COOKIE_TOKEN, DEFAULT_COOKIE_DURATION, get_token_from_cookies, invalidate_auth_cookie,
    set_auth_cookie,
};
pub use log_in::{get_log_in_page, post_log_in, post_log_in_anonymously};
pub use log_out::get_log_out;
pub use middleware::{auth_guard, auth_guard_hx};
pub use password::{PasswordHash, ValidatedPassword};
pub use session::{AuthState, AuthStateObserver, Guard, guard};
pub use sign_up::{get_sign_up_page, post_sign_up};
pub(crate) use token::Token;
