//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth::{
        auth_guard, auth_guard_hx, get_log_in_page, get_log_out, get_sign_up_page, post_log_in,
        post_log_in_anonymously, post_sign_up,
    },
    endpoints,
    internal_server_error::get_internal_server_error_page,
    ledger::{
        create_record_endpoint, delete_record_endpoint, get_counters, get_new_record_page,
        get_records_table, get_summary_page,
    },
    not_found::get_404_not_found,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN_VIEW, get(get_log_in_page))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(
            endpoints::LOG_IN_ANONYMOUS_API,
            post(post_log_in_anonymously),
        )
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(endpoints::SIGN_UP_VIEW, get(get_sign_up_page))
        .route(endpoints::USERS_API, post(post_sign_up))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    let protected_routes = Router::new()
        .route(endpoints::SUMMARY_VIEW, get(get_summary_page))
        .route(endpoints::NEW_RECORD_VIEW, get(get_new_record_page))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    // HTMX requests need the HX-REDIRECT header for auth redirects to work properly.
    let protected_routes = protected_routes.merge(
        Router::new()
            .route(
                endpoints::RECORDS_API,
                get(get_records_table).post(create_record_endpoint),
            )
            .route(endpoints::RECORD, delete(delete_record_endpoint))
            .route(endpoints::COUNTERS_API, get(get_counters))
            .layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
    );

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{AppState, build_router, endpoints};

    fn get_test_server() -> TestServer {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "42",
            "Pacific/Auckland",
        )
        .unwrap();

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn summary_redirects_to_log_in_without_session() {
        let server = get_test_server();

        let response = server.get(endpoints::SUMMARY_VIEW).await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), "/login?redirect_url=%2F");
    }

    #[tokio::test]
    async fn records_api_uses_hx_redirect_without_session() {
        let server = get_test_server();

        let response = server.get(endpoints::RECORDS_API).await;

        response.assert_status_ok();
        assert!(
            response
                .header("hx-redirect")
                .to_str()
                .unwrap()
                .starts_with(endpoints::LOG_IN_VIEW)
        );
    }

    #[tokio::test]
    async fn log_in_page_is_public() {
        let server = get_test_server();

        server.get(endpoints::LOG_IN_VIEW).await.assert_status_ok();
        server.get(endpoints::SIGN_UP_VIEW).await.assert_status_ok();
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_test_server();

        server
            .get("/does/not/exist")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn error_page_is_public() {
        let server = get_test_server();

        let response = server.get(endpoints::INTERNAL_ERROR_VIEW).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().contains("Sorry, something went wrong."));
    }

    #[tokio::test]
    async fn registered_user_can_log_in() {
        let server = get_test_server();

        let response = server
            .post(endpoints::USERS_API)
            .form(&[
                ("email", "foo@bar.baz"),
                ("password", "Hunter2!x"),
                ("confirm_password", "Hunter2!x"),
            ])
            .await;
        response.assert_status_see_other();
        assert_eq!(response.header("hx-redirect"), "/login?registered=true");

        let token = server
            .post(endpoints::LOG_IN_API)
            .form(&[("email", "foo@bar.baz"), ("password", "Hunter2!x")])
            .await
            .cookie(crate::auth::COOKIE_TOKEN);

        let summary = server
            .get(endpoints::SUMMARY_VIEW)
            .add_cookie(token)
            .await;
        summary.assert_status_ok();
        assert!(summary.text().contains("Signed in as foo@bar.baz"));
    }

    #[tokio::test]
    async fn anonymous_guest_can_add_and_delete_records() {
        let server = get_test_server();
        let token = server
            .post(endpoints::LOG_IN_ANONYMOUS_API)
            .form(&[("redirect_url", "/")])
            .await
            .cookie(crate::auth::COOKIE_TOKEN);

        let response = server
            .post(endpoints::RECORDS_API)
            .add_cookie(token.clone())
            .form(&[
                ("day", "5"),
                ("month", "Mar"),
                ("year", "2024"),
                ("tag", "Income 💰"),
                ("amount", "250"),
                ("type", "Credit"),
            ])
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("hx-redirect"), endpoints::SUMMARY_VIEW);

        let table = server
            .get(endpoints::RECORDS_API)
            .add_cookie(token.clone())
            .await
            .text();
        let html = scraper::Html::parse_fragment(&table);
        let row = scraper::Selector::parse("tr[data-record-id]").unwrap();
        let record_id = html
            .select(&row)
            .next()
            .and_then(|row| row.value().attr("data-record-id"))
            .expect("record row missing")
            .to_owned();

        server
            .delete(&endpoints::format_endpoint(endpoints::RECORD, &record_id))
            .add_cookie(token)
            .await
            .assert_status_ok();
    }
}
