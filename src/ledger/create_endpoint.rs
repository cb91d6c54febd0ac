//! Defines the endpoint for adding a record.

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
// axum_extra's Form parses an empty number field as None, which lets an empty
// day or amount be reported as "Required" instead of rejecting the request.
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;

use crate::{
    endpoints,
    identity::Identity,
    ledger::{
        LedgerState,
        core::create_record,
        form::{RecordFormData, RecordFormValues, record_form, validate_record_form},
    },
};

/// A route handler for adding a record, redirects to the summary page on success.
///
/// Invalid fields re-render the form with the error messages. Ledger errors,
/// such as a debit larger than the balance, are returned as an alert.
pub async fn create_record_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<RecordFormData>,
) -> Response {
    let new_record = match validate_record_form(&form) {
        Ok(new_record) => new_record,
        Err(errors) => {
            tracing::debug!("Rejected record form for {}: {errors:?}", identity.id);
            return record_form(&RecordFormValues::from(form), &errors).into_response();
        }
    };

    if let Err(error) = create_record(state.store.as_ref(), &identity, new_record) {
        tracing::error!("could not create record: {error}");

        return error.into_alert_response();
    }

    (
        HxRedirect(endpoints::SUMMARY_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Extension, extract::State, http::StatusCode};
    use axum_extra::extract::Form;

    use crate::{
        endpoints,
        identity::Identity,
        ledger::{
            LedgerCounters, LedgerState, Tag, TransactionType,
            core::{get_records, read_counters, test_utils::get_store_and_identity},
            create_endpoint::create_record_endpoint,
            form::RecordFormData,
        },
        store::SqliteDocumentStore,
        test_utils::{assert_alert_message, assert_hx_redirect, parse_html_fragment},
    };

    fn form(amount: f64, transaction_type: &str) -> RecordFormData {
        RecordFormData {
            day: Some(5),
            month: "Mar".to_owned(),
            year: Some(2024),
            tag: "Food 🍜".to_owned(),
            amount: Some(amount),
            transaction_type: transaction_type.to_owned(),
        }
    }

    fn get_state() -> (LedgerState, Arc<SqliteDocumentStore>, Identity) {
        let (store, identity) = get_store_and_identity();
        let state = LedgerState {
            store: store.clone(),
        };

        (state, store, identity)
    }

    #[tokio::test]
    async fn creates_record_and_redirects() {
        let (state, store, identity) = get_state();

        let response = create_record_endpoint(
            State(state),
            Extension(identity.clone()),
            Form(form(100.0, "Credit")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::SUMMARY_VIEW);
        let records = get_records(store.as_ref(), &identity).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag, Tag::Food);
        assert_eq!(records[0].transaction_type, TransactionType::Credit);
        assert_eq!(records[0].date.as_str(), "5 Mar 2024");
        assert_eq!(
            read_counters(store.as_ref(), &identity).unwrap(),
            LedgerCounters {
                balance: 100.0,
                income: 100.0,
                expense: 0.0
            }
        );
    }

    #[tokio::test]
    async fn debit_over_balance_shows_alert() {
        let (state, store, identity) = get_state();

        let response = create_record_endpoint(
            State(state),
            Extension(identity.clone()),
            Form(form(150.0, "Debit")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = parse_html_fragment(response).await;
        assert_alert_message(&html, "Insufficient Funds");
        assert!(get_records(store.as_ref(), &identity).unwrap().is_empty());
        assert_eq!(
            read_counters(store.as_ref(), &identity).unwrap(),
            LedgerCounters::default()
        );
    }

    #[tokio::test]
    async fn invalid_fields_rerender_form() {
        let (state, store, identity) = get_state();
        let mut data = form(10.0, "Credit");
        data.day = Some(31);
        data.month = "Apr".to_owned();

        let response =
            create_record_endpoint(State(state), Extension(identity.clone()), Form(data)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        let error = scraper::Selector::parse("form p").unwrap();
        let messages: Vec<String> = html
            .select(&error)
            .map(|p| p.text().collect::<String>())
            .collect();
        assert_eq!(messages, ["Cannot be more than 30"]);
        assert!(get_records(store.as_ref(), &identity).unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_amount_is_required() {
        let (state, store, identity) = get_state();
        let mut data = form(10.0, "Credit");
        data.amount = None;

        let response =
            create_record_endpoint(State(state), Extension(identity.clone()), Form(data)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        let error = scraper::Selector::parse("form p").unwrap();
        let messages: Vec<String> = html
            .select(&error)
            .map(|p| p.text().collect::<String>())
            .collect();
        assert_eq!(messages, ["Required"]);
        assert!(get_records(store.as_ref(), &identity).unwrap().is_empty());
    }
}
