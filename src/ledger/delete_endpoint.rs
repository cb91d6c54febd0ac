use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    identity::Identity,
    ledger::{LedgerState, core::delete_record},
};

/// A route handler for deleting a record and reversing its effect on the ledger counters.
///
/// Responds with an empty body on success so that HTMX removes the table row,
/// or with an alert if the record could not be deleted.
pub async fn delete_record_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<Identity>,
    Path(record_id): Path<String>,
) -> Response {
    match delete_record(state.store.as_ref(), &identity, &record_id) {
        // The status code has to be 200 OK or HTMX will not delete the table row.
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => {
            tracing::error!("Could not delete record {record_id}: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
    };

    use crate::{
        ledger::{
            LedgerCounters, LedgerState, NewRecord, RecordDate, Tag, TransactionType,
            core::{create_record, get_records, read_counters, test_utils::get_store_and_identity},
            delete_endpoint::delete_record_endpoint,
        },
        test_utils::{assert_alert_message, parse_html_fragment},
    };

    #[tokio::test]
    async fn deletes_record_and_reverts_counters() {
        let (store, identity) = get_store_and_identity();
        let new_record = |amount, transaction_type| NewRecord {
            date: RecordDate::new_unchecked("5 Mar 2024"),
            tag: Tag::Lifestyle,
            transaction_type,
            amount,
        };
        create_record(
            store.as_ref(),
            &identity,
            new_record(100.0, TransactionType::Credit),
        )
        .unwrap();
        let debit = create_record(
            store.as_ref(),
            &identity,
            new_record(30.0, TransactionType::Debit),
        )
        .unwrap();
        let state = LedgerState {
            store: store.clone(),
        };

        let response =
            delete_record_endpoint(State(state), Extension(identity.clone()), Path(debit.id))
                .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(get_records(store.as_ref(), &identity).unwrap().len(), 1);
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
    async fn missing_record_shows_alert() {
        let (store, identity) = get_store_and_identity();
        let state = LedgerState { store };

        let response = delete_record_endpoint(
            State(state),
            Extension(identity),
            Path("not-a-record".to_owned()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let html = parse_html_fragment(response).await;
        assert_alert_message(&html, "Could not delete record");
    }
}
