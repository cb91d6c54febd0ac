//! Pushes the ledger counters to the summary page.
//!
//! The counter cards ask for the counters with the values they are showing.
//! The endpoint answers straight away if the stored values differ, and
//! otherwise holds the request open until a counter changes, the identity
//! signs out or the poll times out. Every answer renders the cards again, and
//! the new cards start the next poll as soon as they load.

use std::{sync::Arc, time::Duration};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::Deserialize;

use crate::{
    AppState, Error, endpoints,
    auth::AuthStateObserver,
    html::format_currency,
    identity::{Identity, IdentityProvider},
    ledger::{
        LedgerCounters,
        core::{LedgerPaths, counter_from_value},
    },
    store::{DocumentStore, Subscription},
};

/// How long a poll is held open when nothing changes.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(25);

/// The state needed to push the ledger counters.
#[derive(Debug, Clone)]
pub struct CountersState {
    pub store: Arc<dyn DocumentStore>,
    pub identities: IdentityProvider,
}

impl FromRef<AppState> for CountersState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            identities: state.identities.clone(),
        }
    }
}

/// The counter values the client is currently showing.
#[derive(Debug, Default, Deserialize)]
pub struct CountersQuery {
    pub balance: Option<f64>,
    pub income: Option<f64>,
    pub expense: Option<f64>,
}

impl CountersQuery {
    fn shows(&self, counters: &LedgerCounters) -> bool {
        self.balance == Some(counters.balance)
            && self.income == Some(counters.income)
            && self.expense == Some(counters.expense)
    }
}

fn counter_card(title: &str, id: &str, value: f64) -> Markup {
    html! {
        div class="flex-1 min-w-40 p-4 rounded-lg shadow-sm bg-white dark:bg-gray-800"
        {
            h3 class="text-sm font-medium text-gray-500 dark:text-gray-400" { (title) }
            p id=(id) class="text-2xl font-bold text-gray-900 dark:text-white"
            {
                (format_currency(value))
            }
        }
    }
}

/// The balance, income and expense cards, which poll for updates once loaded.
pub fn counters_view(counters: &LedgerCounters) -> Markup {
    let poll_url = format!(
        "{}?balance={}&income={}&expense={}",
        endpoints::COUNTERS_API,
        counters.balance,
        counters.income,
        counters.expense
    );

    html! {
        div
            id="counters"
            hx-get=(poll_url)
            hx-trigger="load"
            hx-swap="outerHTML"
            class="flex flex-wrap gap-4 mb-6"
        {
            (counter_card("Balance", "balance", counters.balance))
            (counter_card("Income", "income", counters.income))
            (counter_card("Expense", "expense", counters.expense))
        }
    }
}

struct CounterSubscriptions {
    balance: Subscription,
    income: Subscription,
    expense: Subscription,
}

impl CounterSubscriptions {
    fn new(store: &dyn DocumentStore, identity: &Identity) -> Result<Self, Error> {
        let paths = LedgerPaths::new(identity)?;

        Ok(Self {
            balance: store.subscribe(&paths.balance)?,
            income: store.subscribe(&paths.income)?,
            expense: store.subscribe(&paths.expense)?,
        })
    }

    fn current(&self) -> Result<LedgerCounters, Error> {
        let read = |subscription: &Subscription| match subscription.current() {
            None => Ok(0.0),
            Some(value) => counter_from_value(subscription.path(), &value),
        };

        Ok(LedgerCounters {
            balance: read(&self.balance)?,
            income: read(&self.income)?,
            expense: read(&self.expense)?,
        })
    }
}

enum Wake {
    CountersChanged,
    SignedOut,
}

async fn wait_for_change(
    subscriptions: &mut CounterSubscriptions,
    observer: &mut AuthStateObserver,
) -> Result<Wake, Error> {
    loop {
        tokio::select! {
            result = subscriptions.balance.changed() => return result.map(|_| Wake::CountersChanged),
            result = subscriptions.income.changed() => return result.map(|_| Wake::CountersChanged),
            result = subscriptions.expense.changed() => return result.map(|_| Wake::CountersChanged),
            auth_state = observer.changed() => {
                if auth_state.identity.is_none() {
                    return Ok(Wake::SignedOut);
                }
            }
        }
    }
}

/// A route handler that long polls for the ledger counters of the signed-in identity.
pub async fn get_counters(
    State(state): State<CountersState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<CountersQuery>,
) -> Response {
    let mut subscriptions = match CounterSubscriptions::new(state.store.as_ref(), &identity) {
        Ok(subscriptions) => subscriptions,
        Err(error) => return error.into_alert_response(),
    };

    let counters = match subscriptions.current() {
        Ok(counters) => counters,
        Err(error) => return error.into_alert_response(),
    };
    if !query.shows(&counters) {
        return counters_view(&counters).into_response();
    }

    let mut observer = AuthStateObserver::new(&state.identities, identity.id.clone());
    if observer.wait_until_loaded().await.identity.is_none() {
        return signed_out_response();
    }

    let wake = tokio::time::timeout(
        LONG_POLL_TIMEOUT,
        wait_for_change(&mut subscriptions, &mut observer),
    )
    .await;

    match wake {
        Ok(Ok(Wake::SignedOut)) => signed_out_response(),
        Ok(Err(error)) => error.into_alert_response(),
        Ok(Ok(Wake::CountersChanged)) | Err(_) => match subscriptions.current() {
            Ok(counters) => counters_view(&counters).into_response(),
            Err(error) => error.into_alert_response(),
        },
    }
}

fn signed_out_response() -> Response {
    (
        HxRedirect(endpoints::LOG_IN_VIEW.to_owned()),
        StatusCode::OK,
    )
        .into_response()
}
