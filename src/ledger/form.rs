//! The form for adding a record and the validation of its fields.

use maud::{Markup, html};
use serde::Deserialize;
use time::Date;

use crate::{
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_ERROR_STYLE, FORM_LABEL_STYLE, FORM_RADIO_GROUP_STYLE,
        FORM_RADIO_INPUT_STYLE, FORM_RADIO_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, loading_spinner,
    },
    ledger::{
        NewRecord, RecordDate, Tag, TransactionType,
        core::{MONTHS, last_day_of_month},
    },
};

/// The values shown in the record form. Empty fields are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFormValues {
    pub day: Option<i64>,
    pub month: String,
    pub year: Option<i32>,
    pub tag: String,
    pub amount: Option<f64>,
    pub transaction_type: String,
}

impl RecordFormValues {
    /// The values for a fresh form: `today`, an income credit of 1.
    pub fn new(today: Date) -> Self {
        let month = MONTHS[usize::from(u8::from(today.month())) - 1];

        Self {
            day: Some(i64::from(today.day())),
            month: month.to_owned(),
            year: Some(today.year()),
            tag: Tag::Income.label().to_owned(),
            amount: Some(1.0),
            transaction_type: TransactionType::Credit.as_str().to_owned(),
        }
    }
}

/// The form data submitted when adding a record.
///
/// Missing or empty fields deserialize to `None` or the empty string so that
/// they are reported next to the field instead of rejecting the request.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordFormData {
    pub day: Option<i64>,
    #[serde(default)]
    pub month: String,
    pub year: Option<i32>,
    #[serde(default)]
    pub tag: String,
    pub amount: Option<f64>,
    #[serde(default, rename = "type")]
    pub transaction_type: String,
}

impl From<RecordFormData> for RecordFormValues {
    fn from(data: RecordFormData) -> Self {
        Self {
            day: data.day,
            month: data.month,
            year: data.year,
            tag: data.tag,
            amount: data.amount,
            transaction_type: data.transaction_type,
        }
    }
}

/// Error messages shown under the record form fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFormErrors {
    pub day: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
    pub tag: Option<String>,
    pub amount: Option<String>,
    pub transaction_type: Option<String>,
}

impl RecordFormErrors {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

const REQUIRED: &str = "Required";

/// Check the submitted fields and build the record they describe.
pub fn validate_record_form(data: &RecordFormData) -> Result<NewRecord, RecordFormErrors> {
    let mut errors = RecordFormErrors::default();

    if !MONTHS.contains(&data.month.as_str()) {
        errors.month = Some("Can only be one of the 12 options".to_owned());
    }

    match data.year {
        None => errors.year = Some(REQUIRED.to_owned()),
        Some(year) if !(1..=9999).contains(&year) => {
            errors.year = Some("Enter a year between 1 and 9999".to_owned());
        }
        Some(_) => {}
    }

    match data.day {
        None => errors.day = Some(REQUIRED.to_owned()),
        Some(day) if day < 1 => errors.day = Some("Cannot be less than 1".to_owned()),
        Some(day) => {
            let last_day = data
                .year
                .and_then(|year| last_day_of_month(&data.month, year));

            if let Some(last_day) = last_day
                && day > i64::from(last_day)
            {
                errors.day = Some(format!("Cannot be more than {last_day}"));
            }
        }
    }

    let tag = data.tag.parse::<Tag>().ok();
    if tag.is_none() {
        errors.tag = Some("Pick a sector".to_owned());
    }

    match data.amount {
        None => errors.amount = Some(REQUIRED.to_owned()),
        Some(amount) if !amount.is_finite() || amount <= 0.0 => {
            errors.amount = Some("Must be greater than 0".to_owned());
        }
        Some(_) => {}
    }

    let transaction_type = data.transaction_type.parse::<TransactionType>().ok();
    if transaction_type.is_none() {
        errors.transaction_type = Some(if data.transaction_type.trim().is_empty() {
            REQUIRED.to_owned()
        } else {
            "Pick Credit or Debit".to_owned()
        });
    }

    let (Some(day), Some(year), Some(amount), Some(tag), Some(transaction_type)) =
        (data.day, data.year, data.amount, tag, transaction_type)
    else {
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    let date = u8::try_from(day)
        .map_err(|error| error.to_string())
        .and_then(|day| {
            RecordDate::from_parts(day, &data.month, year).map_err(|error| error.to_string())
        });

    match date {
        Ok(date) => Ok(NewRecord {
            date,
            tag,
            transaction_type,
            amount,
        }),
        Err(error) => Err(RecordFormErrors {
            day: Some(error),
            ..Default::default()
        }),
    }
}

fn field_error(error: Option<&str>) -> Markup {
    html! {
        @if let Some(error) = error {
            p class=(FORM_ERROR_STYLE) { (error) }
        }
    }
}

/// The record form, posting to the records API and replacing itself with the
/// response when a field is invalid.
pub fn record_form(values: &RecordFormValues, errors: &RecordFormErrors) -> Markup {
    let is_debit = values.transaction_type == TransactionType::Debit.as_str();

    html! {
        form
            id="record-form"
            hx-post=(endpoints::RECORDS_API)
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="w-full space-y-4 md:space-y-6"
        {
            h2 class="text-xl font-bold" { "Add a record" }

            fieldset
            {
                legend class=(FORM_LABEL_STYLE) { "Date" }

                div class="flex gap-2"
                {
                    div class="w-16"
                    {
                        input
                            name="day"
                            id="day"
                            type="number"
                            aria-label="Day"
                            required
                            value=[values.day]
                            class=(FORM_TEXT_INPUT_STYLE);
                    }

                    div class="w-28"
                    {
                        select
                            name="month"
                            id="month"
                            aria-label="Month"
                            class=(FORM_TEXT_INPUT_STYLE)
                        {
                            @for month in MONTHS {
                                option value=(month) selected[month == values.month] { (month) }
                            }
                        }
                    }

                    div class="w-24"
                    {
                        input
                            name="year"
                            id="year"
                            type="number"
                            aria-label="Year"
                            required
                            value=[values.year]
                            class=(FORM_TEXT_INPUT_STYLE);
                    }
                }

                (field_error(errors.day.as_deref()))
                (field_error(errors.month.as_deref()))
                (field_error(errors.year.as_deref()))
            }

            div
            {
                label for="tag" class=(FORM_LABEL_STYLE) { "Tag" }

                select name="tag" id="tag" class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for tag in Tag::ALL {
                        option value=(tag.label()) selected[tag.label() == values.tag] { (tag.label()) }
                    }
                }

                (field_error(errors.tag.as_deref()))
            }

            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }

                // w-full needed to ensure input takes the full width when prefilled with a value
                div class="input-wrapper w-full"
                {
                    input
                        name="amount"
                        id="amount"
                        type="number"
                        step="0.01"
                        min="0.01"
                        required
                        autofocus
                        value=[values.amount]
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                (field_error(errors.amount.as_deref()))
            }

            fieldset class="space-y-2"
            {
                legend class=(FORM_LABEL_STYLE) { "Type" }

                div class=(FORM_RADIO_GROUP_STYLE)
                {
                    div class="flex items-center gap-3"
                    {
                        input
                            name="type"
                            id="type-credit"
                            type="radio"
                            value="Credit"
                            checked[!is_debit]
                            required
                            class=(FORM_RADIO_INPUT_STYLE);

                        label for="type-credit" class=(FORM_RADIO_LABEL_STYLE) { "Credit" }
                    }

                    div class="flex items-center gap-3"
                    {
                        input
                            name="type"
                            id="type-debit"
                            type="radio"
                            value="Debit"
                            checked[is_debit]
                            required
                            class=(FORM_RADIO_INPUT_STYLE);

                        label for="type-debit" class=(FORM_RADIO_LABEL_STYLE) { "Debit" }
                    }
                }

                (field_error(errors.transaction_type.as_deref()))
            }

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span id="indicator" class="inline htmx-indicator"
                {
                    (loading_spinner())
                }
                " Add Record"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};
    use time::macros::date;

    use crate::ledger::{
        NewRecord, RecordDate, Tag, TransactionType,
        form::{RecordFormData, RecordFormValues, record_form, validate_record_form},
    };

    fn form_data(day: i64, month: &str, year: i32) -> RecordFormData {
        RecordFormData {
            day: Some(day),
            month: month.to_owned(),
            year: Some(year),
            tag: "Food 🍜".to_owned(),
            amount: Some(12.5),
            transaction_type: "Debit".to_owned(),
        }
    }

    #[test]
    fn valid_form_builds_record() {
        let result = validate_record_form(&form_data(5, "Mar", 2024));

        assert_eq!(
            result,
            Ok(NewRecord {
                date: RecordDate::new_unchecked("5 Mar 2024"),
                tag: Tag::Food,
                transaction_type: TransactionType::Debit,
                amount: 12.5,
            })
        );
    }

    #[test]
    fn day_must_be_in_month() {
        let too_small = validate_record_form(&form_data(0, "Mar", 2024)).unwrap_err();
        let too_big = validate_record_form(&form_data(30, "Feb", 2024)).unwrap_err();
        let leap_day = validate_record_form(&form_data(29, "Feb", 2023)).unwrap_err();

        assert_eq!(too_small.day.as_deref(), Some("Cannot be less than 1"));
        assert_eq!(too_big.day.as_deref(), Some("Cannot be more than 29"));
        assert_eq!(leap_day.day.as_deref(), Some("Cannot be more than 28"));
    }

    #[test]
    fn reports_every_invalid_field() {
        let data = RecordFormData {
            day: Some(1),
            month: "March".to_owned(),
            year: Some(2024),
            tag: "Rent".to_owned(),
            amount: Some(0.0),
            transaction_type: "Transfer".to_owned(),
        };

        let errors = validate_record_form(&data).unwrap_err();

        assert_eq!(
            errors.month.as_deref(),
            Some("Can only be one of the 12 options")
        );
        assert_eq!(errors.tag.as_deref(), Some("Pick a sector"));
        assert_eq!(errors.amount.as_deref(), Some("Must be greater than 0"));
        assert_eq!(
            errors.transaction_type.as_deref(),
            Some("Pick Credit or Debit")
        );
        assert_eq!(errors.day, None);
    }

    #[test]
    fn empty_fields_are_required() {
        let data: RecordFormData =
            serde_html_form::from_str("day=&month=Mar&year=2024&tag=Food+%F0%9F%8D%9C&amount=")
                .unwrap();

        let errors = validate_record_form(&data).unwrap_err();

        assert_eq!(errors.day.as_deref(), Some("Required"));
        assert_eq!(errors.amount.as_deref(), Some("Required"));
        assert_eq!(errors.transaction_type.as_deref(), Some("Required"));
        assert_eq!(errors.year, None);
        assert_eq!(errors.tag, None);
    }

    #[test]
    fn empty_fields_render_without_a_value() {
        let values = RecordFormValues {
            day: None,
            amount: None,
            ..RecordFormValues::new(date!(2024 - 03 - 05))
        };

        let markup = record_form(&values, &Default::default()).into_string();
        let html = Html::parse_fragment(&markup);

        let day = Selector::parse("input[name=day]").unwrap();
        let day = html.select(&day).next().expect("day input missing");
        assert_eq!(day.value().attr("value"), None);
    }

    #[test]
    fn defaults_to_income_credit_of_one_today() {
        let values = RecordFormValues::new(date!(2024 - 03 - 05));

        let markup = record_form(&values, &Default::default()).into_string();
        let html = Html::parse_fragment(&markup);

        let selected = |selector: &str| {
            html.select(&Selector::parse(selector).unwrap())
                .next()
                .and_then(|element| element.value().attr("value").map(str::to_owned))
        };
        assert_eq!(selected("input[name=day]"), Some("5".to_owned()));
        assert_eq!(selected("select[name=month] option[selected]"), Some("Mar".to_owned()));
        assert_eq!(selected("input[name=year]"), Some("2024".to_owned()));
        assert_eq!(
            selected("select[name=tag] option[selected]"),
            Some("Income 💰".to_owned())
        );
        assert_eq!(selected("input[name=amount]"), Some("1".to_owned()));
        assert_eq!(
            selected("input[name=type][checked]"),
            Some("Credit".to_owned())
        );
    }
}
