//! Synthetic customers for unit tests.

use churn_processing::{CustomerRecord, records_to_frame};
use polars::prelude::DataFrame;

const CONTRACTS: [&str; 3] = ["Month-to-month", "One year", "Two year"];
const INTERNET: [&str; 3] = ["DSL", "Fiber optic", "No"];
const PAYMENT: [&str; 4] = [
    "Electronic check",
    "Mailed check",
    "Bank transfer (automatic)",
    "Credit card (automatic)",
];

fn yes_no(flag: bool) -> String {
    let value = if flag { "Yes" } else { "No" };
    value.to_string()
}

/// The brand-new month-to-month customer used across tests.
pub(crate) fn new_customer() -> CustomerRecord {
    CustomerRecord {
        gender: "Female".to_string(),
        senior_citizen: "No".to_string(),
        partner: "No".to_string(),
        dependents: "No".to_string(),
        tenure: 1,
        phone_service: "No".to_string(),
        multiple_lines: "No".to_string(),
        internet_service: "No".to_string(),
        online_security: "No".to_string(),
        online_backup: "No".to_string(),
        device_protection: "No".to_string(),
        tech_support: "No".to_string(),
        streaming_tv: "No".to_string(),
        streaming_movies: "No".to_string(),
        contract: "Month-to-month".to_string(),
        paperless_billing: "No".to_string(),
        payment_method: "Electronic check".to_string(),
        monthly_charges: 100.0,
        total_charges: 100.0,
    }
}

/// Customer `i` of a deterministic population.
pub(crate) fn customer(i: usize) -> CustomerRecord {
    let tenure = ((i * 7) % 72) as i64;
    let monthly = 20.0 + ((i * 13) % 90) as f64;
    CustomerRecord {
        gender: if i % 2 == 0 { "Male" } else { "Female" }.to_string(),
        senior_citizen: yes_no(i % 7 == 0),
        partner: yes_no(i % 2 == 1),
        dependents: yes_no(i % 5 == 0),
        tenure,
        phone_service: yes_no(i % 4 != 0),
        multiple_lines: "No".to_string(),
        internet_service: INTERNET[(i / 3) % 3].to_string(),
        online_security: "No".to_string(),
        online_backup: "No".to_string(),
        device_protection: "No".to_string(),
        tech_support: "No".to_string(),
        streaming_tv: "No".to_string(),
        streaming_movies: "No".to_string(),
        contract: CONTRACTS[i % 3].to_string(),
        paperless_billing: yes_no(i % 3 == 0),
        payment_method: PAYMENT[i % 4].to_string(),
        monthly_charges: monthly,
        total_charges: monthly * tenure as f64,
    }
}

/// Short-tenure month-to-month customers churn.
pub(crate) fn churned(record: &CustomerRecord) -> bool {
    record.contract == "Month-to-month" && record.tenure < 24
}

/// `n` customers as a raw table plus 0/1 labels.
pub(crate) fn population(n: usize) -> (DataFrame, Vec<u8>) {
    let records: Vec<CustomerRecord> = (0..n).map(customer).collect();
    let labels = records.iter().map(|r| u8::from(churned(r))).collect();
    let df = records_to_frame(&records).unwrap();
    (df, labels)
}
