//! Customer record at the inference boundary.
//!
//! A [`CustomerRecord`] is the typed form of one JSON request. Serde rejects
//! missing or wrong-typed fields during deserialization, and
//! [`CustomerRecord::validate`] enforces the value-level rules before the
//! record is turned into a one-row table with [`records_to_frame`].

use crate::error::{ProcessingError, Result};
use crate::schema::*;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One customer profile, field names matching the raw column headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub gender: String,
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: String,
    #[serde(rename = "Partner")]
    pub partner: String,
    #[serde(rename = "Dependents")]
    pub dependents: String,
    /// Months with the company.
    pub tenure: i64,
    #[serde(rename = "PhoneService")]
    pub phone_service: String,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: String,
    #[serde(rename = "InternetService")]
    pub internet_service: String,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: String,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: String,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: String,
    #[serde(rename = "TechSupport")]
    pub tech_support: String,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: String,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: String,
    #[serde(rename = "Contract")]
    pub contract: String,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
}

/// Flags restricted to the Yes/No vocabulary.
const YES_NO_FIELDS: [&str; 5] = [SENIOR_CITIZEN, PARTNER, DEPENDENTS, PHONE_SERVICE, PAPERLESS_BILLING];

impl CustomerRecord {
    /// Look up a categorical attribute by its column name.
    pub fn categorical(&self, column: &str) -> Option<&str> {
        let value = match column {
            GENDER => &self.gender,
            SENIOR_CITIZEN => &self.senior_citizen,
            PARTNER => &self.partner,
            DEPENDENTS => &self.dependents,
            PHONE_SERVICE => &self.phone_service,
            MULTIPLE_LINES => &self.multiple_lines,
            INTERNET_SERVICE => &self.internet_service,
            ONLINE_SECURITY => &self.online_security,
            ONLINE_BACKUP => &self.online_backup,
            DEVICE_PROTECTION => &self.device_protection,
            TECH_SUPPORT => &self.tech_support,
            STREAMING_TV => &self.streaming_tv,
            STREAMING_MOVIES => &self.streaming_movies,
            CONTRACT => &self.contract,
            PAPERLESS_BILLING => &self.paperless_billing,
            PAYMENT_METHOD => &self.payment_method,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Check value-level constraints.
    ///
    /// Tenure must be non-negative, charges finite and non-negative, every
    /// categorical field non-blank, and binary flags `Yes` or `No`.
    pub fn validate(&self) -> Result<()> {
        if self.tenure < 0 {
            return Err(invalid(TENURE, format!("must be non-negative, got {}", self.tenure)));
        }
        for (field, value) in [
            (MONTHLY_CHARGES, self.monthly_charges),
            (TOTAL_CHARGES, self.total_charges),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, format!("must be a non-negative number, got {value}")));
            }
        }

        for field in CATEGORICAL_FIELDS {
            let value = self.categorical(field).unwrap_or_default();
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty".to_string()));
            }
            if YES_NO_FIELDS.contains(&field) && value != YES && value != NO {
                return Err(invalid(field, format!("expected 'Yes' or 'No', got '{value}'")));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> ProcessingError {
    ProcessingError::InvalidRecord {
        field: field.to_string(),
        reason,
    }
}

/// Build a table with one row per record, using the raw column layout.
pub fn records_to_frame(records: &[CustomerRecord]) -> Result<DataFrame> {
    if records.is_empty() {
        return Err(ProcessingError::EmptyDataset("no records supplied".to_string()));
    }

    let mut columns: Vec<Column> = Vec::with_capacity(CATEGORICAL_FIELDS.len() + NUMERIC_FIELDS.len());

    for field in CATEGORICAL_FIELDS {
        let values: Vec<&str> = records
            .iter()
            .map(|r| r.categorical(field).unwrap_or_default())
            .collect();
        columns.push(Series::new(field.into(), values).into());
    }

    let tenure: Vec<i64> = records.iter().map(|r| r.tenure).collect();
    let monthly: Vec<f64> = records.iter().map(|r| r.monthly_charges).collect();
    let total: Vec<f64> = records.iter().map(|r| r.total_charges).collect();
    columns.push(Series::new(TENURE.into(), tenure).into());
    columns.push(Series::new(MONTHLY_CHARGES.into(), monthly).into());
    columns.push(Series::new(TOTAL_CHARGES.into(), total).into());

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::{numeric_column, string_column};

    pub(crate) fn sample_record() -> CustomerRecord {
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

    #[test]
    fn test_deserialize_uses_column_names() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["SeniorCitizen"], "No");
        assert_eq!(json["MonthlyCharges"], 100.0);
        assert_eq!(json["tenure"], 1);

        let back: CustomerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_record());
    }

    #[test]
    fn test_deserialize_rejects_missing_or_wrong_typed_fields() {
        let mut json = serde_json::to_value(sample_record()).unwrap();
        json.as_object_mut().unwrap().remove("Contract");
        assert!(serde_json::from_value::<CustomerRecord>(json).is_err());

        let mut json = serde_json::to_value(sample_record()).unwrap();
        json["tenure"] = serde_json::json!("twelve");
        assert!(serde_json::from_value::<CustomerRecord>(json).is_err());
    }

    #[test]
    fn test_validate_accepts_sample() {
        assert!(sample_record().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let mut record = sample_record();
        record.tenure = -1;
        let err = record.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RECORD");

        let mut record = sample_record();
        record.total_charges = f64::NAN;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_flag() {
        let mut record = sample_record();
        record.senior_citizen = "1".to_string();
        let err = record.validate().unwrap_err();
        assert!(err.to_string().contains("SeniorCitizen"));
    }

    #[test]
    fn test_records_to_frame() {
        let df = records_to_frame(&[sample_record()]).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 19);

        let contract = string_column(&df, CONTRACT).unwrap();
        assert_eq!(contract.get(0), Some("Month-to-month"));
        let total = numeric_column(&df, TOTAL_CHARGES).unwrap();
        assert_eq!(total.get(0), Some(100.0));
    }

    #[test]
    fn test_records_to_frame_rejects_empty() {
        assert!(records_to_frame(&[]).is_err());
    }
}
