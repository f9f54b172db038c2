//! Column names of the customer churn dataset.
//!
//! Names match the header of the raw telco export and the JSON field names the
//! serving layer accepts, so a record and a table row share one vocabulary.

pub const CUSTOMER_ID: &str = "customerID";
pub const GENDER: &str = "gender";
pub const SENIOR_CITIZEN: &str = "SeniorCitizen";
pub const PARTNER: &str = "Partner";
pub const DEPENDENTS: &str = "Dependents";
pub const TENURE: &str = "tenure";
pub const PHONE_SERVICE: &str = "PhoneService";
pub const MULTIPLE_LINES: &str = "MultipleLines";
pub const INTERNET_SERVICE: &str = "InternetService";
pub const ONLINE_SECURITY: &str = "OnlineSecurity";
pub const ONLINE_BACKUP: &str = "OnlineBackup";
pub const DEVICE_PROTECTION: &str = "DeviceProtection";
pub const TECH_SUPPORT: &str = "TechSupport";
pub const STREAMING_TV: &str = "StreamingTV";
pub const STREAMING_MOVIES: &str = "StreamingMovies";
pub const CONTRACT: &str = "Contract";
pub const PAPERLESS_BILLING: &str = "PaperlessBilling";
pub const PAYMENT_METHOD: &str = "PaymentMethod";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const TOTAL_CHARGES: &str = "TotalCharges";

/// Binary target column ("Yes" when the customer left).
pub const CHURN: &str = "Churn";

// Derived by the feature engineer
pub const FAMILY_SIZE: &str = "FamilySize";
pub const AVG_CHARGES_PER_MONTH: &str = "AvgChargesPerMonth";
pub const TENURE_GROUP: &str = "TenureGroup";

/// String-valued attributes every record must carry.
pub const CATEGORICAL_FIELDS: [&str; 16] = [
    GENDER,
    SENIOR_CITIZEN,
    PARTNER,
    DEPENDENTS,
    PHONE_SERVICE,
    MULTIPLE_LINES,
    INTERNET_SERVICE,
    ONLINE_SECURITY,
    ONLINE_BACKUP,
    DEVICE_PROTECTION,
    TECH_SUPPORT,
    STREAMING_TV,
    STREAMING_MOVIES,
    CONTRACT,
    PAPERLESS_BILLING,
    PAYMENT_METHOD,
];

/// Numeric attributes every record must carry.
pub const NUMERIC_FIELDS: [&str; 3] = [TENURE, MONTHLY_CHARGES, TOTAL_CHARGES];

/// Value used by yes/no flags for the positive case.
pub const YES: &str = "Yes";
/// Value used by yes/no flags for the negative case.
pub const NO: &str = "No";
