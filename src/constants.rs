//! Compiled-in limits and well-known column names shared across the SQL
//! builder, column sources, and the chart pipeline.

pub const UNIQUE_ID_COLUMN_NAME: &str = "unique_id";
pub const DATE_PARTITION_COLUMN_NAME: &str = "date_";
pub const COHORT_DAY_COLUMN_NAME: &str = "cohort_day";
pub const REGISTRATION_DATE_COLUMN_NAME: &str = "registration_date";
pub const EVENT_TIMESTAMP_COLUMN_NAME: &str = "event_tstamp";
pub const EVENT_SANDBOX_COLUMN_NAME: &str = "sandbox_mode";
pub const X_AXIS_COLUMN_ALIAS: &str = "x_axis";
pub const DATA_COLUMN_ALIAS: &str = "value";

pub const BIGQUERY_MAX_DISTINCT_GROUP_BY_VALUES: usize = 500;
pub const BIGQUERY_MAX_ROWS: usize = 200_000;
