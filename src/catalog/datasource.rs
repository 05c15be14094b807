use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::time::{DatetimeInterval, TimeGrain};

use super::column::Column;
use super::user_history::UserHistoryDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    Zero,
    One,
    Many,
}

/// Polymorphism over datasource kind is modeled as a tagged variant rather
/// than a trait hierarchy, each carrying the small capability set the
/// original's subclasses actually differ on (`_data_availability` and
/// `user_enrich_table_name`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataSourceKind {
    Daily,
    Event {
        realtime_schema: String,
        raw_data_availability: Option<DatetimeInterval>,
    },
    UserHistory {
        definition: UserHistoryDefinition,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub label: String,
    pub description: String,
    pub schema: String,
    pub table_name: String,
    pub columns_by_id: HashMap<String, Column>,
    pub rows_per_user: Cardinality,
    pub time_grain: TimeGrain,
    pub data_availability: Option<DatetimeInterval>,
    pub kind: DataSourceKind,
}

impl DataSource {
    pub fn daily(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        schema: impl Into<String>,
        table_name: impl Into<String>,
        columns: Vec<Column>,
        rows_per_user: Cardinality,
        data_availability: Option<DatetimeInterval>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: description.into(),
            schema: schema.into(),
            table_name: table_name.into(),
            columns_by_id: columns.into_iter().map(|c| (c.id.clone(), c)).collect(),
            rows_per_user,
            time_grain: TimeGrain::Day,
            data_availability,
            kind: DataSourceKind::Daily,
        }
    }

    pub fn event(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        schema: impl Into<String>,
        table_name: impl Into<String>,
        columns: Vec<Column>,
        data_availability: Option<DatetimeInterval>,
        raw_data_availability: Option<DatetimeInterval>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: description.into(),
            schema: schema.into(),
            table_name: table_name.into(),
            columns_by_id: columns.into_iter().map(|c| (c.id.clone(), c)).collect(),
            rows_per_user: Cardinality::Many,
            time_grain: TimeGrain::Min15,
            data_availability,
            kind: DataSourceKind::Event {
                realtime_schema: "load".to_string(),
                raw_data_availability,
            },
        }
    }

    pub fn user_history(
        columns: Vec<Column>,
        definition: UserHistoryDefinition,
        data_availability: Option<DatetimeInterval>,
    ) -> Self {
        Self {
            id: "user_history".to_string(),
            label: "User History".to_string(),
            description: String::new(),
            schema: "main".to_string(),
            table_name: "v_user_history".to_string(),
            columns_by_id: columns.into_iter().map(|c| (c.id.clone(), c)).collect(),
            rows_per_user: Cardinality::One,
            time_grain: TimeGrain::Day,
            data_availability,
            kind: DataSourceKind::UserHistory { definition },
        }
    }

    pub fn can_enrich_user_from_datasource(&self, other: &DataSource) -> bool {
        self.rows_per_user == Cardinality::Many && other.rows_per_user == Cardinality::One
    }

    pub fn user_enrich_table_name(&self) -> &str {
        match &self.kind {
            DataSourceKind::UserHistory { .. } => "v_user_history_daily",
            _ => &self.table_name,
        }
    }

    pub fn raw_data_availability(&self) -> Option<&DatetimeInterval> {
        match &self.kind {
            DataSourceKind::Event {
                raw_data_availability,
                ..
            } => raw_data_availability.as_ref(),
            _ => None,
        }
    }

    pub fn realtime_schema(&self) -> Option<&str> {
        match &self.kind {
            DataSourceKind::Event { realtime_schema, .. } => Some(realtime_schema.as_str()),
            _ => None,
        }
    }

    pub fn user_history_definition(&self) -> Option<&UserHistoryDefinition> {
        match &self.kind {
            DataSourceKind::UserHistory { definition } => Some(definition),
            _ => None,
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self.kind, DataSourceKind::Event { .. })
    }

    pub fn clamp_date_interval(&self, requested: &DatetimeInterval) -> Option<DatetimeInterval> {
        let availability = self.data_availability.as_ref()?;
        availability.clamp(requested.date_from, requested.date_to)
    }
}

impl PartialEq for DataSource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataSource {}

impl std::hash::Hash for DataSource {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A couple of concrete datasources, the way the original ships a handful
/// of ready-made subclasses (`AppsflyerDataSource`, `EventDataSource`)
/// alongside the abstract `DataSource` hierarchy. Not wired into any
/// catalog loader — callers build their own `DataSource`s from metadata;
/// these exist for tests and as a worked example of the constructors above.
pub mod examples {
    use super::{Cardinality, Column, DataSource};

    /// A daily, one-row-per-user attribution feed (`Cardinality::Zero`: a
    /// user may have zero attribution rows, unlike `user_history`'s
    /// guaranteed one).
    pub fn appsflyer(columns: Vec<Column>) -> DataSource {
        DataSource::daily("appsflyer", "Appsflyer", "", "main", "v_appsflyer_activity", columns, Cardinality::Zero, None)
    }

    /// A 15-minute-grain event stream, e.g. a `login` or `purchase` event
    /// table keyed by its own id rather than the generic `events_*` naming
    /// the original derives from an event schema.
    pub fn events(id: impl Into<String>, table_name: impl Into<String>, columns: Vec<Column>) -> DataSource {
        DataSource::event(id, "Events", "", "raw", table_name, columns, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::column::DataType;

    fn col(id: &str) -> Column {
        Column::new(id, DataType::Number)
    }

    #[test]
    fn enrichment_requires_many_to_one() {
        let many = DataSource::event("events", "Events", "", "raw", "t", vec![col("a")], None, None);
        let one = DataSource::daily("profile", "Profile", "", "main", "t", vec![col("a")], Cardinality::One, None);
        assert!(many.can_enrich_user_from_datasource(&one));
        assert!(!one.can_enrich_user_from_datasource(&many));
    }

    #[test]
    fn user_history_overrides_enrich_table_name() {
        let ds = DataSource::user_history(vec![], UserHistoryDefinition::default(), None);
        assert_eq!(ds.user_enrich_table_name(), "v_user_history_daily");
    }

    #[test]
    fn clamp_without_availability_yields_none() {
        let ds = DataSource::daily("d", "D", "", "main", "t", vec![], Cardinality::One, None);
        let interval = DatetimeInterval::new(
            chrono::Utc::now(),
            chrono::Utc::now(),
        );
        assert!(ds.clamp_date_interval(&interval).is_none());
    }

    #[test]
    fn appsflyer_example_is_daily_with_zero_cardinality() {
        let ds = examples::appsflyer(vec![col("install_time")]);
        assert_eq!(ds.rows_per_user, Cardinality::Zero);
        assert!(matches!(ds.kind, DataSourceKind::Daily));
    }

    #[test]
    fn events_example_is_a_15_minute_grain_event_source() {
        let ds = examples::events("events_login", "login", vec![col("user_id")]);
        assert!(ds.is_event());
        assert_eq!(ds.time_grain, TimeGrain::Min15);
    }
}
