//! Static catalog entities: columns, data types, datasources, KPIs and
//! user-history definitions. These are read by the core, not owned by it —
//! the catalog loader/reloader lives outside this crate's scope.

pub mod column;
pub mod datasource;
pub mod kpi;
pub mod repository;
pub mod user_history;

pub use column::{Column, DataType};
pub use datasource::{Cardinality, DataSource, DataSourceKind};
pub use kpi::{Kpi, KpiReference, Rollup, Unit, WarehouseMetric};
pub use user_history::{ComputedColumn, ExternalTableColumn, RegistrationColumn, TotalColumn, UserHistoryDefinition};
