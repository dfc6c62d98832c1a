use std::cmp::Ordering;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use shared_models::auth::UserType;

/// A named set of documents keyed by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Doctors,
    Patients,
    Management,
    Appointments,
    /// `patients/{patient_id}/bookedAppointments`
    BookedAppointments { patient_id: String },
    Classifications,
    BookingIncidents,
}

impl Collection {
    pub fn for_profile(user_type: UserType) -> Self {
        match user_type {
            UserType::Doctor => Collection::Doctors,
            UserType::Patient => Collection::Patients,
            UserType::Management => Collection::Management,
        }
    }

    /// Backing PostgREST table.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Doctors => "doctors",
            Collection::Patients => "patients",
            Collection::Management => "management",
            Collection::Appointments => "appointments",
            Collection::BookedAppointments { .. } => "booked_appointments",
            Collection::Classifications => "classifications",
            Collection::BookingIncidents => "booking_incidents",
        }
    }

    /// Parent column and value for nested collections.
    pub fn scope(&self) -> Option<(&'static str, &str)> {
        match self {
            Collection::BookedAppointments { patient_id } => Some(("patient_id", patient_id)),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::BookedAppointments { patient_id } => {
                write!(f, "patients/{}/bookedAppointments", patient_id)
            }
            other => write!(f, "{}", other.table()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Equality filter with optional ordering and limit.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub conditions: Vec<(String, Value)>,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    /// Applies ordering and limit to documents that already match.
    pub fn arrange(&self, mut documents: Vec<Value>) -> Vec<Value> {
        if let Some((field, direction)) = &self.order_by {
            documents.sort_by(|a, b| {
                let ordering = compare_values(a.get(field), b.get(field));
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            documents.truncate(limit);
        }
        documents
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Result of a single-field conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    Applied,
    /// The field held `current` instead of the expected value.
    Mismatch { current: Value },
    /// The document or the field path does not exist.
    Missing,
}

/// Durable document storage.
///
/// Writes are atomic per document. Nothing here spans documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<Value>>;

    /// Creates or replaces a whole document.
    async fn set(&self, collection: &Collection, id: &str, document: Value) -> Result<()>;

    /// Merges top-level fields into an existing document.
    async fn update(&self, collection: &Collection, id: &str, fields: Value) -> Result<()>;

    async fn query(&self, collection: &Collection, filter: &Filter) -> Result<Vec<Value>>;

    /// Writes `new` at `path` only if it currently equals `expected`, in one step.
    async fn compare_and_set(
        &self,
        collection: &Collection,
        id: &str,
        path: &[&str],
        expected: &Value,
        new: Value,
    ) -> Result<CasOutcome>;
}
