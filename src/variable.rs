//! Selectable time-series variables and the ordered collections that hold
//! them. Insertion order is preserved so that URL emission stays
//! deterministic across runs.

use crate::dataset::SiteKey;
use crate::date_range::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Statistic applied when requesting a time series, e.g. `raw`, `Min` or
/// `Max`, with an optional time span the statistic is computed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesOption {
    pub statistic: String,
    pub time_span: Option<String>,
}

impl TimeSeriesOption {
    pub fn raw() -> Self {
        Self {
            statistic: "raw".to_string(),
            time_span: None,
        }
    }
}

/// The fields needed to build one query fragment for a variable: the query
/// parameter name, the site (or grid cell) the series belongs to, and the
/// column name the export service labels the series with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableParameter {
    pub name: String,
    pub site_key: SiteKey,
    pub column_name: String,
}

/// One queryable time series: a site channel or a grid cell series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Unique within its owning collection.
    pub id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub selected: bool,
    pub parameter: VariableParameter,
    pub time_series_options: Vec<TimeSeriesOption>,
}

impl Variable {
    /// The validity window of this variable, when both dates are present and
    /// ordered. Variables without a window are excluded from every overlap
    /// computation.
    pub fn validity(&self) -> Option<DateRange> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start <= end => Some(DateRange::new(start, end)),
            _ => None,
        }
    }
}

/// An ordered, id-unique set of [`Variable`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableCollection {
    variables: Vec<Variable>,
}

impl VariableCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from `variables`, keeping the first occurrence of
    /// each id.
    pub fn from_variables(variables: Vec<Variable>) -> Self {
        let mut collection = Self::new();
        for variable in variables {
            collection.insert(variable);
        }
        collection
    }

    /// Appends `variable` unless its id is already present. Returns whether
    /// the variable was inserted.
    pub fn insert(&mut self, variable: Variable) -> bool {
        if self.variables.iter().any(|v| v.id == variable.id) {
            return false;
        }
        self.variables.push(variable);
        true
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn clear(&mut self) {
        self.variables.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.id == id)
    }

    /// Whether any member is selected.
    pub fn has_selected(&self) -> bool {
        self.variables.iter().any(|v| v.selected)
    }

    /// The selected members in their original order.
    pub fn selected(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.selected)
    }

    /// The date range over which every dated member has data.
    pub fn overlap_range(&self) -> Option<DateRange> {
        DateRange::intersect_all(self.variables.iter().filter_map(Variable::validity))
    }

    /// The date range over which every selected, dated member has data.
    pub fn selected_overlap_range(&self) -> Option<DateRange> {
        DateRange::intersect_all(self.selected().filter_map(Variable::validity))
    }
}
