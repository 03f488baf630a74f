//! Dataset kinds, sites, and the remote-backed collections that group a
//! fetch's results per site.

use crate::geo::LatLon;
use crate::variable::{Variable, VariableCollection};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of data source categories a session can query.
///
/// The enum order is the canonical iteration order for fetch fan-out and
/// failure reporting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DatasetKind {
    /// NWIS station observations.
    Nwis,
    /// Multi-sensor precipitation grid.
    Precip,
    /// GLCFS model grid, filtered by lake.
    Glcfs,
    /// ACIS climate records.
    Acis,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 4] = [
        DatasetKind::Nwis,
        DatasetKind::Precip,
        DatasetKind::Glcfs,
        DatasetKind::Acis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Nwis => "NWIS",
            DatasetKind::Precip => "PRECIP",
            DatasetKind::Glcfs => "GLCFS",
            DatasetKind::Acis => "ACIS",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location key of a site: a station number for observation networks, or a
/// grid cell for gridded datasets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SiteKey {
    SiteNo(String),
    GridCell { x: i64, y: i64 },
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteKey::SiteNo(site_no) => f.write_str(site_no),
            SiteKey::GridCell { x, y } => write!(f, "{x}:{y}"),
        }
    }
}

/// One raw record produced by a dataset source fetch. The core only looks at
/// the identity, coordinates, and the variables' validity windows; everything
/// else the remote service returned has already been dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub key: SiteKey,
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub variables: Vec<Variable>,
}

/// A location-keyed grouping of variables within a dataset collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub key: SiteKey,
    pub name: Option<String>,
    pub location: LatLon,
    pub variables: VariableCollection,
}

impl From<SiteRecord> for Site {
    fn from(record: SiteRecord) -> Self {
        Site {
            key: record.key,
            name: record.name,
            location: LatLon(record.latitude, record.longitude),
            variables: VariableCollection::from_variables(record.variables),
        }
    }
}

/// A named, ordered set of sites populated by a single dataset source.
///
/// A collection is only ever populated by its own fetch; a failed fetch
/// leaves it empty rather than partially populated. Grid-based kinds carry a
/// lake filter which survives resets.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetCollection {
    kind: DatasetKind,
    lake: Option<String>,
    sites: Vec<Site>,
}

impl DatasetCollection {
    pub fn new(kind: DatasetKind) -> Self {
        Self {
            kind,
            lake: None,
            sites: Vec::new(),
        }
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn lake(&self) -> Option<&str> {
        self.lake.as_deref()
    }

    /// Sets the lake filter; an empty string clears it.
    pub fn set_lake(&mut self, lake: impl Into<String>) {
        let lake = lake.into();
        self.lake = if lake.is_empty() { None } else { Some(lake) };
    }

    /// Drops every site. The lake filter is left alone so a failed fetch does
    /// not erase the user's choice.
    pub fn reset(&mut self) {
        self.sites.clear();
    }

    /// Replaces the contents with freshly fetched records.
    pub fn repopulate(&mut self, records: Vec<SiteRecord>) {
        self.sites = records.into_iter().map(Site::from).collect();
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn site(&self, key: &SiteKey) -> Option<&Site> {
        self.sites.iter().find(|s| &s.key == key)
    }

    pub fn site_mut(&mut self, key: &SiteKey) -> Option<&mut Site> {
        self.sites.iter_mut().find(|s| &s.key == key)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Whether any variable at any site is selected.
    pub fn has_selected_variables(&self) -> bool {
        self.sites.iter().any(|s| s.variables.has_selected())
    }

    /// Every selected variable, in site order then variable order.
    pub fn selected_variables(&self) -> impl Iterator<Item = &Variable> {
        self.sites.iter().flat_map(|s| s.variables.selected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::{TimeSeriesOption, VariableParameter};
    use chrono::NaiveDate;

    fn record(site_no: &str, selected: bool) -> SiteRecord {
        let key = SiteKey::SiteNo(site_no.to_string());
        SiteRecord {
            key: key.clone(),
            name: Some(format!("Site {site_no}")),
            latitude: 43.0,
            longitude: -100.0,
            variables: vec![Variable {
                id: "00060".to_string(),
                start_date: NaiveDate::from_ymd_opt(2001, 1, 1),
                end_date: NaiveDate::from_ymd_opt(2010, 1, 1),
                selected,
                parameter: VariableParameter {
                    name: "DatasetId".to_string(),
                    site_key: key,
                    column_name: "00060".to_string(),
                },
                time_series_options: vec![TimeSeriesOption::raw()],
            }],
        }
    }

    #[test]
    fn site_key_display_forms() {
        assert_eq!(SiteKey::SiteNo("04453".to_string()).to_string(), "04453");
        assert_eq!(SiteKey::GridCell { x: 2, y: 2 }.to_string(), "2:2");
    }

    #[test]
    fn repopulate_replaces_previous_contents() {
        let mut collection = DatasetCollection::new(DatasetKind::Nwis);
        collection.repopulate(vec![record("04453", false), record("12399", false)]);
        assert_eq!(collection.len(), 2);

        collection.repopulate(vec![record("99999", false)]);
        assert_eq!(collection.len(), 1);
        assert!(collection
            .site(&SiteKey::SiteNo("99999".to_string()))
            .is_some());
    }

    #[test]
    fn reset_clears_sites_but_keeps_the_lake_filter() {
        let mut collection = DatasetCollection::new(DatasetKind::Glcfs);
        collection.set_lake("Erie");
        collection.repopulate(vec![record("04453", false)]);

        collection.reset();
        assert!(collection.is_empty());
        assert_eq!(collection.lake(), Some("Erie"));
    }

    #[test]
    fn empty_lake_string_clears_the_filter() {
        let mut collection = DatasetCollection::new(DatasetKind::Glcfs);
        collection.set_lake("Erie");
        collection.set_lake("");
        assert_eq!(collection.lake(), None);
    }

    #[test]
    fn selected_variables_walks_sites_in_order() {
        let mut collection = DatasetCollection::new(DatasetKind::Nwis);
        collection.repopulate(vec![record("04453", true), record("12399", true)]);

        let sites: Vec<String> = collection
            .selected_variables()
            .map(|v| v.parameter.site_key.to_string())
            .collect();
        assert_eq!(sites, ["04453", "12399"]);
        assert!(collection.has_selected_variables());
    }

    #[test]
    fn has_selected_variables_is_false_for_unselected_contents() {
        let mut collection = DatasetCollection::new(DatasetKind::Nwis);
        collection.repopulate(vec![record("04453", false)]);
        assert!(!collection.has_selected_variables());
    }
}
