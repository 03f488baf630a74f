//! WFS-backed grid source. Serves the precipitation grid and, pointed at a
//! lake-specific feature type, the GLCFS model grid. Each `member` element of
//! the GetFeature response becomes one grid-cell site holding a single
//! variable.

use crate::dataset::{SiteKey, SiteRecord};
use crate::geo::BoundingBox;
use crate::sources::error::FetchError;
use crate::sources::DatasetSource;
use crate::variable::{TimeSeriesOption, Variable, VariableParameter};
use chrono::{NaiveDate, Utc};
use futures_util::future::BoxFuture;
use log::{debug, warn};
use reqwest::Client;

const SRS_NAME: &str = "EPSG:4269";

/// Grid series start before this date are not recorded upstream; the window
/// runs from here to the day of the fetch.
const GRID_START_DATE: (i32, u32, u32) = (2002, 1, 1);

pub struct WfsGridSource {
    url: String,
    variable_name: String,
    client: Client,
}

impl WfsGridSource {
    /// `variable_name` labels the single series every grid cell exposes,
    /// e.g. `Precip`.
    pub fn new(url: impl Into<String>, variable_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            variable_name: variable_name.into(),
            client: Client::new(),
        }
    }

    async fn fetch_grid(&self, bounding_box: BoundingBox) -> Result<Vec<SiteRecord>, FetchError> {
        let bbox_param = format!(
            "{},{},{},{}",
            bounding_box.south, bounding_box.west, bounding_box.north, bounding_box.east
        );
        debug!("Fetching grid from {} for bbox {}", self.url, bbox_param);

        let response = self
            .client
            .get(&self.url)
            .query(&[("srsName", SRS_NAME), ("bbox", bbox_param.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(self.url.clone(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    FetchError::HttpStatus {
                        url: self.url.clone(),
                        status,
                        source: e,
                    }
                } else {
                    FetchError::NetworkRequest(self.url.clone(), e)
                });
            }
        };
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::NetworkRequest(self.url.clone(), e))?;

        let today = Utc::now().date_naive();
        let records = parse_grid_members(&body, &self.url, &self.variable_name, today)?;
        debug!("Grid fetch from {} returned {} cells", self.url, records.len());
        Ok(records)
    }
}

impl DatasetSource for WfsGridSource {
    fn fetch(
        &self,
        bounding_box: BoundingBox,
    ) -> BoxFuture<'_, Result<Vec<SiteRecord>, FetchError>> {
        Box::pin(self.fetch_grid(bounding_box))
    }
}

/// Extracts grid-cell records from a GetFeature response. Only the cell
/// indices and coordinates are read; the document is otherwise opaque.
/// An embedded exception report counts as a failed fetch even on HTTP 200.
fn parse_grid_members(
    xml: &str,
    url: &str,
    variable_name: &str,
    today: NaiveDate,
) -> Result<Vec<SiteRecord>, FetchError> {
    if xml.contains("ExceptionReport") {
        let message = element_text(xml, "ExceptionText")
            .unwrap_or("unspecified service exception")
            .trim()
            .to_string();
        return Err(FetchError::ServiceException {
            url: url.to_string(),
            message,
        });
    }

    let (start_y, start_m, start_d) = GRID_START_DATE;
    let start_date = NaiveDate::from_ymd_opt(start_y, start_m, start_d);

    let mut records = Vec::new();
    for chunk in xml.split("member>").skip(1) {
        let (Some(x), Some(y)) = (element_text(chunk, "x"), element_text(chunk, "y")) else {
            continue;
        };
        let (Some(lon), Some(lat)) = (element_text(chunk, "X1"), element_text(chunk, "X2")) else {
            continue;
        };
        // Grid indices come back with a fractional part; truncate it.
        let (Some(x), Some(y)) = (parse_grid_index(x), parse_grid_index(y)) else {
            warn!("Skipping grid member with unparseable indices from {url}");
            continue;
        };
        let (Ok(longitude), Ok(latitude)) = (lon.trim().parse::<f64>(), lat.trim().parse::<f64>())
        else {
            warn!("Skipping grid cell {x}:{y} with unparseable coordinates from {url}");
            continue;
        };

        let key = SiteKey::GridCell { x, y };
        records.push(SiteRecord {
            key: key.clone(),
            name: None,
            latitude,
            longitude,
            variables: vec![Variable {
                id: variable_name.to_string(),
                start_date,
                end_date: Some(today),
                selected: false,
                parameter: VariableParameter {
                    name: "DatasetId".to_string(),
                    site_key: key,
                    column_name: variable_name.to_string(),
                },
                time_series_options: vec![TimeSeriesOption::raw()],
            }],
        });
    }
    Ok(records)
}

fn parse_grid_index(text: &str) -> Option<i64> {
    text.trim().split('.').next()?.parse().ok()
}

/// Text content of the first element whose local name is `local`, regardless
/// of namespace prefix.
fn element_text<'a>(xml: &'a str, local: &str) -> Option<&'a str> {
    // Both patterns are local.len() + 2 bytes, so one offset works for either.
    let prefixed = format!(":{local}>");
    let bare = format!("<{local}>");
    let start = match (xml.find(&prefixed), xml.find(&bare)) {
        (Some(p), Some(b)) => p.min(b),
        (Some(p), None) => p,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let rest = &xml[start + prefixed.len()..];
    let end = rest.find('<')?;
    Some(&rest[..end])
}
