//! ACIS station-metadata source. Posts a StnMeta query for the bounding box
//! and turns each station into a record with one variable per requested
//! climate element, windowed by the element's valid date range.

use crate::dataset::{SiteKey, SiteRecord};
use crate::geo::BoundingBox;
use crate::sources::error::FetchError;
use crate::sources::DatasetSource;
use crate::variable::{TimeSeriesOption, Variable, VariableParameter};
use chrono::NaiveDate;
use futures_util::future::BoxFuture;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct AcisSource {
    url: String,
    elements: Vec<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct StnMetaResponse {
    #[serde(default)]
    meta: Vec<StnMeta>,
}

#[derive(Debug, Deserialize)]
struct StnMeta {
    name: Option<String>,
    #[serde(default)]
    sids: Vec<String>,
    /// `[longitude, latitude]`.
    ll: Option<Vec<f64>>,
    /// One `[start, end]` pair per requested element; empty when the station
    /// has no data for that element.
    #[serde(default)]
    valid_daterange: Vec<Vec<String>>,
}

impl AcisSource {
    /// `elements` are the ACIS element codes to request, e.g.
    /// `["maxt", "mint", "pcpn"]`.
    pub fn new(url: impl Into<String>, elements: Vec<String>) -> Self {
        Self {
            url: url.into(),
            elements,
            client: Client::new(),
        }
    }

    async fn fetch_stations(
        &self,
        bounding_box: BoundingBox,
    ) -> Result<Vec<SiteRecord>, FetchError> {
        let body = json!({
            "bbox": format!(
                "{},{},{},{}",
                bounding_box.west, bounding_box.south, bounding_box.east, bounding_box.north
            ),
            "elems": self.elements.join(","),
            "meta": "name,ll,sids,valid_daterange",
        });
        debug!("Fetching ACIS stations from {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&body)
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
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::NetworkRequest(self.url.clone(), e))?;

        let records = parse_stn_meta(&text, &self.elements)?;
        debug!("ACIS fetch returned {} stations", records.len());
        Ok(records)
    }
}

impl DatasetSource for AcisSource {
    fn fetch(
        &self,
        bounding_box: BoundingBox,
    ) -> BoxFuture<'_, Result<Vec<SiteRecord>, FetchError>> {
        Box::pin(self.fetch_stations(bounding_box))
    }
}

fn parse_stn_meta(body: &str, elements: &[String]) -> Result<Vec<SiteRecord>, FetchError> {
    let response: StnMetaResponse = serde_json::from_str(body)?;

    let mut records = Vec::new();
    for station in response.meta {
        // The primary station id is the first token of the first sid.
        let Some(site_no) = station
            .sids
            .first()
            .and_then(|sid| sid.split_whitespace().next())
        else {
            warn!("Skipping ACIS station without a station id");
            continue;
        };
        let Some(ll) = station.ll.as_ref().filter(|ll| ll.len() == 2) else {
            warn!("Skipping ACIS station {site_no} without coordinates");
            continue;
        };

        let key = SiteKey::SiteNo(site_no.to_string());
        let variables = elements
            .iter()
            .enumerate()
            .filter_map(|(i, element)| {
                let range = station.valid_daterange.get(i)?;
                let start = parse_date(range.first()?)?;
                let end = parse_date(range.get(1)?)?;
                Some(Variable {
                    id: element.clone(),
                    start_date: Some(start),
                    end_date: Some(end),
                    selected: false,
                    parameter: VariableParameter {
                        name: "DatasetId".to_string(),
                        site_key: key.clone(),
                        column_name: element.clone(),
                    },
                    time_series_options: vec![TimeSeriesOption::raw()],
                })
            })
            .collect::<Vec<_>>();
        if variables.is_empty() {
            continue;
        }

        records.push(SiteRecord {
            key,
            name: station.name,
            latitude: ll[1],
            longitude: ll[0],
            variables,
        });
    }
    Ok(records)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}
