//! NWIS site-service source. Queries the series catalog for sites inside the
//! bounding box and groups the catalog rows into one record per site, one
//! variable per parameter/statistic row.

use crate::dataset::{SiteKey, SiteRecord};
use crate::geo::BoundingBox;
use crate::sources::error::FetchError;
use crate::sources::DatasetSource;
use crate::variable::{TimeSeriesOption, Variable, VariableParameter};
use chrono::NaiveDate;
use futures_util::future::BoxFuture;
use log::{debug, warn};
use reqwest::Client;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct NwisSource {
    url: String,
    client: Client,
}

impl NwisSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }

    async fn fetch_sites(&self, bounding_box: BoundingBox) -> Result<Vec<SiteRecord>, FetchError> {
        // The site service rejects coordinates with more than seven decimal
        // places.
        let bbox_param = format!(
            "{:.6},{:.6},{:.6},{:.6}",
            bounding_box.west, bounding_box.south, bounding_box.east, bounding_box.north
        );
        debug!("Fetching NWIS sites from {} for bBox {}", self.url, bbox_param);

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("format", "rdb"),
                ("seriesCatalogOutput", "true"),
                ("outputDataTypeCd", "iv"),
                ("bBox", bbox_param.as_str()),
            ])
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

        let records = parse_rdb(&body, &self.url)?;
        debug!("NWIS fetch returned {} sites", records.len());
        Ok(records)
    }
}

impl DatasetSource for NwisSource {
    fn fetch(
        &self,
        bounding_box: BoundingBox,
    ) -> BoxFuture<'_, Result<Vec<SiteRecord>, FetchError>> {
        Box::pin(self.fetch_sites(bounding_box))
    }
}

/// Parses an RDB (tab-delimited) series catalog into site records, grouping
/// rows by site number in order of first appearance.
fn parse_rdb(body: &str, url: &str) -> Result<Vec<SiteRecord>, FetchError> {
    let mut lines = body.lines().filter(|line| !line.starts_with('#'));
    let header = lines.next().ok_or_else(|| FetchError::MalformedResponse {
        url: url.to_string(),
        message: "empty RDB response".to_string(),
    })?;
    let columns: Vec<&str> = header.split('\t').collect();
    let index_of = |name: &str| columns.iter().position(|c| *c == name);

    let (Some(site_no_idx), Some(lat_idx), Some(lon_idx)) = (
        index_of("site_no"),
        index_of("dec_lat_va"),
        index_of("dec_long_va"),
    ) else {
        return Err(FetchError::MalformedResponse {
            url: url.to_string(),
            message: "RDB header is missing site or coordinate columns".to_string(),
        });
    };
    let name_idx = index_of("station_nm");
    let parm_idx = index_of("parm_cd");
    let stat_idx = index_of("stat_cd");
    let begin_idx = index_of("begin_date");
    let end_idx = index_of("end_date");

    // The line after the header is the RDB column-format line.
    let mut records: Vec<SiteRecord> = Vec::new();
    for line in lines.skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |idx: Option<usize>| idx.and_then(|i| fields.get(i)).copied().unwrap_or("");

        let site_no = field(Some(site_no_idx));
        if site_no.is_empty() {
            continue;
        }
        let (Ok(latitude), Ok(longitude)) = (
            field(Some(lat_idx)).parse::<f64>(),
            field(Some(lon_idx)).parse::<f64>(),
        ) else {
            warn!("Skipping NWIS site {site_no} with unparseable coordinates");
            continue;
        };

        let parm_cd = field(parm_idx);
        if parm_cd.is_empty() {
            continue;
        }
        let stat_cd = field(stat_idx);
        let id = if stat_cd.is_empty() {
            parm_cd.to_string()
        } else {
            format!("{parm_cd}:{stat_cd}")
        };

        let key = SiteKey::SiteNo(site_no.to_string());
        let variable = Variable {
            id,
            start_date: parse_date(field(begin_idx)),
            end_date: parse_date(field(end_idx)),
            selected: false,
            parameter: VariableParameter {
                name: "DatasetId".to_string(),
                site_key: key.clone(),
                column_name: parm_cd.to_string(),
            },
            time_series_options: vec![TimeSeriesOption::raw()],
        };

        match records.iter_mut().find(|r| r.key == key) {
            Some(record) => record.variables.push(variable),
            None => {
                let name = field(name_idx);
                records.push(SiteRecord {
                    key,
                    name: (!name.is_empty()).then(|| name.to_string()),
                    latitude,
                    longitude,
                    variables: vec![variable],
                });
            }
        }
    }
    Ok(records)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
# US Geological Survey
# retrieved: 2016-04-01
agency_cd\tsite_no\tstation_nm\tdec_lat_va\tdec_long_va\tparm_cd\tstat_cd\tbegin_date\tend_date
5s\t15s\t50s\t16s\t16s\t5s\t5s\t10d\t10d
USGS\t04453\tSOME RIVER\t43.01\t-100.02\t00060\t00003\t2001-01-01\t2010-01-01
USGS\t04453\tSOME RIVER\t43.01\t-100.02\t00010\t00003\t2003-05-01\t2009-01-01
USGS\t12399\tOTHER CREEK\t43.05\t-100.06\t00060\t00003\t1998-01-01\t2016-01-01
";

    #[test]
    fn groups_catalog_rows_by_site() {
        let records = parse_rdb(CATALOG, "http://nwis").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, SiteKey::SiteNo("04453".to_string()));
        assert_eq!(records[0].name.as_deref(), Some("SOME RIVER"));
        assert_eq!(records[0].variables.len(), 2);
        assert_eq!(records[1].key, SiteKey::SiteNo("12399".to_string()));
        assert_eq!(records[1].variables.len(), 1);
    }

    #[test]
    fn variables_carry_the_catalog_validity_window() {
        let records = parse_rdb(CATALOG, "http://nwis").unwrap();
        let variable = &records[0].variables[0];

        assert_eq!(variable.id, "00060:00003");
        assert_eq!(variable.start_date, NaiveDate::from_ymd_opt(2001, 1, 1));
        assert_eq!(variable.end_date, NaiveDate::from_ymd_opt(2010, 1, 1));
        assert_eq!(variable.parameter.column_name, "00060");
        assert_eq!(variable.parameter.site_key.to_string(), "04453");
    }

    #[test]
    fn rows_with_bad_coordinates_are_skipped() {
        let body = "\
site_no\tdec_lat_va\tdec_long_va\tparm_cd\tbegin_date\tend_date
15s\t16s\t16s\t5s\t10d\t10d
04453\tnot-a-number\t-100.02\t00060\t2001-01-01\t2010-01-01
";
        let records = parse_rdb(body, "http://nwis").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn empty_body_is_malformed() {
        assert!(matches!(
            parse_rdb("", "http://nwis"),
            Err(FetchError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn missing_required_columns_is_malformed() {
        let body = "agency_cd\tstation_nm\n5s\t50s\n";
        assert!(matches!(
            parse_rdb(body, "http://nwis"),
            Err(FetchError::MalformedResponse { .. })
        ));
    }
}
