//! Stateless synthesis of export-service request URLs from the selected
//! variables, the output options, and the effective date range.
//!
//! A single URL is produced while it fits the configured maximum length.
//! Past that limit the selected variables are partitioned by site, one URL
//! per distinct site in order of first appearance, so that exports stay
//! reproducible.

use crate::dataset::SiteKey;
use crate::output::OutputOptions;
use crate::variable::Variable;
use bon::bon;
use thiserror::Error;
use url::form_urlencoded;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no variables are selected")]
    EmptySelection,

    #[error("the effective date range is missing or starts after it ends")]
    InvalidDateRange,
}

/// The synthesized request URL(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryUrls {
    /// Every selected variable fit into one URL.
    Single(String),
    /// The single-URL candidate exceeded the maximum length; one URL per
    /// distinct site, in order of first appearance.
    PerSite(Vec<String>),
}

impl QueryUrls {
    /// Whether the selection had to be split into per-site URLs.
    pub fn is_split(&self) -> bool {
        matches!(self, QueryUrls::PerSite(_))
    }

    pub fn urls(&self) -> Vec<&str> {
        match self {
            QueryUrls::Single(url) => vec![url.as_str()],
            QueryUrls::PerSite(urls) => urls.iter().map(String::as_str).collect(),
        }
    }
}

/// Builds export-service URLs against a fixed base endpoint and maximum URL
/// length. Pure: equal inputs always produce equal output and the same split
/// decision.
#[derive(Debug, Clone)]
pub struct QueryUrlBuilder {
    base_url: String,
    max_url_length: usize,
}

#[bon]
impl QueryUrlBuilder {
    pub fn new(base_url: impl Into<String>, max_url_length: usize) -> Self {
        Self {
            base_url: base_url.into(),
            max_url_length,
        }
    }

    /// Synthesizes the request URL(s) for the selected members of
    /// `variables`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptySelection`] when no variable is selected,
    /// and [`QueryError::InvalidDateRange`] when `options.date_range` is
    /// unset or inverted.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use enddat::{
    ///     DateRange, OutputOptions, QueryUrlBuilder, SiteKey, TimeSeriesOption, Variable,
    ///     VariableParameter,
    /// };
    ///
    /// let variable = Variable {
    ///     id: "00060".to_string(),
    ///     start_date: NaiveDate::from_ymd_opt(2001, 1, 1),
    ///     end_date: NaiveDate::from_ymd_opt(2010, 1, 1),
    ///     selected: true,
    ///     parameter: VariableParameter {
    ///         name: "DatasetId".to_string(),
    ///         site_key: SiteKey::SiteNo("04453".to_string()),
    ///         column_name: "00060".to_string(),
    ///     },
    ///     time_series_options: vec![TimeSeriesOption::raw()],
    /// };
    /// let options = OutputOptions {
    ///     date_range: Some(DateRange::new(
    ///         NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
    ///         NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
    ///     )),
    ///     ..OutputOptions::process_defaults()
    /// };
    ///
    /// let builder = QueryUrlBuilder::new("https://example.org/service/execute", 2000);
    /// let urls = builder
    ///     .synthesize()
    ///     .variables(&[variable])
    ///     .options(&options)
    ///     .call()?;
    /// assert!(!urls.is_split());
    /// assert!(urls.urls()[0].contains("beginPosition=2001-01-01"));
    /// # Ok::<(), enddat::QueryError>(())
    /// ```
    #[builder]
    pub fn synthesize(
        &self,
        variables: &[Variable],
        options: &OutputOptions,
        lake: Option<&str>,
    ) -> Result<QueryUrls, QueryError> {
        let selected: Vec<&Variable> = variables.iter().filter(|v| v.selected).collect();
        if selected.is_empty() {
            return Err(QueryError::EmptySelection);
        }
        let range = options.date_range.ok_or(QueryError::InvalidDateRange)?;
        if range.start > range.end {
            return Err(QueryError::InvalidDateRange);
        }

        let mut shared: Vec<(String, String)> = vec![
            ("style".to_string(), options.file_format.clone()),
            ("DateFormat".to_string(), options.date_format.clone()),
            ("TZ".to_string(), options.time_zone.clone()),
            ("timeInt".to_string(), options.time_gap_interval.clone()),
            ("fill".to_string(), options.missing_value.clone()),
            (
                "beginPosition".to_string(),
                range.start.format(DATE_FORMAT).to_string(),
            ),
            (
                "endPosition".to_string(),
                range.end.format(DATE_FORMAT).to_string(),
            ),
        ];
        if let Some(lake) = lake.filter(|l| !l.is_empty()) {
            shared.push(("Lake".to_string(), lake.to_lowercase()));
        }

        let candidate = self.assemble(&shared, &selected);
        if candidate.len() <= self.max_url_length {
            return Ok(QueryUrls::Single(candidate));
        }

        let urls = self
            .partition_by_site(&selected)
            .into_iter()
            .map(|group| self.assemble(&shared, &group))
            .collect();
        Ok(QueryUrls::PerSite(urls))
    }

    /// Groups the selection by site key, in order of first appearance.
    fn partition_by_site<'a>(&self, selected: &[&'a Variable]) -> Vec<Vec<&'a Variable>> {
        let mut groups: Vec<(&SiteKey, Vec<&'a Variable>)> = Vec::new();
        for variable in selected {
            let key = &variable.parameter.site_key;
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push(variable),
                None => groups.push((key, vec![variable])),
            }
        }
        groups.into_iter().map(|(_, group)| group).collect()
    }

    fn assemble(&self, shared: &[(String, String)], variables: &[&Variable]) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in shared {
            serializer.append_pair(name, value);
        }
        for variable in variables {
            for value in fragment_values(variable) {
                serializer.append_pair(&variable.parameter.name, &value);
            }
        }
        format!("{}?{}", self.base_url, serializer.finish())
    }
}

/// The query fragment value(s) for one variable, one per time-series option:
/// `<siteKey>[:statistic[:timeSpan]]!<columnName>`. The `raw` statistic emits
/// no statistic segment. A variable without options contributes one bare
/// fragment.
fn fragment_values(variable: &Variable) -> Vec<String> {
    let site_key = variable.parameter.site_key.to_string();
    let column = &variable.parameter.column_name;
    if variable.time_series_options.is_empty() {
        return vec![format!("{site_key}!{column}")];
    }
    variable
        .time_series_options
        .iter()
        .map(|option| {
            let mut value = site_key.clone();
            if !option.statistic.is_empty() && option.statistic != "raw" {
                value.push(':');
                value.push_str(&option.statistic);
                if let Some(span) = &option.time_span {
                    value.push(':');
                    value.push_str(span);
                }
            }
            value.push('!');
            value.push_str(column);
            value
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SiteKey;
    use crate::date_range::DateRange;
    use crate::variable::{TimeSeriesOption, VariableParameter};
    use chrono::NaiveDate;

    const BASE_URL: &str = "http://fakeservice/enddat/service/execute";
    const MAX_URL_LENGTH: usize = 215;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn options() -> OutputOptions {
        OutputOptions {
            file_format: "tab".to_string(),
            date_format: "Excel".to_string(),
            time_zone: "0_GMT".to_string(),
            time_gap_interval: "6".to_string(),
            missing_value: "NaN".to_string(),
            date_range: Some(DateRange::new(date("2001-04-05"), date("2006-06-30"))),
        }
    }

    fn grid_variable(cell: i64, column: &str, option: TimeSeriesOption) -> Variable {
        Variable {
            id: format!("{cell}:{cell}:{column}"),
            start_date: Some(date("2002-01-01")),
            end_date: Some(date("2016-01-01")),
            selected: true,
            parameter: VariableParameter {
                name: "DatasetId".to_string(),
                site_key: SiteKey::GridCell { x: cell, y: cell },
                column_name: column.to_string(),
            },
            time_series_options: vec![option],
        }
    }

    fn short_selection() -> Vec<Variable> {
        vec![
            grid_variable(2, "Var1", TimeSeriesOption::raw()),
            grid_variable(
                3,
                "Var1",
                TimeSeriesOption {
                    statistic: "Min".to_string(),
                    time_span: Some("2".to_string()),
                },
            ),
        ]
    }

    fn long_selection() -> Vec<Variable> {
        let mut variables = short_selection();
        variables.push(grid_variable(4, "Var3", TimeSeriesOption::raw()));
        variables.push(grid_variable(5, "Var4", TimeSeriesOption::raw()));
        variables
    }

    fn decoded(url: &str) -> String {
        url.replace("%3A", ":").replace("%21", "!")
    }

    #[test]
    fn short_selection_produces_a_single_url_with_every_fragment() {
        let builder = QueryUrlBuilder::new(BASE_URL, MAX_URL_LENGTH);
        let result = builder
            .synthesize()
            .variables(&short_selection())
            .options(&options())
            .call()
            .unwrap();

        assert!(!result.is_split());
        let url = decoded(result.urls()[0]);
        assert!(url.len() <= MAX_URL_LENGTH);
        assert!(url.starts_with(BASE_URL));
        assert!(url.contains("style=tab"));
        assert!(url.contains("DateFormat=Excel"));
        assert!(url.contains("TZ=0_GMT"));
        assert!(url.contains("timeInt=6"));
        assert!(url.contains("fill=NaN"));
        assert!(url.contains("beginPosition=2001-04-05"));
        assert!(url.contains("endPosition=2006-06-30"));
        assert!(url.contains("DatasetId=2:2!Var1"));
        assert!(url.contains("DatasetId=3:3:Min:2!Var1"));
    }

    #[test]
    fn long_selection_is_partitioned_into_one_url_per_site() {
        let builder = QueryUrlBuilder::new(BASE_URL, MAX_URL_LENGTH);
        let result = builder
            .synthesize()
            .variables(&long_selection())
            .options(&options())
            .call()
            .unwrap();

        assert!(result.is_split());
        let urls: Vec<String> = result.urls().iter().map(|u| decoded(u)).collect();
        assert_eq!(urls.len(), 4);

        assert!(urls[0].contains("DatasetId=2:2!Var1"));
        assert!(!urls[0].contains("DatasetId=3:3:Min:2!Var1"));
        assert!(!urls[0].contains("DatasetId=4:4!Var3"));

        assert!(!urls[1].contains("DatasetId=2:2!Var1"));
        assert!(urls[1].contains("DatasetId=3:3:Min:2!Var1"));
        assert!(!urls[1].contains("DatasetId=4:4!Var3"));

        assert!(!urls[2].contains("DatasetId=2:2!Var1"));
        assert!(!urls[2].contains("DatasetId=3:3:Min:2!Var1"));
        assert!(urls[2].contains("DatasetId=4:4!Var3"));

        assert!(urls[3].contains("DatasetId=5:5!Var4"));

        // Shared parameters repeat on every per-site URL.
        for url in &urls {
            assert!(url.contains("style=tab"));
            assert!(url.contains("beginPosition=2001-04-05"));
        }
    }

    #[test]
    fn variables_at_the_same_site_stay_on_one_url_after_a_split() {
        let mut variables = long_selection();
        variables.push(grid_variable(
            2,
            "Var9",
            TimeSeriesOption {
                statistic: "Max".to_string(),
                time_span: None,
            },
        ));
        let builder = QueryUrlBuilder::new(BASE_URL, MAX_URL_LENGTH);
        let result = builder
            .synthesize()
            .variables(&variables)
            .options(&options())
            .call()
            .unwrap();

        // Still four sites: 2:2 appears twice but groups into one URL.
        let urls: Vec<String> = result.urls().iter().map(|u| decoded(u)).collect();
        assert_eq!(urls.len(), 4);
        assert!(urls[0].contains("DatasetId=2:2!Var1"));
        assert!(urls[0].contains("DatasetId=2:2:Max!Var9"));
    }

    #[test]
    fn lake_qualifier_is_lowercased_and_omitted_when_empty() {
        let builder = QueryUrlBuilder::new(BASE_URL, 10_000);
        let with_lake = builder
            .synthesize()
            .variables(&short_selection())
            .options(&options())
            .lake("Erie")
            .call()
            .unwrap();
        assert!(with_lake.urls()[0].contains("Lake=erie"));

        let without_lake = builder
            .synthesize()
            .variables(&short_selection())
            .options(&options())
            .lake("")
            .call()
            .unwrap();
        assert!(!without_lake.urls()[0].contains("Lake="));
    }

    #[test]
    fn unselected_variables_are_ignored() {
        let mut variables = long_selection();
        for variable in variables.iter_mut().skip(2) {
            variable.selected = false;
        }
        let builder = QueryUrlBuilder::new(BASE_URL, MAX_URL_LENGTH);
        let result = builder
            .synthesize()
            .variables(&variables)
            .options(&options())
            .call()
            .unwrap();

        // Deselecting shrinks the URL back under the limit.
        assert!(!result.is_split());
        assert!(!decoded(result.urls()[0]).contains("Var3"));
    }

    #[test]
    fn empty_selection_is_an_error() {
        let mut variables = short_selection();
        for variable in &mut variables {
            variable.selected = false;
        }
        let builder = QueryUrlBuilder::new(BASE_URL, MAX_URL_LENGTH);
        let result = builder
            .synthesize()
            .variables(&variables)
            .options(&options())
            .call();

        assert!(matches!(result, Err(QueryError::EmptySelection)));
    }

    #[test]
    fn missing_or_inverted_date_range_is_an_error() {
        let builder = QueryUrlBuilder::new(BASE_URL, MAX_URL_LENGTH);

        let mut no_range = options();
        no_range.date_range = None;
        assert!(matches!(
            builder
                .synthesize()
                .variables(&short_selection())
                .options(&no_range)
                .call(),
            Err(QueryError::InvalidDateRange)
        ));

        let mut inverted = options();
        inverted.date_range = Some(DateRange::new(date("2006-06-30"), date("2001-04-05")));
        assert!(matches!(
            builder
                .synthesize()
                .variables(&short_selection())
                .options(&inverted)
                .call(),
            Err(QueryError::InvalidDateRange)
        ));
    }

    #[test]
    fn equal_inputs_produce_equal_output() {
        let builder = QueryUrlBuilder::new(BASE_URL, MAX_URL_LENGTH);
        let first = builder
            .synthesize()
            .variables(&long_selection())
            .options(&options())
            .call()
            .unwrap();
        let second = builder
            .synthesize()
            .variables(&long_selection())
            .options(&options())
            .call()
            .unwrap();

        assert_eq!(first, second);
    }
}
