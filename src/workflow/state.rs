//! The session state machine: wizard steps, location and dataset choices, and
//! the refresh cycle that keeps the dataset collections in sync with them.

use crate::dataset::{DatasetCollection, DatasetKind, SiteKey};
use crate::date_range::DateRange;
use crate::geo::{self, BoundingBox};
use crate::output::OutputOptions;
use crate::sources::DatasetSource;
use crate::variable::Variable;
use crate::workflow::error::WorkflowError;
use crate::workflow::events::{Attribute, EventBus, WorkflowEvent};
use futures_util::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Search radius applied when none was chosen before leaving the location
/// step, in miles.
pub const DEFAULT_RADIUS_MILES: f64 = 2.0;

/// Dataset kinds queried when none were chosen before leaving the location
/// step.
pub const DEFAULT_DATASET_KINDS: [DatasetKind; 1] = [DatasetKind::Nwis];

/// The wizard steps a session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    SpecifyLocation,
    ChooseDataFilters,
    ChooseDataBySite,
    ChooseDataByVariable,
    ProcessData,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::SpecifyLocation => "specifyLocation",
            Step::ChooseDataFilters => "chooseDataFilters",
            Step::ChooseDataBySite => "chooseDataBySite",
            Step::ChooseDataByVariable => "chooseDataByVariable",
            Step::ProcessData => "processData",
        }
    }

    /// Whether the wizard may move from `self` to `next`. Returning to the
    /// location step is always allowed; every other edge only moves forward
    /// one stage.
    pub fn can_transition_to(&self, next: Step) -> bool {
        matches!(
            (self, next),
            (_, Step::SpecifyLocation)
                | (Step::SpecifyLocation, Step::ChooseDataFilters)
                | (Step::ChooseDataFilters, Step::ChooseDataBySite)
                | (Step::ChooseDataFilters, Step::ChooseDataByVariable)
                | (Step::ChooseDataBySite, Step::ProcessData)
                | (Step::ChooseDataByVariable, Step::ProcessData)
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The point of interest a session searches around. Both coordinates start
/// out unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }
}

/// The root of a discovery/export session.
///
/// Holds the wizard step, the search location and radius, the chosen dataset
/// kinds, one [`DatasetCollection`] per registered source, and the output
/// options for the export step. Mutating the location, radius, or chosen
/// kinds refreshes the collections before the mutator returns.
pub struct WorkflowState {
    step: Step,
    location: Location,
    radius: Option<f64>,
    chosen_kinds: Vec<DatasetKind>,
    collections: BTreeMap<DatasetKind, DatasetCollection>,
    sources: BTreeMap<DatasetKind, Arc<dyn DatasetSource>>,
    output: OutputOptions,
    events: EventBus,
}

impl fmt::Debug for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowState")
            .field("step", &self.step)
            .field("location", &self.location)
            .field("radius", &self.radius)
            .field("chosen_kinds", &self.chosen_kinds)
            .field("collections", &self.collections)
            .field("output", &self.output)
            .field("events", &self.events)
            .finish()
    }
}

impl WorkflowState {
    /// Creates a session over the given sources, starting at the location
    /// step. The set of dataset kinds is fixed at construction; one empty
    /// collection is created per source.
    ///
    /// # Examples
    ///
    /// ```
    /// use enddat::{DatasetKind, DatasetSource, NwisSource, Step, WorkflowState};
    /// use std::collections::BTreeMap;
    /// use std::sync::Arc;
    ///
    /// let mut sources: BTreeMap<DatasetKind, Arc<dyn DatasetSource>> = BTreeMap::new();
    /// sources.insert(
    ///     DatasetKind::Nwis,
    ///     Arc::new(NwisSource::new("https://waterservices.usgs.gov/nwis/site/")),
    /// );
    ///
    /// let state = WorkflowState::new(sources);
    /// assert_eq!(state.step(), Step::SpecifyLocation);
    /// assert!(state.collection(DatasetKind::Nwis).unwrap().is_empty());
    /// ```
    pub fn new(sources: BTreeMap<DatasetKind, Arc<dyn DatasetSource>>) -> Self {
        let collections = sources
            .keys()
            .map(|&kind| (kind, DatasetCollection::new(kind)))
            .collect();
        Self {
            step: Step::SpecifyLocation,
            location: Location::default(),
            radius: None,
            chosen_kinds: Vec::new(),
            collections,
            sources,
            output: OutputOptions::default(),
            events: EventBus::default(),
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(&WorkflowEvent) + Send + Sync + 'static) {
        self.events.subscribe(listener);
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn radius(&self) -> Option<f64> {
        self.radius
    }

    pub fn chosen_kinds(&self) -> &[DatasetKind] {
        &self.chosen_kinds
    }

    pub fn collection(&self, kind: DatasetKind) -> Option<&DatasetCollection> {
        self.collections.get(&kind)
    }

    pub fn output_options(&self) -> &OutputOptions {
        &self.output
    }

    /// The lake filter on the grid-model collection, if any.
    pub fn lake(&self) -> Option<&str> {
        self.collections
            .get(&DatasetKind::Glcfs)
            .and_then(|c| c.lake())
    }

    pub fn has_valid_location(&self) -> bool {
        matches!(
            (self.location.latitude, self.location.longitude),
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite()
        )
    }

    /// The search bounding box, when the location and radius are both usable.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let (Some(latitude), Some(longitude)) = (self.location.latitude, self.location.longitude)
        else {
            return None;
        };
        let radius = self.radius?;
        geo::bounding_box(latitude, longitude, radius).ok()
    }

    /// Moves the wizard to `step`, applying the step's entry actions.
    /// Rejected transitions leave the session untouched.
    pub async fn set_step(&mut self, step: Step) -> Result<(), WorkflowError> {
        if !self.step.can_transition_to(step) {
            return Err(WorkflowError::InvalidTransition {
                from: self.step,
                to: step,
            });
        }
        let previous = self.step;
        self.step = step;
        debug!("Workflow step {previous} -> {step}");
        self.events
            .emit(&WorkflowEvent::AttributeChanged(Attribute::Step));

        match step {
            Step::SpecifyLocation => self.hard_reset(),
            Step::ChooseDataFilters if previous == Step::SpecifyLocation => {
                if self.radius.is_none() {
                    self.radius = Some(DEFAULT_RADIUS_MILES);
                    self.events
                        .emit(&WorkflowEvent::AttributeChanged(Attribute::Radius));
                }
                if self.chosen_kinds.is_empty() {
                    self.chosen_kinds = DEFAULT_DATASET_KINDS.to_vec();
                    self.events.emit(&WorkflowEvent::AttributeChanged(
                        Attribute::ChosenDatasetKinds,
                    ));
                }
                self.refresh_datasets().await;
            }
            Step::ProcessData => {
                let mut options = OutputOptions::process_defaults();
                options.date_range = self.selected_vars_date_range();
                self.output = options;
                self.events
                    .emit(&WorkflowEvent::AttributeChanged(Attribute::OutputOptions));
            }
            _ => {}
        }
        Ok(())
    }

    pub async fn set_location(&mut self, location: Location) {
        self.location = location;
        self.events
            .emit(&WorkflowEvent::AttributeChanged(Attribute::Location));
        self.refresh_datasets().await;
    }

    pub async fn set_radius(&mut self, radius: Option<f64>) {
        self.radius = radius;
        self.events
            .emit(&WorkflowEvent::AttributeChanged(Attribute::Radius));
        self.refresh_datasets().await;
    }

    /// Replaces the chosen dataset kinds. Duplicates and kinds with no
    /// registered source are dropped, preserving the caller's order.
    pub async fn set_chosen_kinds(&mut self, kinds: Vec<DatasetKind>) {
        let mut chosen = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if self.collections.contains_key(&kind) && !chosen.contains(&kind) {
                chosen.push(kind);
            }
        }
        self.chosen_kinds = chosen;
        self.events.emit(&WorkflowEvent::AttributeChanged(
            Attribute::ChosenDatasetKinds,
        ));
        self.refresh_datasets().await;
    }

    pub fn set_output_options(&mut self, options: OutputOptions) {
        self.output = options;
        self.events
            .emit(&WorkflowEvent::AttributeChanged(Attribute::OutputOptions));
    }

    pub fn set_output_date_range(&mut self, date_range: Option<DateRange>) {
        self.output.date_range = date_range;
        self.events
            .emit(&WorkflowEvent::AttributeChanged(Attribute::OutputOptions));
    }

    /// Sets the lake filter on the grid-model collection; an empty string
    /// clears it.
    pub fn set_lake(&mut self, lake: impl Into<String>) {
        if let Some(collection) = self.collections.get_mut(&DatasetKind::Glcfs) {
            collection.set_lake(lake);
        }
    }

    /// Marks a variable selected or unselected.
    pub fn select_variable(
        &mut self,
        kind: DatasetKind,
        site: &SiteKey,
        id: &str,
        selected: bool,
    ) -> Result<(), WorkflowError> {
        let site_entry = self
            .collections
            .get_mut(&kind)
            .and_then(|c| c.site_mut(site))
            .ok_or_else(|| WorkflowError::UnknownSite {
                kind,
                site: site.clone(),
            })?;
        let variable =
            site_entry
                .variables
                .get_mut(id)
                .ok_or_else(|| WorkflowError::UnknownVariable {
                    kind,
                    site: site.clone(),
                    id: id.to_string(),
                })?;
        variable.selected = selected;
        Ok(())
    }

    /// Every selected variable across every collection, in kind order, then
    /// site order, then variable order.
    pub fn selected_variables(&self) -> impl Iterator<Item = &Variable> {
        self.collections
            .values()
            .flat_map(|c| c.selected_variables())
    }

    /// The date range over which every selected, dated variable has data.
    pub fn selected_vars_date_range(&self) -> Option<DateRange> {
        DateRange::intersect_all(self.selected_variables().filter_map(|v| v.validity()))
    }

    /// Re-derives every collection from the current location, radius, and
    /// chosen kinds.
    ///
    /// Without a usable bounding box, or with nothing chosen, every
    /// collection is cleared and no dataset events fire. Otherwise the chosen
    /// kinds are fetched concurrently and the rest are cleared; the finish
    /// event carries the kinds whose fetch failed, each of which is left
    /// empty.
    pub async fn refresh_datasets(&mut self) {
        let Some(bounding_box) = self.bounding_box() else {
            self.reset_collections();
            return;
        };
        if self.chosen_kinds.is_empty() {
            self.reset_collections();
            return;
        }

        self.events.emit(&WorkflowEvent::DatasetUpdateStart);
        let mut fetches = Vec::new();
        for kind in DatasetKind::ALL {
            if !self.collections.contains_key(&kind) {
                continue;
            }
            if self.chosen_kinds.contains(&kind) {
                if let Some(source) = self.sources.get(&kind) {
                    let source = Arc::clone(source);
                    fetches.push(async move { (kind, source.fetch(bounding_box).await) });
                }
            } else if let Some(collection) = self.collections.get_mut(&kind) {
                collection.reset();
            }
        }

        let mut failed = Vec::new();
        for (kind, outcome) in join_all(fetches).await {
            let Some(collection) = self.collections.get_mut(&kind) else {
                continue;
            };
            match outcome {
                Ok(records) => {
                    info!("{kind} fetch returned {} sites", records.len());
                    collection.repopulate(records);
                }
                Err(error) => {
                    warn!("{kind} fetch failed: {error}");
                    collection.reset();
                    failed.push(kind);
                }
            }
        }
        self.events
            .emit(&WorkflowEvent::DatasetUpdateFinished(failed));
    }

    fn reset_collections(&mut self) {
        for collection in self.collections.values_mut() {
            collection.reset();
        }
    }

    /// Returning to the location step abandons the session's choices: the
    /// location, radius, chosen kinds, output date range, collections, and
    /// lake filter all revert.
    fn hard_reset(&mut self) {
        self.location = Location::default();
        self.events
            .emit(&WorkflowEvent::AttributeChanged(Attribute::Location));
        self.radius = None;
        self.events
            .emit(&WorkflowEvent::AttributeChanged(Attribute::Radius));
        self.chosen_kinds.clear();
        self.events.emit(&WorkflowEvent::AttributeChanged(
            Attribute::ChosenDatasetKinds,
        ));
        self.output.date_range = None;
        self.events
            .emit(&WorkflowEvent::AttributeChanged(Attribute::OutputOptions));
        for collection in self.collections.values_mut() {
            collection.reset();
            collection.set_lake("");
        }
    }
}
