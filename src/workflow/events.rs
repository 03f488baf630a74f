use crate::dataset::DatasetKind;
use std::fmt;

/// The observable attributes of a [`super::WorkflowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Step,
    Location,
    Radius,
    ChosenDatasetKinds,
    OutputOptions,
}

/// Events emitted by the workflow. Attribute events fire synchronously,
/// immediately after the mutation; dataset events bracket a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    AttributeChanged(Attribute),
    DatasetUpdateStart,
    /// Fired exactly once per refresh after every fetch has settled, with
    /// the kinds whose fetch failed, in enumeration order.
    DatasetUpdateFinished(Vec<DatasetKind>),
}

type Listener = Box<dyn Fn(&WorkflowEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub(crate) fn subscribe(
        &mut self,
        listener: impl Fn(&WorkflowEvent) + Send + Sync + 'static,
    ) {
        self.listeners.push(Box::new(listener));
    }

    pub(crate) fn emit(&self, event: &WorkflowEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
