//! Monitor construction options.

/// How the initial fetch runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InitialFetch {
    /// Fetch on the constructing thread; construction fails if the fetch fails.
    #[default]
    Synchronous,
    /// Fetch on the work queue. The monitor is empty until the result is applied.
    Asynchronous,
}

/// Options for creating a `ListMonitor`.
///
/// # Example
///
/// ```
/// use vigil_monitor::{InitialFetch, MonitorOptions};
///
/// let options = MonitorOptions::new()
///     .label("inbox")
///     .initial_fetch(InitialFetch::Asynchronous);
/// assert_eq!(options.get_label(), "inbox");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorOptions {
    label: String,
    initial_fetch: InitialFetch,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorOptions {
    pub fn new() -> Self {
        Self {
            label: String::from("list-monitor"),
            initial_fetch: InitialFetch::Synchronous,
        }
    }

    /// Sets the label recorded on the monitor's tracing span.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn initial_fetch(mut self, mode: InitialFetch) -> Self {
        self.initial_fetch = mode;
        self
    }

    pub fn get_label(&self) -> &str {
        &self.label
    }

    pub fn get_initial_fetch(&self) -> InitialFetch {
        self.initial_fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = MonitorOptions::default();
        assert_eq!(options.get_label(), "list-monitor");
        assert_eq!(options.get_initial_fetch(), InitialFetch::Synchronous);
    }
}
