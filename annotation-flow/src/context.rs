use serde::{Deserialize, Serialize};

/// Per-session navigation state, passed explicitly to the navigator and
/// mutated only by runner transitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationContext {
    /// Drug currently shown to the annotator
    pub current_drug: Option<String>,
    /// Set between submit and confirm
    pub pending_advance: bool,
    /// Explicit jump requested from the drug list or Back; wins over
    /// completion order until the next confirmed advance
    pub navigate_to: Option<String>,
    /// Resume point: last drug the annotator saved or navigated to
    pub last_visited: Option<String>,
}

impl NavigationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resuming_from(last_drug: Option<String>) -> Self {
        Self {
            last_visited: last_drug,
            ..Self::default()
        }
    }

    pub fn request_navigation(&mut self, drug: impl Into<String>) {
        let drug = drug.into();
        self.navigate_to = Some(drug.clone());
        self.last_visited = Some(drug);
        self.pending_advance = false;
    }

    /// After a confirmed advance the override is spent and the saved drug
    /// becomes the resume point
    pub fn record_advance(&mut self, drug: impl Into<String>) {
        self.navigate_to = None;
        self.pending_advance = false;
        self.last_visited = Some(drug.into());
    }
}
