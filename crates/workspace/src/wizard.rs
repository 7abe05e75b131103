use serde::{Deserialize, Serialize};

/// Steps of the ad-creation wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Product,
    Templates,
    Copy,
    Generation,
    Editing,
}

impl WizardStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Templates => "templates",
            Self::Copy => "copy",
            Self::Generation => "generation",
            Self::Editing => "editing",
        }
    }

    /// The next step in the flow (None at the end).
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Product => Some(Self::Templates),
            Self::Templates => Some(Self::Copy),
            Self::Copy => Some(Self::Generation),
            Self::Generation => Some(Self::Editing),
            Self::Editing => None,
        }
    }

    /// The previous step in the flow (None at the beginning).
    pub fn previous(&self) -> Option<Self> {
        match self {
            Self::Product => None,
            Self::Templates => Some(Self::Product),
            Self::Copy => Some(Self::Templates),
            Self::Generation => Some(Self::Copy),
            Self::Editing => Some(Self::Generation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_traversal_round_trips() {
        let mut step = WizardStep::Product;
        let mut forward = vec![step];
        while let Some(next) = step.next() {
            forward.push(next);
            step = next;
        }
        assert_eq!(forward.len(), 5);
        assert_eq!(step, WizardStep::Editing);

        while let Some(previous) = step.previous() {
            step = previous;
        }
        assert_eq!(step, WizardStep::Product);
    }
}
