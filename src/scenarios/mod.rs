use std::error::Error;
use crate::config::ExperimentConfig;
use crate::logger::{Logger, LogEvent};
use crate::{errln, logln};

/// Function type for scenario entry functions
pub type ScenarioFn = fn(scenario_name: &str, config: &ExperimentConfig, logger: &mut Logger) -> Result<(), Box<dyn Error>>;

/// Entry in the scenario catalog
#[derive(Clone)]
pub struct ScenarioEntry {
    pub short_name: &'static str,
    pub run: ScenarioFn,
}

inventory::collect!(ScenarioEntry);

/// Get all registered scenarios from the catalog, sorted by name
pub fn get_scenario_catalog() -> Vec<ScenarioEntry> {
    let mut entries: Vec<ScenarioEntry> = inventory::iter::<ScenarioEntry>
        .into_iter()
        .cloned()
        .collect();
    entries.sort_by_key(|entry| entry.short_name);
    entries
}

/// Log a ✓/✗ line for one validation and remember the failure message
pub fn check(logger: &mut Logger, errors: &mut Vec<String>, passed: bool, msg: String) {
    if passed {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        errors.push(msg);
    }
}

/// Turn collected failures into the scenario's result
pub fn finish(scenario_name: &str, errors: Vec<String>) -> Result<(), Box<dyn Error>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}

pub mod paper_grid;
pub mod scarce_budgets;
pub mod two_advertisers;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_every_scenario() {
        let names: Vec<&str> = get_scenario_catalog().iter().map(|e| e.short_name).collect();
        assert_eq!(names, vec!["paper_grid", "scarce_budgets", "two_advertisers"]);
    }

    #[test]
    fn test_finish_reports_all_failures() {
        let mut logger = Logger::new();
        let mut errors = Vec::new();
        check(&mut logger, &mut errors, true, "fine".to_string());
        check(&mut logger, &mut errors, false, "first".to_string());
        check(&mut logger, &mut errors, false, "second".to_string());
        let message = finish("demo", errors).unwrap_err().to_string();
        assert!(message.contains("first\nsecond"));
        assert!(finish("demo", Vec::new()).is_ok());
    }
}
