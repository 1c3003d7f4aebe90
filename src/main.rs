mod advertisers;
mod config;
mod dataset;
mod errors;
mod experiment;
mod forecast;
mod keywords;
mod logger;
mod metrics;
mod plan;
mod policies;
mod queries;
mod replications;
mod scenarios;
mod simulationrun;
mod utils;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use config::ExperimentConfig;
use logger::{Logger, LogEvent, ConsoleReceiver, FileReceiver, sanitize_filename};
use scenarios::get_scenario_catalog;
use utils::TOTAL_SIMULATION_RUNS;

fn exit_with(message: String) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    // Pull out flags; what remains is positional
    let mut args = Vec::new();
    let mut fastbreak = false;
    let mut config_path: Option<PathBuf> = None;
    let mut index = 0;
    while index < raw_args.len() {
        let arg = &raw_args[index];
        if arg == "--verbose" {
            if index + 1 < raw_args.len() && raw_args[index + 1] == "allocations" {
                utils::VERBOSE_ALLOCATIONS.store(true, Ordering::Relaxed);
                index += 1;
            }
        } else if arg == "--fastbreak" {
            fastbreak = true;
        } else if arg == "--config" {
            match raw_args.get(index + 1) {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => exit_with("--config needs a file path".to_string()),
            }
            index += 1;
        } else {
            args.push(arg.clone());
        }
        index += 1;
    }

    let base_config = match &config_path {
        Some(path) => ExperimentConfig::load(path),
        None => {
            let config = ExperimentConfig::default();
            config.validate().map(|_| config)
        }
    };
    let base_config = match base_config {
        Ok(config) => config,
        Err(e) => exit_with(format!("[{}] {}", e.code(), e)),
    };

    if args.len() > 1 {
        let scenario_arg = &args[1];

        let iterations = if args.len() > 2 {
            match args[2].parse::<u64>() {
                Ok(n) => n,
                Err(_) => exit_with(format!("Invalid iterations parameter '{}'. Expected a number.", args[2])),
            }
        } else {
            1
        };

        let start_iteration = if args.len() > 3 {
            match args[3].parse::<u64>() {
                Ok(n) => n,
                Err(_) => exit_with(format!("Invalid start iteration parameter '{}'. Expected a number.", args[3])),
            }
        } else {
            0
        };

        let all_scenarios = get_scenario_catalog();
        let scenarios: Vec<_> = if scenario_arg == "all" {
            all_scenarios.clone()
        } else {
            match all_scenarios.iter().find(|s| s.short_name == scenario_arg) {
                Some(scenario) => vec![scenario.clone()],
                None => {
                    eprintln!("Error: Scenario '{}' not found.", scenario_arg);
                    eprintln!("Available scenarios:");
                    for s in &all_scenarios {
                        eprintln!("  - {}", s.short_name);
                    }
                    std::process::exit(1);
                }
            }
        };

        // Scenario detail goes to the console only for a single scenario run once
        let mut logger = Logger::new();
        if scenario_arg != "all" && iterations == 1 {
            logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation, LogEvent::Scenario]));
        } else {
            logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
        }

        let summary_receiver_id = match FileReceiver::new(&PathBuf::from("log/summary.log"), vec![LogEvent::Validation]) {
            Ok(receiver) => logger.add_receiver(receiver),
            Err(e) => exit_with(format!("[{}] {}", e.code(), e)),
        };

        TOTAL_SIMULATION_RUNS.store(0, Ordering::Relaxed);

        if scenario_arg == "all" {
            logln!(&mut logger, LogEvent::Validation, "Running all scenarios {} time(s)...\n", iterations);
        } else {
            logln!(&mut logger, LogEvent::Validation, "Running scenario '{}' {} time(s)...\n", scenario_arg, iterations);
        }

        let mut failures = 0;
        'scenarios: for scenario in &scenarios {
            log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);

            let scenario_receiver_id = match FileReceiver::new(
                &PathBuf::from(format!("log/{}/scenario.log", sanitize_filename(scenario.short_name))),
                vec![LogEvent::Scenario],
            ) {
                Ok(receiver) => logger.add_receiver(receiver),
                Err(e) => exit_with(format!("[{}] {}", e.code(), e)),
            };

            for i in start_iteration..(start_iteration + iterations) {
                if iterations > 1 {
                    log!(&mut logger, LogEvent::Validation, "[{}/{}] ", i - start_iteration + 1, iterations);
                }

                // Each iteration is an independent experiment with its own seed
                let mut config = base_config.clone();
                config.seed_base = base_config.seed_base.wrapping_add(i);

                match (scenario.run)(scenario.short_name, &config, &mut logger) {
                    Ok(()) => {
                        if iterations > 1 {
                            logln!(&mut logger, LogEvent::Validation, "✓");
                        } else {
                            logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        if iterations > 1 {
                            logln!(&mut logger, LogEvent::Validation, "✗");
                        } else {
                            logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
                        }

                        if fastbreak {
                            logger.remove_receiver(scenario_receiver_id);
                            logln!(&mut logger, LogEvent::Validation, "\nStopping scenario execution due to failure (--fastbreak enabled)");
                            logln!(&mut logger, LogEvent::Validation, "Error at iteration {}/{} (seed base {}): {}",
                                i - start_iteration + 1, iterations, config.seed_base, e);
                            break 'scenarios;
                        }
                    }
                }

                let _ = logger.flush();
            }

            logger.remove_receiver(scenario_receiver_id);
        }

        let final_count = TOTAL_SIMULATION_RUNS.load(Ordering::Relaxed);
        logln!(&mut logger, LogEvent::Validation, "\nTotal simulation runs completed: {}", final_count);
        let _ = logger.flush();
        logger.remove_receiver(summary_receiver_id);

        if failures > 0 {
            std::process::exit(1);
        }
    } else {
        // Default: the configured grid with variant summaries on the console
        let mut logger = Logger::new();
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Variant]));
        if let Err(e) = scenarios::paper_grid::run("paper_grid", &base_config, &mut logger) {
            exit_with(format!("running scenario: {}", e));
        }
    }
}
