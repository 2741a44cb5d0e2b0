//! Runs every scenario file under `tests/scenarios` as its own test.
//!
//! Each file is loaded, executed against a fresh runtime and fails the test
//! when setup fails or any check does not pass.

use std::{fs, path::Path};

use objmodel::{Runtime, load_scenario, run_scenario};

fn run_scenario_file(path: &Path) -> datatest_stable::Result<()> {
    let source = fs::read_to_string(path)?;
    let scenario = load_scenario(&source)?;
    let mut rt = Runtime::new();
    let report = run_scenario(&mut rt, &scenario)?;

    let failures: Vec<String> = report
        .failures()
        .map(|outcome| format!("  #{} {}: {}", outcome.index, outcome.label, outcome.detail))
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} check(s) failed:\n{}", failures.len(), failures.join("\n")).into())
    }
}

datatest_stable::harness!(run_scenario_file, "tests/scenarios", r"^.*\.json$");
