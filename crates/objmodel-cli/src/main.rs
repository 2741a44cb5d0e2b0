use std::{env, fs, process::ExitCode, time::Instant};

use objmodel::{RecordingTracer, Runtime, StderrTracer, load_scenario, run_scenario};

/// How lookups are reported while the scenario runs.
#[derive(Clone, Copy, PartialEq, Eq)]
enum TraceMode {
    Off,
    /// Collect events and print them after the run.
    Recorded,
    /// Print each event to stderr as it happens.
    Live { quiet: bool },
}

fn main() -> ExitCode {
    let mut trace = TraceMode::Off;
    let mut json = false;
    let mut file_path = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--trace" => trace = TraceMode::Recorded,
            "--log" => trace = TraceMode::Live { quiet: false },
            "--log-quiet" => trace = TraceMode::Live { quiet: true },
            "--json" => json = true,
            "-h" | "--help" => {
                println!("usage: objmodel [--trace | --log | --log-quiet] [--json] [SCENARIO.json]");
                return ExitCode::SUCCESS;
            }
            _ => file_path = Some(arg),
        }
    }
    let file_path = file_path.unwrap_or_else(|| "scenario.json".to_owned());

    let source = match read_file(&file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let scenario = match load_scenario(&source) {
        Ok(scenario) => scenario,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let tracer = RecordingTracer::new();
    let mut rt = match trace {
        TraceMode::Live { quiet: false } => Runtime::new().with_tracer(StderrTracer::new()),
        TraceMode::Live { quiet: true } => Runtime::new().with_tracer(StderrTracer::quiet()),
        TraceMode::Off | TraceMode::Recorded => Runtime::new().with_tracer(tracer.clone()),
    };
    let start = Instant::now();
    let report = match run_scenario(&mut rt, &scenario) {
        Ok(report) => report,
        Err(err) => {
            let elapsed = start.elapsed();
            eprintln!("error after: {elapsed:?}\n{err}");
            return ExitCode::FAILURE;
        }
    };
    let elapsed = start.elapsed();

    if trace == TraceMode::Recorded {
        for event in tracer.events() {
            eprintln!("  {event}");
        }
    }

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{out}"),
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        if !report.description.is_empty() {
            println!("{}", report.description);
        }
        for outcome in &report.outcomes {
            let status = if outcome.passed { "ok  " } else { "FAIL" };
            println!("{status} {:>3} {}: {}", outcome.index, outcome.label, outcome.detail);
        }
    }

    let failed = report.failures().count();
    eprintln!(
        "{} checks, {failed} failed, after: {elapsed:?}",
        report.outcomes.len()
    );
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("reading {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("reading {file_path}: {err}"))
}
