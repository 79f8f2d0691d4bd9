use std::{env, fs, process::ExitCode, time::Instant};

use objmodel::{
    LimitedTracker, NoLimitTracker, ProfilingTracer, ResourceLimits, ResourceTracker, Runtime, StderrTracer,
};

mod tour;

const USAGE: &str = "usage: objmodel [--trace] [--profile] [--json] [--limits <file>]";

/// Maximum number of lines `--trace` prints.
const TRACE_LINE_LIMIT: usize = 10_000;

#[derive(Debug, Default)]
struct Options {
    trace: bool,
    profile: bool,
    json: bool,
    limits: Option<String>,
}

fn main() -> ExitCode {
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("error: {err}\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    match &options.limits {
        Some(path) => {
            let limits = match read_limits(path) {
                Ok(limits) => limits,
                Err(err) => {
                    eprintln!("error: {err}");
                    return ExitCode::FAILURE;
                }
            };
            run(&options, LimitedTracker::new(limits))
        }
        None => run(&options, NoLimitTracker),
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--trace" => options.trace = true,
            "--profile" => options.profile = true,
            "--json" => options.json = true,
            "--limits" => {
                let path = args.next().ok_or("--limits needs a file path")?;
                options.limits = Some(path);
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    if options.trace && options.profile {
        return Err("--trace and --profile cannot be combined".to_owned());
    }
    Ok(options)
}

fn read_limits(path: &str) -> Result<ResourceLimits, String> {
    let text = fs::read_to_string(path).map_err(|err| format!("reading {path}: {err}"))?;
    serde_json::from_str(&text).map_err(|err| format!("parsing {path}: {err}"))
}

fn run<T: ResourceTracker>(options: &Options, tracker: T) -> ExitCode {
    let mut rt = Runtime::new(tracker);
    if options.trace {
        rt = rt.with_tracer(StderrTracer::with_limit(TRACE_LINE_LIMIT));
    } else if options.profile {
        rt = rt.with_tracer(ProfilingTracer::new());
    }

    let start = Instant::now();
    let report = match tour::run(&mut rt) {
        Ok(report) => report,
        Err(err) => {
            let elapsed = start.elapsed();
            eprintln!("error after: {elapsed:?}\n{err}");
            return ExitCode::FAILURE;
        }
    };
    let elapsed = start.elapsed();

    for line in &report.lines {
        println!("{line}");
    }

    if options.json {
        let instances: serde_json::Map<String, serde_json::Value> = report
            .instances
            .iter()
            .map(|(label, object)| (label.clone(), object.to_json_value()))
            .collect();
        match serde_json::to_string_pretty(&instances) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(profiler) = rt.tracer_as::<ProfilingTracer>() {
        eprintln!("{}", profiler.report());
    }
    let stats = rt.heap_stats();
    eprintln!(
        "success after: {elapsed:?} ({} classes, {} live instances)",
        rt.registry().len(),
        stats.live_instances
    );
    ExitCode::SUCCESS
}
