mod argparse;

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use clap::ArgMatches;
use flexi_logger::FileSpec;

use beamline_core::kinds::ElementKind;
use beamline_core::propagate::{self, Context};
use beamline_core::registry::{ElementId, Registry};
use beamline_core::{diagnostics, legacy_import, persistence};

fn main() {
    println!("Beamline 0.1 [Detected {} cores]", num_cpus::get());
    println!("Synchrotron-beamline ray-tracing engine.");
    let matches = argparse::parse_args();

    let level = if matches.is_present("verbose") { "debug" } else { "info" };
    flexi_logger::Logger::try_with_str(format!("beamline_cli={level},beamline_core={level}"))
        .unwrap()
        .log_to_file(FileSpec::default().suppress_timestamp().directory("/tmp"))
        .format(flexi_logger::opt_format)
        .start()
        .unwrap_or_else(|e| panic!("Failed to initialize logger: {}", e));

    if let Err(ref e) = run(&matches) {
        println!("Application error: {:#}", e);
        ::std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let nthreads = matches.value_of("threads").and_then(|v| v.parse::<usize>().ok()).unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(nthreads)
        .build_global()
        .unwrap_or_else(|e| log::warn!("could not install global rayon pool: {e}"));

    let filename = matches.value_of("INPUT").unwrap();
    let mut registry = load_system(filename, matches.is_present("legacy"))?;

    let wavelength: f64 = matches
        .value_of("wavelength")
        .unwrap()
        .parse()
        .context("--wavelength must be a floating-point number of metres")?;
    let nrays: f64 = matches.value_of("nrays").unwrap().parse().context("--nrays must be an integer")?;

    let source_id = find_source(&registry, matches.value_of("source"))?;
    if let ElementKind::Source(source) = registry.get_mut(source_id)? {
        let _ = source.surface.element.set_scalar("nRays", nrays);
    }
    {
        let kind = registry.get_mut(source_id)?;
        let ElementKind::Source(source) = kind else {
            return Err(anyhow!("`{}` is not a source", registry.get(source_id)?.element().name));
        };
        source.generate(wavelength, 'S')?;
    }

    registry.align_from_here(source_id, wavelength, wavelength)?;

    let stats = propagate::radiate(&mut registry, source_id, &Context::default())?;
    log::info!("radiate: {} rays lost in transit", stats.lost);

    if let Some(last_id) = last_in_chain(&registry, source_id) {
        let last = registry.get(last_id)?;
        let diagram = diagnostics::spot_diagram(&last.surface().impacts, 0.0, stats.lost);
        println!(
            "spot diagram on `{}`: {} rays, centroid ({:.6e}, {:.6e})",
            last.element().name,
            diagram.count,
            diagram.mean[0],
            diagram.mean[1]
        );
        if let Some(path) = matches.value_of("spot-out") {
            fs::write(path, persistence::spot::write(&diagram)).with_context(|| format!("writing spot diagram to {path}"))?;
        }
    }

    if let Some(path) = matches.value_of("save-xml") {
        let xml = persistence::xml::write(&registry)?;
        fs::write(path, xml).with_context(|| format!("writing system to {path}"))?;
    }

    Ok(())
}

fn load_system(filename: &str, legacy: bool) -> Result<Registry> {
    if legacy {
        let bytes = fs::read(filename).with_context(|| format!("reading {filename}"))?;
        legacy_import::import(&bytes).map_err(Into::into)
    } else {
        let text = fs::read_to_string(filename).with_context(|| format!("reading {filename}"))?;
        match Path::new(filename).extension().and_then(|e| e.to_str()) {
            Some("xml") => persistence::xml::read(&text).map_err(Into::into),
            _ => persistence::text::read(&text).map_err(Into::into),
        }
    }
}

/// Picks the named source, or the system's only source if `name` is absent.
fn find_source(registry: &Registry, name: Option<&str>) -> Result<ElementId> {
    if let Some(name) = name {
        let id = registry.find(name).ok_or_else(|| anyhow!("no element named `{name}`"))?;
        if !registry.get(id)?.is_source() {
            return Err(anyhow!("`{name}` is not a source"));
        }
        return Ok(id);
    }
    let sources: Vec<ElementId> = registry
        .names()
        .filter_map(|n| registry.find(n))
        .filter(|id| registry.get(*id).map(|k| k.is_source()).unwrap_or(false))
        .collect();
    match sources.as_slice() {
        [] => Err(anyhow!("system has no source element; pass --source to pick one")),
        [one] => Ok(*one),
        _ => Err(anyhow!("system has several sources; pass --source to pick one")),
    }
}

fn last_in_chain(registry: &Registry, start: ElementId) -> Option<ElementId> {
    let mut current = start;
    loop {
        match registry.get(current).ok()?.element().next {
            Some(next) => current = next,
            None => return Some(current),
        }
    }
}
