/// cilfront - CIL front end CLI
use cilfront::backend::*;
use std::env;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("cilfront v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    cilfront [OPTIONS] <MANIFEST>");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help           Print this help message");
    eprintln!("    -v, --version        Print version information");
    eprintln!("    -o, --output <FILE>  Write listings to FILE (default: stdout)");
    eprintln!("    --type <NAME>        Only emit the unit of type NAME (Ns.Type)");
    eprintln!("    --parallel           Build translation units in parallel");
    eprintln!("    --long-branches      Never emit short branch forms in synthetic bodies");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <MANIFEST>           TOML module manifest");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    CILFRONT_LOG         Log filter, e.g. cilfront=debug");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    cilfront module.toml");
    eprintln!("    cilfront --type Demo.Handler -o handler.il module.toml");
}

fn print_version() {
    println!("cilfront {}", VERSION);
}

#[derive(Debug, Default)]
struct Options {
    manifest: Option<String>,
    output: Option<String>,
    type_name: Option<String>,
    parallel: bool,
    long_branches: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing output file after -o".to_string());
                }
                options.output = Some(args[i].clone());
            }
            "--type" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing type name after --type".to_string());
                }
                options.type_name = Some(args[i].clone());
            }
            "--parallel" => {
                options.parallel = true;
            }
            "--long-branches" => {
                options.long_branches = true;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                if options.manifest.is_some() {
                    return Err("Multiple manifests specified".to_string());
                }
                options.manifest = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(options)
}

fn init_logging() {
    if let Ok(filter) = EnvFilter::try_from_env("CILFRONT_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }
}

/// Stream one listing per unit, blank line between units
fn write_listings(output: Option<&str>, listings: &[String]) -> Result<(), String> {
    let destination = output.unwrap_or("stdout");
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(
            fs::File::create(path)
                .map_err(|e| format!("Failed to create listing file '{}': {}", path, e))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);

    for (index, listing) in listings.iter().enumerate() {
        if index > 0 {
            writeln!(out).map_err(|e| format!("Failed to write to {}: {}", destination, e))?;
        }
        out.write_all(listing.as_bytes())
            .map_err(|e| format!("Failed to write to {}: {}", destination, e))?;
    }
    out.flush()
        .map_err(|e| format!("Failed to write to {}: {}", destination, e))?;

    tracing::debug!(units = listings.len(), destination, "listings written");
    Ok(())
}

fn run(options: &Options, manifest_path: &str) -> Result<Vec<String>, String> {
    let manifest = Manifest::load_from_path(Path::new(manifest_path)).map_err(|e| e.to_string())?;
    let loaded = manifest.build().map_err(|e| e.to_string())?;

    let mut config = loaded.config.unwrap_or_default().with_env_overrides();
    if options.parallel {
        config = config.with_parallel(true);
    }
    if options.long_branches {
        config = config.with_short_branches(false);
    }

    let module = loaded.module;
    let builder =
        UnitBuilder::new(&module, config).with_source_declarations(loaded.source_declarations);

    let units = match &options.type_name {
        Some(name) => {
            let ty = module
                .find_type(name)
                .ok_or_else(|| format!("Type not found: {}", name))?;
            vec![builder.build_type(ty).map_err(|e| e.to_string())?]
        }
        None => builder.build().map_err(|e| e.to_string())?,
    };

    match ListingGenerator.emit_all(&module, &units) {
        Ok(listings) => Ok(listings),
        Err(never) => match never {},
    }
}

fn main() {
    init_logging();

    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    let Some(manifest) = options.manifest.as_deref() else {
        eprintln!("Error: No manifest specified");
        eprintln!();
        print_usage();
        process::exit(1);
    };

    let listings = match run(&options, manifest) {
        Ok(listings) => listings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_listings(options.output.as_deref(), &listings) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
