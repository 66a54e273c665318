use std::env;
use std::fs;
use std::time::Duration;

use paefrag::afdb::{AfdbClient, StructureDatabase};
use paefrag::cache::ArtifactCache;
use paefrag::cluster::ClusterInterval;
use paefrag::matrix::{normalize, validate};
use paefrag::plot::render_pae_plot;
use paefrag::settings::Settings;
use paefrag::structure_format::detect_structure_format;

fn usage() {
    eprintln!(
        "Usage:\n  \
  paefrag_cli --version\n  \
  paefrag_cli [--settings PATH] normalize PAE_FILE\n  \
  paefrag_cli [--settings PATH] plot PAE_FILE OUTPUT.png [INTERVALS_JSON]\n  \
  paefrag_cli [--settings PATH] fetch ACCESSION OUTPUT_DIR\n  \
  paefrag_cli [--settings PATH] sweep [CACHE_DIR]\n\n  \
  INTERVALS_JSON is a [[start,end],...] array; pass @file.json to read it from a file"
    );
}

fn load_json_arg(value: &str) -> Result<String, String> {
    if let Some(path) = value.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| format!("Could not read JSON file '{path}': {e}"))
    } else {
        Ok(value.to_string())
    }
}

fn parse_global_settings_arg(args: &[String]) -> Result<(Settings, usize), String> {
    if args.len() >= 3 && args[1] == "--settings" {
        let settings = Settings::load_from_path(&args[2]).map_err(|e| e.to_string())?;
        return Ok((settings, 3));
    }
    Ok((Settings::default(), 1))
}

fn read_pae_file(path: &str) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|e| format!("Could not read PAE file '{path}': {e}"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paefrag=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        return Err("Missing command".to_string());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("paefrag {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let (settings, cmd_idx) = parse_global_settings_arg(&args)?;
    if args.len() <= cmd_idx {
        usage();
        return Err("Missing command".to_string());
    }
    let command = &args[cmd_idx];

    match command.as_str() {
        "normalize" => {
            if args.len() <= cmd_idx + 1 {
                usage();
                return Err("normalize requires: PAE_FILE".to_string());
            }
            let raw = read_pae_file(&args[cmd_idx + 1])?;
            let matrix = normalize(&raw).map_err(|e| e.to_string())?;
            validate(&matrix).map_err(|e| e.to_string())?;
            println!(
                "{}",
                serde_json::json!({
                    "residues": matrix.n_residues(),
                    "valid": true,
                })
            );
            Ok(())
        }
        "plot" => {
            if args.len() <= cmd_idx + 2 {
                usage();
                return Err("plot requires: PAE_FILE OUTPUT.png [INTERVALS_JSON]".to_string());
            }
            let raw = read_pae_file(&args[cmd_idx + 1])?;
            let output = &args[cmd_idx + 2];
            let intervals: Vec<ClusterInterval> = match args.get(cmd_idx + 3) {
                Some(arg) => {
                    let json = load_json_arg(arg)?;
                    serde_json::from_str(&json)
                        .map_err(|e| format!("Invalid intervals JSON: {e}"))?
                }
                None => Vec::new(),
            };

            let matrix = normalize(&raw).map_err(|e| e.to_string())?;
            validate(&matrix).map_err(|e| e.to_string())?;
            let bytes = render_pae_plot(&matrix, &intervals).map_err(|e| e.to_string())?;
            fs::write(output, bytes)
                .map_err(|e| format!("Could not write plot '{output}': {e}"))?;
            println!("Wrote PAE plot for {} residues to '{output}'", matrix.n_residues());
            Ok(())
        }
        "fetch" => {
            if args.len() <= cmd_idx + 2 {
                usage();
                return Err("fetch requires: ACCESSION OUTPUT_DIR".to_string());
            }
            let accession = &args[cmd_idx + 1];
            let out_dir = std::path::Path::new(&args[cmd_idx + 2]);
            fs::create_dir_all(out_dir)
                .map_err(|e| format!("Could not create '{}': {e}", out_dir.display()))?;

            let client = AfdbClient::new(
                settings.afdb_base_url.clone(),
                Duration::from_secs(settings.fetch_timeout_secs),
            )
            .map_err(|e| e.to_string())?;
            let data = client.fetch(accession).map_err(|e| e.to_string())?;

            let pae_path = out_dir.join("pae.json");
            fs::write(&pae_path, &data.pae_json)
                .map_err(|e| format!("Could not write '{}': {e}", pae_path.display()))?;
            let format = detect_structure_format(&data.structure);
            let structure_name = match format {
                Some(f) => format!("structure.{}", f.label()),
                None => "structure.txt".to_string(),
            };
            let structure_path = out_dir.join(structure_name);
            fs::write(&structure_path, data.structure.as_bytes())
                .map_err(|e| format!("Could not write '{}': {e}", structure_path.display()))?;
            println!(
                "Fetched '{accession}': {} and {}",
                pae_path.display(),
                structure_path.display()
            );
            Ok(())
        }
        "sweep" => {
            let cache = match args.get(cmd_idx + 1) {
                Some(dir) => ArtifactCache::new(dir.clone(), settings.retention_hours),
                None => settings.artifact_cache(),
            };
            let removed = cache.sweep_expired();
            println!("Removed {removed} expired plot artifact(s) from '{}'", cache.root().display());
            Ok(())
        }
        _ => {
            usage();
            Err(format!("Unknown command '{command}'"))
        }
    }
}
