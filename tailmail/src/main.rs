use clap::Parser;
use log::{error, info, LevelFilter};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tailmail_lib::{
    render, InlinerConfig, PrecompiledStylesheet, StylesheetCache, DEFAULT_BASE_FONT_SIZE,
};

#[derive(Parser)]
#[command(name = "tailmail")]
#[command(about = "Inline utility-class CSS into email-safe HTML")]
struct Args {
    /// Compiled utility stylesheet.
    #[arg(long)]
    css: PathBuf,

    /// Extra CSS appended after the utility stylesheet.
    #[arg(long)]
    custom_css: Option<PathBuf>,

    /// Pixel size of 1rem.
    #[arg(long, default_value_t = DEFAULT_BASE_FONT_SIZE)]
    base_font_size: f64,

    /// Design token override, e.g. `color-brand=#0f766e`. Repeatable.
    #[arg(long = "token", value_parser = parse_token)]
    tokens: Vec<(String, String)>,

    /// Where to write the inlined files. Defaults to next to each input.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    /// HTML files to inline.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn parse_token(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))
}

fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = format!("{stem}.inlined.html");
    match out_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

fn main() {
    // parse the args given in terminal
    let args: Args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .init();

    let css = match fs::read_to_string(&args.css) {
        Ok(css) => css,
        Err(e) => {
            eprintln!("Error reading stylesheet {}: {}", args.css.display(), e);
            std::process::exit(1);
        }
    };

    let mut config = InlinerConfig::default().with_base_font_size(args.base_font_size);
    for (name, value) in &args.tokens {
        config = config.with_token(name, value);
    }
    if let Some(path) = &args.custom_css {
        match fs::read_to_string(path) {
            Ok(custom) => config = config.with_custom_css(custom),
            Err(e) => {
                eprintln!("Error reading custom CSS {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }

    if let Some(dir) = &args.out_dir {
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("Error creating {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    }

    let compiler = PrecompiledStylesheet::new(css);
    let cache = StylesheetCache::new();

    let failures = args
        .inputs
        .par_iter()
        .filter(|input| {
            let html = match fs::read_to_string(input) {
                Ok(html) => html,
                Err(e) => {
                    error!("{}: {}", input.display(), e);
                    return true;
                }
            };
            let output = match render(&html, &compiler, &cache, &config) {
                Ok(output) => output,
                Err(e) => {
                    error!("{}: {}", input.display(), e);
                    return true;
                }
            };
            let destination = output_path(input, args.out_dir.as_deref());
            if let Err(e) = fs::write(&destination, output.html) {
                error!("{}: {}", destination.display(), e);
                return true;
            }
            info!("{} -> {}", input.display(), destination.display());
            false
        })
        .count();

    if failures > 0 {
        eprintln!("{failures} of {} files failed", args.inputs.len());
        std::process::exit(1);
    }
}
