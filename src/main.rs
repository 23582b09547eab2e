//! QuadWarp - command line front end for the quad warp editor
//!
//! Loads the persisted quads, applies one editing command through the
//! `QuadEditor` API and writes the result back.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use quadwarp::config::Config;
use quadwarp::{Homography, Point, Quad, QuadEditor, Rect};

/// QuadWarp - edit and inspect a quad-to-quad perspective warp
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "quadwarp.toml")]
    config: PathBuf,

    /// Quad warp document (overrides the configured path)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a fresh document with destination equal to source
    Init {
        /// Source rectangle: x y width height
        #[arg(long, num_args = 4, value_names = ["X", "Y", "W", "H"])]
        source: Option<Vec<f64>>,
    },
    /// Print both quads and the forward/inverse transforms
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Set the source quad from a rectangle
    SetSource {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        width: f64,
        height: f64,
    },
    /// Set destination corners from x/y pairs (up to four)
    SetTarget {
        #[arg(num_args = 2..=8, allow_negative_numbers = true)]
        coords: Vec<f64>,
    },
    /// Move one destination corner (0=TL, 1=TR, 2=BR, 3=BL)
    Corner {
        index: usize,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    /// Collapse the destination back onto the source
    Reset,
    /// Map a point through the transform
    Map {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        /// Use the destination -> source transform
        #[arg(long)]
        inverse: bool,
    },
    /// Test whether a point falls on the warped quad
    Hit {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
}

#[derive(Serialize)]
struct Report {
    source: Quad,
    destination: Quad,
    transform: Option<Homography>,
    inverse: Option<Homography>,
    error: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    info!("QuadWarp v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_create(&args.config)?;
    let path = args.file.clone().unwrap_or_else(|| config.document.path.clone());

    let mut editor = QuadEditor::from_config(&config.editor);

    let fresh = matches!(args.command, Command::Init { .. });
    if !fresh && path.exists() {
        editor
            .load(&path)
            .with_context(|| format!("Failed to load quad warp from {:?}", path))?;
    } else if !fresh {
        info!("No document at {:?}, using configured defaults", path);
    }

    match args.command {
        Command::Init { source } => {
            if let Some(r) = source {
                editor.set_source_rect(Rect::new(r[0], r[1], r[2], r[3]));
            }
            editor.reset();
            editor.save(&path)?;
        }
        Command::Show { json } => show(&editor, json)?,
        Command::SetSource {
            x,
            y,
            width,
            height,
        } => {
            editor.set_source_rect(Rect::new(x, y, width, height));
            editor.save(&path)?;
        }
        Command::SetTarget { coords } => {
            if coords.len() % 2 != 0 {
                bail!("set-target expects x/y pairs, got {} values", coords.len());
            }
            let points: Vec<Point> = coords.chunks(2).map(|c| Point::new(c[0], c[1])).collect();
            editor.set_target_points(&points);
            editor.save(&path)?;
        }
        Command::Corner { index, x, y } => {
            editor.set_corner(index, Point::new(x, y))?;
            editor.save(&path)?;
        }
        Command::Reset => {
            editor.reset();
            editor.save(&path)?;
        }
        Command::Map { x, y, inverse } => {
            let h = if inverse {
                editor.inverse_transform()?
            } else {
                editor.transform()?
            };
            match h.apply(Point::new(x, y)) {
                Some(p) => println!("{} {}", p.x, p.y),
                None => bail!("({}, {}) maps to infinity", x, y),
            }
        }
        Command::Hit { x, y } => {
            println!("{}", editor.hit_test(Point::new(x, y)));
        }
    }

    Ok(())
}

fn show(editor: &QuadEditor, json: bool) -> Result<()> {
    let (transform, inverse, error) = match (editor.transform(), editor.inverse_transform()) {
        (Ok(h), Ok(inv)) => (Some(h), Some(inv), None),
        (Err(e), _) | (_, Err(e)) => (None, None, Some(e.to_string())),
    };
    let report = Report {
        source: editor.source(),
        destination: editor.destination(),
        transform,
        inverse,
        error,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
        return Ok(());
    }

    print_quad("src", &report.source);
    print_quad("dst", &report.destination);
    match (&report.transform, &report.inverse) {
        (Some(h), Some(inv)) => {
            print_matrix("transform", h);
            print_matrix("inverse", inv);
        }
        _ => println!("transform: unavailable ({})", report.error.unwrap_or_default()),
    }
    Ok(())
}

fn print_quad(label: &str, quad: &Quad) {
    println!("{label}:");
    for (corner, p) in quad.iter() {
        println!("  {:<13} {:>12.4} {:>12.4}", corner.label(), p.x, p.y);
    }
}

fn print_matrix(label: &str, h: &Homography) {
    println!("{label}:");
    for row in h.rows() {
        println!("  {:>14.8} {:>14.8} {:>14.8}", row[0], row[1], row[2]);
    }
}
