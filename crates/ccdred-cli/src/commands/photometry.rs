use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use ccdred_core::centroid::{refine_positions, CentroidConfig, CentroidMethod};
use ccdred_core::frame::FrameKind;
use ccdred_core::io::fits::{read_frame, HeaderKeys};
use ccdred_core::photometry::{ApertureSpec, Photometer, PixelPosition};
use clap::{Args, ValueEnum};

#[derive(Clone, ValueEnum)]
pub enum CentroidArg {
    None,
    CenterOfMass,
    Quadratic,
}

#[derive(Args)]
pub struct PhotometryArgs {
    /// Calibrated FITS frame
    pub file: PathBuf,

    /// Star position as X,Y in pixels (repeatable)
    #[arg(long = "at", required = true)]
    pub positions: Vec<String>,

    /// Comma-separated aperture radii in pixels
    #[arg(long, default_value = "2,4,6,8,10,12,14")]
    pub radii: String,

    /// Inner radius of the sky annulus
    #[arg(long, default_value = "18")]
    pub sky_inner: f64,

    /// Width of the sky annulus
    #[arg(long, default_value = "4")]
    pub sky_width: f64,

    /// Centroid refinement before measuring
    #[arg(long, value_enum, default_value = "quadratic")]
    pub centroid: CentroidArg,

    /// Centroid search box edge in pixels
    #[arg(long, default_value = "15")]
    pub box_size: usize,
}

pub fn run(args: &PhotometryArgs) -> Result<()> {
    let frame = read_frame(&args.file, FrameKind::Science, &HeaderKeys::default(), None)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let nominal = args
        .positions
        .iter()
        .map(|s| parse_position(s))
        .collect::<Result<Vec<_>>>()?;
    let radii = parse_radii(&args.radii)?;

    let view = frame.data.view();
    let positions = match args.centroid {
        CentroidArg::None => nominal,
        CentroidArg::CenterOfMass | CentroidArg::Quadratic => {
            let method = if matches!(args.centroid, CentroidArg::CenterOfMass) {
                CentroidMethod::CenterOfMass
            } else {
                CentroidMethod::Quadratic
            };
            let config = CentroidConfig {
                method,
                box_size: args.box_size,
            };
            refine_positions(&view, &nominal, &config).positions
        }
    };

    let photometer = Photometer::new(ApertureSpec {
        radii,
        sky_radius_in: args.sky_inner,
        sky_annulus_width: args.sky_width,
    });
    let result = photometer.measure(&view, &positions);

    crate::summary::print_photometry(&args.file, &result);
    Ok(())
}

fn parse_position(s: &str) -> Result<PixelPosition> {
    let Some((x, y)) = s.split_once(',') else {
        bail!("Position '{s}' must be X,Y");
    };
    let x: f64 = x.trim().parse().with_context(|| format!("Bad X in '{s}'"))?;
    let y: f64 = y.trim().parse().with_context(|| format!("Bad Y in '{s}'"))?;
    Ok(PixelPosition::new(x, y))
}

fn parse_radii(s: &str) -> Result<Vec<f64>> {
    let radii = s
        .split(',')
        .map(|r| {
            r.trim()
                .parse::<f64>()
                .with_context(|| format!("Bad radius '{r}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    if radii.is_empty() || radii.iter().any(|r| *r <= 0.0) {
        bail!("Radii must be positive");
    }
    Ok(radii)
}
