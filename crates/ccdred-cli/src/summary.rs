use std::path::Path;

use ccdred_core::photometry::PhotometryResult;
use ccdred_core::pipeline::{CalibrationSummary, ReductionSummary, RunConfig, RunSummary};
use console::Style;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    warning: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            warning: Style::new().yellow().bold(),
            path: Style::new().underlined(),
        }
    }
}

fn rule(len: usize) -> String {
    "\u{2550}".repeat(len)
}

pub fn print_run_header(config: &RunConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("CCD Reduction"));
    println!("  {}", s.title.apply_to(rule(13)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Data"),
        s.path.apply_to(config.data_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output_dir.display())
    );
    println!();

    println!("  {}", s.header.apply_to("Stacking"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Combine"),
        s.method.apply_to(config.stacking.combine)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Sigma"),
        s.value.apply_to(config.stacking.sigma)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(config.stacking.max_iterations)
    );
    if config.calibration.use_dark {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Dark"),
            s.method.apply_to("scaled by exposure")
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Dark"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Photometry"));
    println!(
        "    {:<12}{:?}",
        s.label.apply_to("Radii"),
        config.photometry.radii
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Sky"),
        s.value.apply_to(format!(
            "{} .. {} px",
            config.photometry.sky_radius_in,
            config.photometry.sky_radius_out()
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Centroid"),
        s.method.apply_to(config.centroid.method)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Sub-runs"),
        s.value.apply_to(config.lightcurve.sub_runs.len())
    );
    println!();
}

pub fn print_calibration_summary(summary: &CalibrationSummary) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Masters"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Bias frames"),
        s.value.apply_to(summary.bias_frames)
    );
    if summary.dark_frames > 0 {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Dark frames"),
            s.value.apply_to(summary.dark_frames)
        );
    } else {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Dark frames"),
            s.disabled.apply_to("none")
        );
    }
    if let Some(t) = summary.dark_reference_exposure {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Dark exposure"),
            s.value.apply_to(format!("{t} s"))
        );
    }
    println!(
        "    {:<14}{}",
        s.label.apply_to("Flat frames"),
        s.value.apply_to(summary.flat_frames)
    );
    if let Some(norm) = summary.flat_normalization {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Flat median"),
            s.value.apply_to(format!("{norm:.2} ADU"))
        );
    }
    if summary.undefined_pixels > 0 {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Undefined"),
            s.warning.apply_to(format!("{} px", summary.undefined_pixels))
        );
    }
    for path in &summary.master_paths {
        println!("    {:<14}{}", "", s.path.apply_to(path.display()));
    }
    println!();

    println!("  {}", s.header.apply_to("Detector"));
    match &summary.gain {
        Some(gain) => println!(
            "    {:<14}{}",
            s.label.apply_to("Gain"),
            s.value.apply_to(format!("{:.3} e-/ADU", gain.gain))
        ),
        None => println!(
            "    {:<14}{}",
            s.label.apply_to("Gain"),
            s.disabled.apply_to("not estimated")
        ),
    }
    match &summary.readout_noise {
        Some(noise) => println!(
            "    {:<14}{}",
            s.label.apply_to("Read noise"),
            s.value.apply_to(format!("{:.3} e- ({:.3} ADU)", noise.electrons, noise.adu))
        ),
        None => println!(
            "    {:<14}{}",
            s.label.apply_to("Read noise"),
            s.disabled.apply_to("not estimated")
        ),
    }
    if !summary.skipped.is_empty() {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Skipped"),
            s.warning.apply_to(format!("{} calibration file(s)", summary.skipped.len()))
        );
    }
    println!();
}

pub fn print_reduction_summary(summary: &ReductionSummary) {
    let s = Styles::new();

    println!("  {}", s.header.apply_to("Science"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Reduced"),
        s.value.apply_to(summary.reduced)
    );
    print_guarded(&s, summary.guarded_pixels);
    for failure in &summary.failures {
        println!(
            "    {:<14}{}",
            s.label.apply_to(format!("Frame {}", failure.index + 1)),
            s.warning.apply_to(&failure.reason)
        );
    }
    println!();
}

pub fn print_run_summary(summary: &RunSummary) {
    let s = Styles::new();
    let curve = &summary.report.curve;

    println!("  {}", s.header.apply_to("Light Curve"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Reduced"),
        s.value.apply_to(summary.reduced)
    );
    print_guarded(&s, summary.guarded_pixels);
    println!(
        "    {:<14}{}",
        s.label.apply_to("Points"),
        s.value.apply_to(curve.len())
    );
    if let Some(span) = curve.relative_minutes().last() {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Span"),
            s.value.apply_to(format!("{span:.1} min"))
        );
    }
    if summary.report.flagged > 0 {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Flagged"),
            s.warning.apply_to(summary.report.flagged)
        );
    }
    for failure in &summary.report.failures {
        println!(
            "    {:<14}{}",
            s.label.apply_to(format!("Frame {}", failure.index + 1)),
            s.warning.apply_to(&failure.reason)
        );
    }
    for path in &summary.artifacts {
        println!("    {:<14}{}", "", s.path.apply_to(path.display()));
    }
    println!();
}

fn print_guarded(s: &Styles, guarded: usize) {
    if guarded > 0 {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Guarded"),
            s.warning.apply_to(format!("{guarded} px (flat below floor)"))
        );
    }
}

/// Per-position table of flux against radius.
pub fn print_photometry(file: &Path, result: &PhotometryResult) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Aperture Photometry"));
    println!("  {}", s.title.apply_to(rule(19)));
    println!("  {}", s.path.apply_to(file.display()));
    println!();

    for p in &result.positions {
        println!("  {}", s.header.apply_to(format!("Star at {}", p.position)));
        println!(
            "    {:>8} {:>14} {:>14} {:>10} {:>10}  {}",
            s.label.apply_to("radius"),
            s.label.apply_to("flux"),
            s.label.apply_to("raw"),
            s.label.apply_to("sky/px"),
            s.label.apply_to("ratio"),
            s.label.apply_to("status"),
        );
        for (m, (_, ratio)) in p.measurements.iter().zip(p.radial_profile()) {
            let status = if m.status.is_valid() {
                s.method.apply_to(m.status.to_string())
            } else {
                s.warning.apply_to(m.status.to_string())
            };
            println!(
                "    {:>8.2} {:>14.2} {:>14.2} {:>10.3} {:>10.4}  {}",
                m.radius, m.flux, m.raw_flux, m.background_per_pixel, ratio, status
            );
        }
        println!();
    }
}
