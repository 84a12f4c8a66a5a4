// ============================================================================
// PixelForge CLI: headless selection + filter batch processing
// ============================================================================
//
// Usage examples:
//   pixelforge -i photo.png --seed 40,60 --sensitivity 0.2 --brightness 0.1 -o out.png
//   pixelforge -i photo.jpg --preset "Cinematic 40" -o graded.jpg
//   pixelforge -i shots/*.png --seed 0,0 --mode subtract --duotone 0.5 --output-dir out/
//   pixelforge -i photo.png --seed 10,10 --feather 2 --mask-out mask.png -o out.png
//   pixelforge --list-presets --presets-per-category 3
//
// Per file: load → crop → magic wand seeds → preset → filter overrides →
// render → save. Seeds refer to the cropped image.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::{GrayImage, RgbaImage};

use crate::canvas::SelectionMode;
use crate::components::presets::{find_preset, generate_presets, Preset, DEFAULT_PRESETS_PER_CATEGORY};
use crate::ops::adjustments::FilterState;
use crate::ops::color_metric::ColorMetric;
use crate::ops::crop::CropRect;
use crate::ops::selection::MagicWandSettings;
use crate::session::EditSession;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixelForge headless image processor.
///
/// Select regions with the magic wand and apply color filters and presets
/// to image files.
#[derive(Parser, Debug)]
#[command(
    name = "pixelforge",
    about = "PixelForge headless magic-wand and color-filter processor",
    long_about = "Select regions with a magic wand and run the color pipeline on image\n\
                  files. Supports PNG, JPEG, WEBP, BMP, TGA and TIFF.\n\n\
                  Example:\n  \
                  pixelforge -i photo.png --seed 40,60 --brightness 0.1 -o out.png\n  \
                  pixelforge -i *.jpg --preset \"Vintage 50\" --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, num_args = 1.., required_unless_present = "list_presets")]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, webp, bmp, tga, tiff.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Crop the input to X,Y,W,H before anything else.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_rect)]
    pub crop: Option<CropRect>,

    /// Magic wand seed point. Repeat for several clicks; each click uses --mode.
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pub seed: Vec<(u32, u32)>,

    /// Magic wand color tolerance (0..1).
    #[arg(long, default_value_t = 0.125, value_name = "0-1")]
    pub sensitivity: f32,

    /// Color distance: rgb or lab.
    #[arg(long, default_value = "rgb", value_parser = parse_metric)]
    pub metric: ColorMetric,

    /// Stop the selection at strong local edges.
    #[arg(long)]
    pub gradient_aware: bool,

    /// Edge tolerance used with --gradient-aware (0..1).
    #[arg(long, default_value_t = 0.35, value_name = "0-1")]
    pub edge_smoothness: f32,

    /// Box-feather radius in pixels (0 = off).
    #[arg(long, default_value_t = 0.0, value_name = "PX")]
    pub feather: f32,

    /// How each click combines with the selection: replace, add, subtract, intersect.
    #[arg(long, default_value = "replace", value_parser = parse_mode)]
    pub mode: SelectionMode,

    /// Brightness (-1..1).
    #[arg(long, allow_hyphen_values = true)]
    pub brightness: Option<f32>,

    /// Contrast (-1..1).
    #[arg(long, allow_hyphen_values = true)]
    pub contrast: Option<f32>,

    /// Temperature (-1..1), warm is positive.
    #[arg(long, allow_hyphen_values = true)]
    pub temperature: Option<f32>,

    /// Tint (-1..1).
    #[arg(long, allow_hyphen_values = true)]
    pub tint: Option<f32>,

    /// Duotone (0..1).
    #[arg(long)]
    pub duotone: Option<f32>,

    /// Bloom (0..1).
    #[arg(long)]
    pub bloom: Option<f32>,

    /// Glitch (0..1).
    #[arg(long)]
    pub glitch: Option<f32>,

    /// Apply a generated preset by name ("Cinematic 12") or id.
    /// Explicit filter flags are applied on top of the preset controls.
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Presets generated per category for --preset and --list-presets.
    #[arg(long, default_value_t = DEFAULT_PRESETS_PER_CATEGORY, value_name = "N")]
    pub presets_per_category: usize,

    /// Print every generated preset and exit.
    #[arg(long)]
    pub list_presets: bool,

    /// Write the selection as a grayscale PNG. Only valid for single-file input.
    #[arg(long, value_name = "FILE")]
    pub mask_out: Option<PathBuf>,

    /// Print per-file selection and timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Wand settings described by the flags.
    pub fn wand_settings(&self) -> MagicWandSettings {
        MagicWandSettings::default()
            .with_sensitivity(self.sensitivity)
            .with_color_metric(self.metric)
            .with_gradient_aware(self.gradient_aware)
            .with_edge_smoothness(self.edge_smoothness)
            .with_feather_radius(self.feather)
            .with_mode(self.mode)
    }

    /// `base` with every filter flag that was given written over it.
    pub fn filter_overrides(&self, base: &FilterState) -> FilterState {
        FilterState {
            brightness: self.brightness.unwrap_or(base.brightness),
            contrast: self.contrast.unwrap_or(base.contrast),
            temperature: self.temperature.unwrap_or(base.temperature),
            tint: self.tint.unwrap_or(base.tint),
            duotone: self.duotone.unwrap_or(base.duotone),
            bloom: self.bloom.unwrap_or(base.bloom),
            glitch: self.glitch.unwrap_or(base.glitch),
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    if args.list_presets {
        for preset in generate_presets(args.presets_per_category) {
            println!("{:<24} {}", preset.name, preset.id);
        }
        return ExitCode::SUCCESS;
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && (args.output.is_some() || args.mask_out.is_some()) {
        eprintln!(
            "error: {} input files given but --output/--mask-out only accept a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let preset = match &args.preset {
        Some(name) => {
            let presets = generate_presets(args.presets_per_category);
            match find_preset(&presets, name) {
                Some(p) => Some(p.clone()),
                None => {
                    eprintln!("error: unknown preset '{}'. Try --list-presets.", name);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => None,
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let extension = output_extension(args.format.as_deref(), args.output.as_deref());
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), extension)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };
        match run_one(input_path, &output_path, args.mask_out.as_deref(), &args, preset.as_ref()) {
            Ok(()) => {
                crate::log_info!("cli: {} -> {}", input_path.display(), output_path.display());
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                crate::log_err!("cli: {}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    mask_out: Option<&Path>,
    args: &CliArgs,
    preset: Option<&Preset>,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let source = image::open(input)
        .map_err(|e| format!("load failed: {}", e))?
        .into_rgba8();
    let name = input
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let mut session = EditSession::new(source).with_name(name);

    // -- Step 2: Crop ----------------------------------------------------
    if let Some(rect) = args.crop {
        session
            .crop_source(rect)
            .map_err(|e| format!("crop failed: {}", e))?;
    }

    // -- Step 3: Select --------------------------------------------------
    session.set_wand(args.wand_settings());
    for &(x, y) in &args.seed {
        let mask = session
            .magic_wand(x, y)
            .map_err(|e| format!("magic wand failed: {}", e))?;
        if args.verbose {
            let b = mask.bounds;
            println!(
                "  seed ({}, {}): {} px selected, bounds {}x{} at ({}, {})",
                x,
                y,
                mask.selected_count(),
                b.width,
                b.height,
                b.x,
                b.y
            );
        }
    }

    // -- Step 4: Preset + filters ----------------------------------------
    if let Some(p) = preset {
        session.apply_preset(p);
    }
    let filters = args.filter_overrides(session.filters());
    session.set_filters(filters);

    // -- Step 5: Render + save -------------------------------------------
    let rendered = session
        .render(0)
        .map_err(|e| format!("render failed: {}", e))?;
    save_image(&rendered, output)?;

    if let Some(path) = mask_out {
        let (w, h) = session.source().dimensions();
        let mask = GrayImage::from_raw(w, h, session.export_mask())
            .ok_or_else(|| "mask has invalid dimensions".to_string())?;
        mask.save(path)
            .map_err(|e| format!("mask save failed: {}", e))?;
    }

    Ok(())
}

/// Encode by file extension. JPEG has no alpha channel, so it gets RGB.
fn save_image(img: &RgbaImage, path: &Path) -> Result<(), String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let result = match ext.as_str() {
        "jpg" | "jpeg" => image::DynamicImage::ImageRgba8(img.clone()).to_rgb8().save(path),
        _ => img.save(path),
    };
    result.map_err(|e| format!("save failed: {}", e))
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// File extension for output: from `--format`, else from `--output`, else png.
fn output_extension(format_arg: Option<&str>, output: Option<&Path>) -> &'static str {
    let from_name = |name: &str| match name.to_lowercase().as_str() {
        "jpeg" | "jpg" => "jpg",
        "webp" => "webp",
        "bmp" => "bmp",
        "tga" => "tga",
        "tiff" | "tif" => "tiff",
        _ => "png",
    };

    if let Some(f) = format_arg {
        return from_name(f);
    }
    if let Some(ext) = output.and_then(|o| o.extension()).and_then(|e| e.to_str()) {
        return from_name(ext);
    }
    "png"
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    ext: &str,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

fn parse_point(s: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [x, y] => {
            let x = x.parse::<u32>().map_err(|e| format!("bad x '{}': {}", x, e))?;
            let y = y.parse::<u32>().map_err(|e| format!("bad y '{}': {}", y, e))?;
            Ok((x, y))
        }
        _ => Err(format!("expected X,Y but got '{}'", s)),
    }
}

fn parse_rect(s: &str) -> Result<CropRect, String> {
    let values = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("bad number '{}': {}", p, e)))
        .collect::<Result<Vec<f32>, String>>()?;
    match values.as_slice() {
        [x, y, w, h] => Ok(CropRect::new(*x, *y, *w, *h)),
        _ => Err(format!("expected X,Y,W,H but got '{}'", s)),
    }
}

fn parse_metric(s: &str) -> Result<ColorMetric, String> {
    ColorMetric::from_name(s).ok_or_else(|| format!("unknown metric '{}' (use rgb or lab)", s))
}

fn parse_mode(s: &str) -> Result<SelectionMode, String> {
    SelectionMode::from_label(&s.to_lowercase())
        .ok_or_else(|| format!("unknown mode '{}' (use replace, add, subtract, intersect)", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points_and_rects() {
        assert_eq!(parse_point("12, 7"), Ok((12, 7)));
        assert!(parse_point("12").is_err());
        assert!(parse_point("-1,2").is_err());
        assert_eq!(parse_rect("1,2,30.5,40"), Ok(CropRect::new(1.0, 2.0, 30.5, 40.0)));
        assert!(parse_rect("1,2,3").is_err());
    }

    #[test]
    fn output_path_rules() {
        let input = Path::new("shots/a.png");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.jpg")), None, "jpg"),
            Some(PathBuf::from("x.jpg"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), "webp"),
            Some(PathBuf::from("out/a.webp"))
        );
        assert_eq!(
            build_output_path(input, None, None, "png"),
            Some(PathBuf::from("shots/a_out.png"))
        );
        assert_eq!(output_extension(None, Some(Path::new("a.JPEG"))), "jpg");
        assert_eq!(output_extension(Some("tif"), None), "tiff");
        assert_eq!(output_extension(None, None), "png");
    }

    #[test]
    fn flags_map_to_settings() {
        let args = CliArgs::try_parse_from([
            "pixelforge",
            "-i",
            "a.png",
            "--seed",
            "3,4",
            "--seed",
            "5,6",
            "--metric",
            "lab",
            "--mode",
            "subtract",
            "--sensitivity",
            "2",
            "--brightness",
            "-0.2",
        ])
        .unwrap();
        assert_eq!(args.seed, vec![(3, 4), (5, 6)]);
        let wand = args.wand_settings();
        assert_eq!(wand.color_metric, ColorMetric::Lab);
        assert_eq!(wand.mode, SelectionMode::Subtract);
        assert_eq!(wand.sensitivity, 1.0);
        let base = FilterState { tint: 0.5, brightness: 0.9, ..Default::default() };
        let f = args.filter_overrides(&base);
        assert_eq!(f.brightness, -0.2);
        assert_eq!(f.tint, 0.5);
    }

    #[test]
    fn list_presets_needs_no_input() {
        let args = CliArgs::try_parse_from(["pixelforge", "--list-presets"]).unwrap();
        assert!(args.list_presets);
        assert!(CliArgs::try_parse_from(["pixelforge"]).is_err());
    }
}
