// ============================================================================
// Wipe CLI: headless erase + annotate via command-line arguments
// ============================================================================
//
// Usage examples:
//   wipe -i photo.png --stroke "10,10;200,40" --brush-size 30
//   wipe -i shot.jpg --mask mask.png --text "20,20,48,Georgia:Sold" -o out.png
//   wipe -i "shots/*.png" --mask mask.png --output-dir cleaned/ --format tiff
//
// Strokes and text positions are given in display space: the image is
// assumed to be shown `--display-width` pixels wide (default: native width).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::RgbaImage;

use crate::canvas::{DisplayRect, Point, Size};
use crate::components::text_overlay::TextUpdate;
use crate::io::{ExportFormat, TiffCompression, decode_upload, encode_and_write, read_upload};
use crate::ops::text::FontBook;
use crate::project::Session;
use crate::settings::EditorSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Wipe headless image eraser.
#[derive(Parser, Debug)]
#[command(
    name = "wipe",
    about = "Erase painted regions from images and stamp text over the result",
    long_about = "Replay brush strokes (or import a mask image) over each input, erase\n\
                  the covered pixels to transparency, optionally burn in text and\n\
                  write a lossless export.\n\n\
                  Example:\n  \
                  wipe -i photo.png --stroke \"10,10;200,40\" --brush-size 30\n  \
                  wipe -i *.jpg --mask mask.png --output-dir out/ --format png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// A brush stroke as display-space points "x,y;x,y;...". Repeatable.
    #[arg(short, long, value_name = "POINTS", allow_hyphen_values = true)]
    pub stroke: Vec<String>,

    /// Coverage image; every pixel with non-zero alpha is erased.
    #[arg(short, long, value_name = "MASK.png")]
    pub mask: Option<PathBuf>,

    /// Brush width in display pixels (default from settings, 20).
    #[arg(short, long, value_name = "PX")]
    pub brush_size: Option<f32>,

    /// On-screen width the strokes and text were authored against.
    #[arg(short, long, value_name = "PX")]
    pub display_width: Option<f32>,

    /// Text overlay "X,Y[,SIZE[,FAMILY]]:CONTENT". `\n` starts a new line. Repeatable.
    #[arg(short, long, value_name = "TEXT", allow_hyphen_values = true)]
    pub text: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing; files keep the suggested export name.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, tiff, bmp, tga.
    /// When omitted, the format is inferred from --output's extension, then settings.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// TIFF compression mode: none, lzw, deflate (default: none).
    #[arg(long, default_value = "none", value_name = "MODE")]
    pub tiff_compression: String,

    /// Settings file to use instead of the user's saved settings.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Persist the effective settings (after --brush-size / --format) to
    /// --config, or to the user's settings file.
    #[arg(long)]
    pub save_settings: bool,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parsed `--text` argument.
#[derive(Clone, Debug, PartialEq)]
pub struct TextArg {
    pub x: f32,
    pub y: f32,
    pub font_size: Option<f32>,
    pub font_family: Option<String>,
    pub content: String,
}

/// Everything that is the same for every input file.
struct Job {
    settings: EditorSettings,
    strokes: Vec<Vec<Point>>,
    mask: Option<RgbaImage>,
    texts: Vec<TextArg>,
    display_width: Option<f32>,
    tiff_compression: TiffCompression,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let job = match build_job(&args) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.save_settings {
        let saved = match &args.config {
            Some(path) => job.settings.save_to(path).map(|()| path.clone()),
            None => job.settings.save(),
        };
        match saved {
            Ok(path) => {
                crate::log_info!("Saved settings to {}", path.display());
            }
            Err(e) => {
                crate::log_warn!("Could not save settings: {}", e);
                eprintln!("warning: could not save settings: {}", e);
            }
        }
    }

    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "error: could not create output directory '{}': {}",
                dir.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    }

    let mut fonts = FontBook::system();
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        match run_one(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            &job,
            &mut fonts,
        ) {
            Ok(output_path) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                crate::log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn build_job(args: &CliArgs) -> Result<Job, String> {
    let mut settings = match &args.config {
        Some(path) => EditorSettings::load_from(path),
        None => EditorSettings::load(),
    };
    if let Some(size) = args.brush_size {
        if size <= 0.0 {
            return Err(format!("brush size must be positive, got {}", size));
        }
        settings.brush_size = size;
    }
    settings.export_format = parse_format(args.format.as_deref(), args.output.as_deref(), settings.export_format)?;

    let strokes = args
        .stroke
        .iter()
        .map(|s| parse_stroke(s))
        .collect::<Result<Vec<_>, _>>()?;
    let texts = args
        .text
        .iter()
        .map(|s| parse_text(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mask = match &args.mask {
        Some(path) => {
            let (name, bytes) = read_upload(path).map_err(|e| e.to_string())?;
            Some(decode_upload(&name, &bytes).map_err(|e| e.to_string())?)
        }
        None => None,
    };

    if strokes.is_empty() && mask.is_none() {
        return Err("nothing to erase: give at least one --stroke or a --mask".to_string());
    }
    if matches!(args.display_width, Some(w) if w <= 0.0) {
        return Err("display width must be positive".to_string());
    }

    Ok(Job {
        settings,
        strokes,
        mask,
        texts,
        display_width: args.display_width,
        tiff_compression: TiffCompression::from_name(&args.tiff_compression),
    })
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input:      &Path,
    output:     Option<&Path>,
    output_dir: Option<&Path>,
    job:        &Job,
    fonts:      &mut FontBook,
) -> Result<PathBuf, String> {
    // -- Step 1: Upload --------------------------------------------------
    let mut session = Session::new(job.settings.clone());
    let source = read_upload(input).map_err(|e| e.to_string())?;
    let mut results = session.upload([source]);
    results
        .pop()
        .ok_or_else(|| "nothing was uploaded".to_string())?
        .map_err(|e| format!("load failed: {}", e))?;

    let (w, h) = session
        .active_slot()
        .map(|s| (s.width(), s.height()))
        .ok_or_else(|| "no active image".to_string())?;
    let rect = DisplayRect::fit_width(job.display_width.unwrap_or(w as f32), w, h);
    session.set_display_rect(rect);

    // -- Step 2: Paint the mask ------------------------------------------
    if let Some(mask) = &job.mask {
        session.import_mask(mask);
    }
    for points in &job.strokes {
        let Some((first, rest)) = points.split_first() else { continue };
        session.begin_stroke(*first);
        for p in rest {
            session.extend_stroke(*p);
        }
        session.end_stroke();
    }

    // -- Step 3: Erase ---------------------------------------------------
    session.process().map_err(|e| format!("process failed: {}", e))?;

    // -- Step 4: Text ----------------------------------------------------
    for arg in &job.texts {
        let id = session.add_text();
        session.texts_mut().update(
            id,
            TextUpdate {
                content: Some(arg.content.clone()),
                x: Some(arg.x),
                y: Some(arg.y),
                font_size: arg.font_size,
                font_family: arg.font_family.clone(),
            },
        );
    }

    // -- Step 5: Export --------------------------------------------------
    let export = session
        .export(Size::new(rect.width, rect.height), fonts)
        .map_err(|e| format!("export failed: {}", e))?;
    let output_path = build_output_path(input, output, output_dir, &export.filename);
    encode_and_write(&export.image, &output_path, job.settings.export_format, job.tiff_compression)
        .map_err(|e| format!("save failed: {}", e))?;

    Ok(output_path)
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

/// `--format` wins, then `--output`'s extension, then the settings default.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>, fallback: ExportFormat) -> Result<ExportFormat, String> {
    if let Some(f) = format_arg {
        return ExportFormat::from_name(f)
            .ok_or_else(|| format!("unsupported format '{}' (expected png, tiff, bmp or tga)", f));
    }
    Ok(output.and_then(ExportFormat::from_path).unwrap_or(fallback))
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("point '{}' is not \"x,y\"", s))?;
    let x = x.trim().parse::<f32>().map_err(|_| format!("bad x in point '{}'", s))?;
    let y = y.trim().parse::<f32>().map_err(|_| format!("bad y in point '{}'", s))?;
    Ok(Point::new(x, y))
}

/// `"x,y;x,y;..."` → points. Empty segments are skipped.
pub fn parse_stroke(s: &str) -> Result<Vec<Point>, String> {
    let points = s
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(parse_point)
        .collect::<Result<Vec<_>, _>>()?;
    if points.is_empty() {
        return Err(format!("stroke '{}' has no points", s));
    }
    Ok(points)
}

/// `"X,Y[,SIZE[,FAMILY]]:CONTENT"`. The literal `\n` in CONTENT is a line break.
pub fn parse_text(s: &str) -> Result<TextArg, String> {
    let (head, content) = s
        .split_once(':')
        .ok_or_else(|| format!("text '{}' is missing ':CONTENT'", s))?;
    let mut fields = head.splitn(4, ',').map(str::trim);
    let mut number = |what: &str| -> Result<Option<f32>, String> {
        match fields.next() {
            Some(v) if !v.is_empty() => v
                .parse::<f32>()
                .map(Some)
                .map_err(|_| format!("bad {} '{}' in text '{}'", what, v, s)),
            _ => Ok(None),
        }
    };
    let x = number("x")?.ok_or_else(|| format!("text '{}' needs X,Y", s))?;
    let y = number("y")?.ok_or_else(|| format!("text '{}' needs X,Y", s))?;
    let font_size = number("size")?;
    if matches!(font_size, Some(v) if v <= 0.0) {
        return Err(format!("font size in '{}' must be positive", s));
    }
    let font_family = fields.next().filter(|f| !f.is_empty()).map(str::to_string);

    Ok(TextArg {
        x,
        y,
        font_size,
        font_family,
        content: content.replace("\\n", "\n"),
    })
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` joined with the suggested export name
/// 3. The suggested export name next to the input
fn build_output_path(
    input:      &Path,
    output:     Option<&Path>,
    output_dir: Option<&Path>,
    filename:   &str,
) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }
    if let Some(dir) = output_dir {
        return dir.join(filename);
    }
    input.parent().unwrap_or(Path::new(".")).join(filename)
}
