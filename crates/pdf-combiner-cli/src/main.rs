//! PDF Combiner CLI - Command line tool for annotating and merging PDF documents.

mod layout;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_combiner_core::{AppConfig, EntryId, PageModel, PdfCombiner, ScreenPoint, TextColor};
use std::path::PathBuf;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use layout::{Layout, OverlaySpec, parse_order};

#[derive(Debug, Clone, ValueEnum)]
enum ColorOption {
    Black,
    Red,
    DarkRed,
    Blue,
    DarkGreen,
    Purple,
}

impl From<ColorOption> for TextColor {
    fn from(opt: ColorOption) -> Self {
        match opt {
            ColorOption::Black => Self::black(),
            ColorOption::Red => Self::red(),
            ColorOption::DarkRed => Self::dark_red(),
            ColorOption::Blue => Self::blue(),
            ColorOption::DarkGreen => Self::dark_green(),
            ColorOption::Purple => Self::purple(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pdf-combine")]
#[command(author, version, about = "Annotate PDF pages with text and merge them", long_about = None)]
struct Args {
    /// Input PDF files, in order
    inputs: Vec<PathBuf>,

    /// Output PDF file (default: <first input>-combined.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Page order over all loaded pages (e.g. "3,1-2"); unlisted pages are dropped
    #[arg(long)]
    order: Option<String>,

    /// Add text as PAGE:X,Y:TEXT (points from the top-left of the page, PAGE after reordering)
    #[arg(long = "text", value_name = "PAGE:X,Y:TEXT")]
    texts: Vec<String>,

    /// Font family for --text overlays
    #[arg(long)]
    font: Option<String>,

    /// Font size in points for --text overlays
    #[arg(long)]
    size: Option<f32>,

    /// Bold --text overlays
    #[arg(long)]
    bold: bool,

    /// Italic --text overlays
    #[arg(long)]
    italic: bool,

    /// Color of --text overlays
    #[arg(long, value_enum)]
    color: Option<ColorOption>,

    /// TOML layout file with inputs, order and overlays
    #[arg(short, long)]
    layout: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the final page list and exit without exporting
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Load or create config
    let config = if let Some(config_path) = &args.config {
        AppConfig::load_layered(Some(config_path.as_path())).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    let layout = match &args.layout {
        Some(path) => Layout::from_file(path)?,
        None => Layout::default(),
    };

    let inputs: Vec<PathBuf> = layout
        .inputs
        .iter()
        .chain(&args.inputs)
        .cloned()
        .collect();
    if inputs.is_empty() {
        bail!("No input files given");
    }

    // Load input PDFs
    let mut combiner = PdfCombiner::new(config);
    let report = combiner.load_files(&inputs);
    for (path, err) in &report.failed {
        warn!("Skipped {}: {}", path.display(), err);
    }
    if combiner.model().is_empty() {
        bail!("None of the input files could be loaded");
    }
    info!(
        "Loaded {} pages from {} files",
        report.page_count(),
        report.loaded.len()
    );

    // Reorder
    if let Some(order) = args.order.as_deref().or(layout.order.as_deref()) {
        let positions = parse_order(order, combiner.model().len())?;
        apply_order(combiner.model_mut(), &positions)?;
    }

    // Overlays
    let mut overlays = layout.overlays.clone();
    let flag_color = args.color.clone().map(|c| TextColor::from(c).to_hex());
    for flag in &args.texts {
        let mut spec = OverlaySpec::parse_flag(flag)?;
        spec.font.clone_from(&args.font);
        spec.size = args.size;
        spec.bold = args.bold;
        spec.italic = args.italic;
        spec.color.clone_from(&flag_color);
        overlays.push(spec);
    }
    for spec in &overlays {
        add_overlay(&mut combiner, spec)?;
    }

    if args.list {
        // CLI output is intentional
        #[allow(clippy::print_stdout)]
        {
            for (i, entry) in combiner.model().entries().iter().enumerate() {
                println!("{:>3}. {}", i + 1, entry.label());
            }
        }
        return Ok(());
    }

    // Determine output path
    let output_path = args.output.or(layout.output).unwrap_or_else(|| {
        let first = &inputs[0];
        let stem = first
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        first.with_file_name(format!("{stem}-combined.pdf"))
    });

    // Setup progress bar
    let pb = ProgressBar::new(combiner.model().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let progress = pb.clone();
    let exporter = combiner
        .exporter()
        .with_progress(move |done, _| progress.set_position(done as u64));
    let summary = exporter
        .export_to_file(&combiner.model().export_pages(), &output_path)
        .context(format!("Failed to export {}", output_path.display()))?;

    pb.finish_with_message("Export complete");

    for path in &summary.changed_sources {
        warn!("{} changed after it was loaded", path.display());
    }

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!(
            "Combined PDF ({} pages) saved to: {}",
            summary.page_count,
            summary.path.display()
        );
    }

    Ok(())
}

/// Keep only the pages at `positions`, in that order.
fn apply_order(model: &mut PageModel, positions: &[usize]) -> Result<()> {
    let ids = model.ids();
    let wanted: Vec<EntryId> = positions.iter().map(|&p| ids[p]).collect();

    for id in ids.iter().filter(|id| !wanted.contains(id)) {
        model.remove(*id)?;
    }
    model
        .reorder(&wanted)
        .context("Page order lists a page more than once")?;
    Ok(())
}

/// Place one overlay, treating its position as points (editor scale 1).
fn add_overlay(combiner: &mut PdfCombiner, spec: &OverlaySpec) -> Result<()> {
    let total = combiner.model().len();
    if spec.page == 0 || spec.page > total {
        bail!("Overlay page {} is out of range (1-{total})", spec.page);
    }
    let id = combiner.model().ids()[spec.page - 1];

    let editor = combiner.open_editor_on(id, 1.0)?;
    let defaults = editor.defaults();
    let font = spec.font(defaults);
    let color = spec.color(defaults.color)?;

    editor
        .add_text_at(
            combiner.model_mut(),
            ScreenPoint::new(spec.x, spec.y),
            spec.text.clone(),
            font,
            color,
        )
        .with_context(|| format!("Failed to add text on page {}", spec.page))?;
    editor.close();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pdf_combiner_core::model::{LoadedPage, LoadedSource, Thumbnail};
    use pdf_combiner_core::pdf::{PageGeometry, placeholder_image};

    fn combiner(pages: usize) -> PdfCombiner {
        let mut combiner = PdfCombiner::default();
        combiner.append_source(LoadedSource {
            path: PathBuf::from("a.pdf"),
            fingerprint: String::new(),
            pages: (0..pages)
                .map(|page_index| LoadedPage {
                    page_index,
                    geometry: PageGeometry::default(),
                    thumbnail: Thumbnail::Rendered(placeholder_image(2, 2)),
                })
                .collect(),
        });
        combiner
    }

    fn page_indices(model: &PageModel) -> Vec<usize> {
        model.entries().iter().map(|e| e.page_index()).collect()
    }

    #[test]
    fn test_apply_order_selects_and_reorders() {
        let mut combiner = combiner(4);
        apply_order(combiner.model_mut(), &[3, 0]).unwrap();
        assert_eq!(page_indices(combiner.model()), [3, 0]);
    }

    #[test]
    fn test_apply_order_rejects_duplicates() {
        let mut combiner = combiner(2);
        assert!(apply_order(combiner.model_mut(), &[1, 1]).is_err());
    }

    #[test]
    fn test_add_overlay_uses_points_from_top_left() {
        let mut combiner = combiner(2);
        let mut spec = OverlaySpec::parse_flag("2:72,36:Hello").unwrap();
        spec.color = Some("blue".to_string());
        add_overlay(&mut combiner, &spec).unwrap();

        let entry = &combiner.model().entries()[1];
        let record = &entry.overlays()[0];
        assert_eq!(record.text, "Hello");
        assert_eq!(record.color, TextColor::blue());
        assert!((record.position.x - 72.0).abs() < 1e-4);
        assert!((record.position.y - (792.0 - 36.0)).abs() < 1e-4);

        let bad = OverlaySpec::parse_flag("3:0,0:x").unwrap();
        assert!(add_overlay(&mut combiner, &bad).is_err());
    }
}
