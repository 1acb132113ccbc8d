// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// filigran — remove watermarks from PDF documents, either by replacing
// watermark colours on rendered pages or by dropping content elements that
// match saved patterns.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{debug, info};

use filigran_core::human_errors::humanize_error;
use filigran_core::{
    AnalyzerConfig, BackgroundFill, Color, FiligranError, PageRange, PatternDefinition,
    RemovalConfig, TargetColorSet, Tolerance,
};
use filigran_document::pdf::PageContents;
use filigran_document::{
    BatchScheduler, CancelToken, ColorRemoval, DocumentAssembler, PageAnalyzer, PageTransform,
    PatternRegistry, PatternRemoval, PdfSource, PdfiumRenderer, RasterPageProcessor, RunSummary,
    bind_pdfium, execute,
};

/// Removal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Replace watermark colours on rendered pages
    Color,
    /// Drop content elements matching saved patterns
    Pattern,
}

/// Remove watermarks from a PDF.
///
/// Page numbers start at 0. Element numbers in --add-patterns start at 1, as
/// printed by the element listing of --page.
#[derive(Parser, Debug)]
#[command(name = "filigran")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input PDF
    input: PathBuf,

    /// Output PDF
    #[arg(short, long, default_value = "output.pdf")]
    output: PathBuf,

    /// Inspect a single page (colour histogram, or element listing in
    /// pattern mode); also the page --add-patterns refers to
    #[arg(long)]
    page: Option<u32>,

    /// First page to process (inclusive)
    #[arg(long)]
    start_page: Option<u32>,

    /// Last page to process (inclusive)
    #[arg(long)]
    end_page: Option<u32>,

    /// Shorthand for --mode color
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "mode")]
    color_mode: bool,

    /// Removal strategy
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Watermark colours, each as R,G,B
    #[arg(long, num_args = 1.., value_name = "R,G,B")]
    colors: Vec<Color>,

    /// Colour match tolerance, 0.0 (exact) to 1.0 (everything)
    #[arg(long, default_value_t = 0.1)]
    tolerance: f64,

    /// Render resolution for colour mode
    #[arg(
        long,
        default_value_t = 200,
        long_help = "Render resolution for colour mode.\n\nEach A4 page held in memory takes about 0.000054 x dpi^2 MB (roughly 2.2 MB at 200 dpi, 4.9 MB at 300 dpi), times --batch-size pages."
    )]
    dpi: u32,

    /// Pages processed between assembly steps
    #[arg(long, default_value_t = 10)]
    batch_size: usize,

    /// Fill for removed pixels: white, transparent or R,G,B
    #[arg(long, default_value = "white")]
    background: BackgroundFill,

    /// Show only the K most frequent colours in the histogram
    #[arg(long, value_name = "K")]
    top: Option<usize>,

    /// Elements of --page to turn into patterns (numbered from 1)
    #[arg(long, num_args = 1.., value_name = "INDEX")]
    add_patterns: Vec<usize>,

    /// Text for each added pattern ("" for shape only)
    #[arg(long, num_args = 1.., value_name = "TEXT")]
    text_patterns: Vec<String>,

    /// Description for each added pattern
    #[arg(long, num_args = 1.., value_name = "TEXT")]
    descriptions: Vec<String>,

    /// Write the pattern registry to this file
    #[arg(long)]
    save_patterns: Option<PathBuf>,

    /// Read patterns from this file
    #[arg(long)]
    load_patterns: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.color_mode {
            return Mode::Color;
        }
        if let Some(mode) = self.mode {
            return mode;
        }
        if self.defines_patterns() || self.load_patterns.is_some() {
            Mode::Pattern
        } else {
            Mode::Color
        }
    }

    fn defines_patterns(&self) -> bool {
        !self.add_patterns.is_empty()
            || !self.text_patterns.is_empty()
            || !self.descriptions.is_empty()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(?cli, "Arguments parsed");

    match run(&cli) {
        Ok(code) => code,
        Err(err) => report(&err),
    }
}

/// Print an error in plain language and pick the exit code.
fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<FiligranError>() {
        Some(filigran_err) => {
            let human = humanize_error(filigran_err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            exit_code(human.exit_code())
        }
        None => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let source = PdfSource::open(&cli.input)?;
    let page_count = source.page_count();
    if page_count == 0 {
        return Err(FiligranError::InputFile(format!("{} has no pages", cli.input.display())).into());
    }
    let mode = cli.mode();
    info!(?mode, pages = page_count, "Input opened");

    match mode {
        Mode::Color => {
            if let Some(page) = cli.page {
                return inspect_colors(cli, page_count, page);
            }
            remove_by_color(cli, &source)
        }
        Mode::Pattern => {
            let listing_only = !cli.defines_patterns() && cli.load_patterns.is_none();
            if let Some(page) = cli.page.filter(|_| listing_only) {
                PageRange::new(page, page, page_count)?;
                print_elements(page, &source.page_contents(page)?);
                return Ok(ExitCode::SUCCESS);
            }
            remove_by_pattern(cli, &source)
        }
    }
}

// -- Colour mode --------------------------------------------------------------

fn inspect_colors(cli: &Cli, page_count: u32, page: u32) -> anyhow::Result<ExitCode> {
    PageRange::new(page, page, page_count)?;
    let pdfium = bind_pdfium()?;
    let renderer = PdfiumRenderer::open(&pdfium, &cli.input)?;
    let analyzer = PageAnalyzer::new(AnalyzerConfig {
        dpi: cli.dpi,
        top_k: cli.top,
        ..AnalyzerConfig::default()
    });

    let entries = analyzer.analyze(&renderer, page)?;
    println!("Colours on page {page}:");
    for entry in &entries {
        let Color { r, g, b } = entry.color;
        println!("  {:>3},{:>3},{:>3}  {:>6.2}%", r, g, b, entry.frequency * 100.0);
    }
    if entries.is_empty() {
        println!("  (no colour covers enough of the page)");
    }
    Ok(ExitCode::SUCCESS)
}

fn remove_by_color(cli: &Cli, source: &PdfSource) -> anyhow::Result<ExitCode> {
    let targets = TargetColorSet::new(cli.colors.clone())?;
    let config = RemovalConfig {
        dpi: cli.dpi,
        tolerance: Tolerance::new(cli.tolerance)?,
        batch_size: cli.batch_size,
        background: cli.background,
    };
    config.validate()?;
    info!(%targets, tolerance = cli.tolerance, dpi = cli.dpi, "Colour removal");

    let pdfium = bind_pdfium()?;
    let renderer = PdfiumRenderer::open(&pdfium, &cli.input)?;
    let mut removal = ColorRemoval::new(&renderer, RasterPageProcessor::new(&targets, &config));
    process(cli, source, &mut removal)
}

// -- Pattern mode -------------------------------------------------------------

fn remove_by_pattern(cli: &Cli, source: &PdfSource) -> anyhow::Result<ExitCode> {
    let mut registry = match &cli.load_patterns {
        Some(path) => PatternRegistry::load(path)
            .with_context(|| format!("loading patterns from {}", path.display()))?,
        None => PatternRegistry::new(),
    };

    if cli.defines_patterns() {
        let page = cli.page.unwrap_or(0);
        PageRange::new(page, page, source.page_count())?;
        let contents = source.page_contents(page)?;
        let ids = define_patterns(cli, page, &contents, &mut registry)?;
        println!("Added patterns {ids:?} from page {page}");
    }

    if let Some(path) = &cli.save_patterns {
        registry.save(path)?;
        println!("Patterns saved to {}", path.display());
    }

    let mut removal = PatternRemoval::new(source, &registry)?;
    process(cli, source, &mut removal)
}

/// Turn the 1-based `--add-patterns` indices into patterns.
fn define_patterns(
    cli: &Cli,
    page: u32,
    contents: &PageContents,
    registry: &mut PatternRegistry,
) -> Result<Vec<u32>, FiligranError> {
    let elements = zero_based(page, &cli.add_patterns, contents.elements.len())?;
    let definitions =
        PatternDefinition::from_parallel(&elements, &cli.text_patterns, &cli.descriptions)?;
    registry
        .add_definitions(page, &contents.elements, &definitions)
        .map_err(one_based)
}

/// 1-based element numbers as listed to the user, to 0-based indices.
fn zero_based(page: u32, numbers: &[usize], available: usize) -> Result<Vec<usize>, FiligranError> {
    numbers
        .iter()
        .map(|&number| {
            number.checked_sub(1).ok_or(FiligranError::UnknownElement {
                page,
                index: number,
                available,
            })
        })
        .collect()
}

/// Report an unknown element by the number the user typed.
fn one_based(err: FiligranError) -> FiligranError {
    match err {
        FiligranError::UnknownElement {
            page,
            index,
            available,
        } => FiligranError::UnknownElement {
            page,
            index: index + 1,
            available,
        },
        other => other,
    }
}

fn print_elements(page: u32, contents: &PageContents) {
    println!("Elements on page {page}:");
    for element in &contents.elements {
        let bbox = element.bbox.map_or_else(
            || "unknown position".to_string(),
            |b| format!("[{:.1}, {:.1}, {:.1}, {:.1}]", b.x0, b.y0, b.x1, b.y1),
        );
        let label = element
            .text
            .as_deref()
            .map(|text| format!("{text:?}"))
            .or_else(|| element.name.as_ref().map(|name| format!("/{name}")))
            .unwrap_or_default();
        println!("  {:>3}. {:<5} {}  {}", element.index + 1, element.kind, bbox, label);
    }
    if contents.elements.is_empty() {
        println!("  (no text or XObject elements)");
    }
}

// -- Shared run ---------------------------------------------------------------

fn process<T: PageTransform + ?Sized>(
    cli: &Cli,
    source: &PdfSource,
    transform: &mut T,
) -> anyhow::Result<ExitCode> {
    let range = PageRange::from_bounds(cli.start_page, cli.end_page, source.page_count())?;
    let scheduler = BatchScheduler::new(range, cli.batch_size)?;
    let mut assembler = DocumentAssembler::new(source);

    let mut summary = execute(&scheduler, transform, &mut assembler, &CancelToken::new())?;
    summary.write_output(assembler, &cli.output)?;
    print_summary(&summary, &cli.output);

    if let Some(err) = &summary.interrupted {
        let human = humanize_error(err);
        eprintln!("error: {}", human.message);
        eprintln!("  {}", human.suggestion);
        return Ok(exit_code(human.exit_code()));
    }
    if summary.processed.is_empty() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &RunSummary, output: &Path) {
    println!(
        "Processed {} of {} pages ({}), {} changes",
        summary.processed.len(),
        summary.range.len(),
        summary.range,
        summary.changes
    );
    for skipped in &summary.skipped {
        println!("  skipped page {}: {}", skipped.index, skipped.reason);
    }
    if summary.output_written {
        println!("Output written to {}", output.display());
        if let Some(page) = summary.resume_from() {
            println!(
                "To finish, rerun on {} with --start-page {}",
                output.display(),
                page
            );
        }
    } else {
        println!("No output written");
    }
}
