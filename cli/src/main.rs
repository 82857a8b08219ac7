//! pdf2md CLI - PDF to Markdown conversion tool

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdf2md::{
    CleanupPreset, ConvertOptions, ConvertResult, LayoutConfig, PageSelection, ParseOptions, PdfConverter,
    RenderOptions,
};

#[derive(Parser)]
#[command(name = "pdf2md")]
#[command(version)]
#[command(about = "Convert PDF documents to Markdown", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (defaults to INPUT with a .md extension)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Write Markdown to stdout instead of a file
    #[arg(long, conflicts_with = "output")]
    stdout: bool,

    /// Verbose logging and a warning summary
    #[arg(short, long)]
    verbose: bool,

    /// Page range (e.g., "1-10", "1,3,5")
    #[arg(long)]
    pages: Option<String>,

    /// Process pages one after another
    #[arg(long)]
    sequential: bool,

    /// Worker threads for page processing
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Fail on damaged cross-reference data instead of recovering
    #[arg(long)]
    strict: bool,

    /// Include YAML frontmatter
    #[arg(short, long)]
    frontmatter: bool,

    /// Rejoin words hyphenated across line breaks
    #[arg(long)]
    dehyphenate: bool,

    /// Text cleanup preset
    #[arg(long, value_enum, default_value = "standard")]
    cleanup: CleanupLevel,

    /// Maximum heading level (1-6)
    #[arg(long, default_value = "6")]
    max_heading: u8,

    /// Font size ratio over body text that marks a heading
    #[arg(long, default_value = "1.2")]
    heading_ratio: f32,

    /// Maximum text fragments extracted per page
    #[arg(long, default_value = "50000")]
    fragment_cap: usize,

    /// Per-page time budget in seconds (0 disables it)
    #[arg(long, default_value = "30")]
    page_timeout: u64,

    /// Print warnings as JSON to stderr
    #[arg(long)]
    warnings_json: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CleanupLevel {
    /// No cleanup
    None,
    /// Minimal cleanup (Unicode normalization only)
    Minimal,
    /// Standard cleanup (default)
    Standard,
    /// Aggressive cleanup (drops placeholders and page numbers)
    Aggressive,
}

impl CleanupLevel {
    fn preset(self) -> Option<CleanupPreset> {
        match self {
            CleanupLevel::None => None,
            CleanupLevel::Minimal => Some(CleanupPreset::Minimal),
            CleanupLevel::Standard => Some(CleanupPreset::Standard),
            CleanupLevel::Aggressive => Some(CleanupPreset::Aggressive),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = run(&cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(cli)?;
    let data = fs::read(&cli.input)?;

    let spinner = (!cli.stdout).then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Converting {}...", cli.input.display()));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = PdfConverter::new(options).convert(data);
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let result = result?;

    report_warnings(cli, &result)?;

    if cli.stdout {
        println!("{}", result.markdown);
        return Ok(());
    }

    let output = cli.output.clone().unwrap_or_else(|| default_output_path(&cli.input));
    write_output(&output, &result.markdown)?;
    println!("{} {}", "Saved to".green(), output.display());
    Ok(())
}

fn build_options(cli: &Cli) -> Result<ConvertOptions, Box<dyn std::error::Error>> {
    let pages = match cli.pages.as_deref() {
        Some(p) => PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?,
        None => PageSelection::All,
    };

    let mut parse = ParseOptions::new()
        .with_pages(pages)
        .with_fragment_cap(cli.fragment_cap)
        .with_page_timeout((cli.page_timeout > 0).then(|| Duration::from_secs(cli.page_timeout)));
    if cli.strict {
        parse = parse.strict();
    }
    if cli.sequential {
        parse = parse.sequential();
    }
    if let Some(threads) = cli.threads {
        parse = parse.with_threads(threads);
    }

    let layout = LayoutConfig::new()
        .with_heading_ratio(cli.heading_ratio)
        .with_max_heading(cli.max_heading);

    let mut render = RenderOptions::new()
        .with_frontmatter(cli.frontmatter)
        .with_dehyphenation(cli.dehyphenate)
        .with_max_heading(cli.max_heading);
    render = match cli.cleanup.preset() {
        Some(preset) => render.with_cleanup_preset(preset),
        None => render.without_cleanup(),
    };

    Ok(ConvertOptions::new()
        .with_parse_options(parse)
        .with_layout(layout)
        .with_render_options(render))
}

fn report_warnings(cli: &Cli, result: &ConvertResult) -> Result<(), Box<dyn std::error::Error>> {
    if cli.warnings_json {
        eprintln!("{}", result.warnings_json()?);
    } else if cli.verbose {
        for warning in &result.warnings {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        }
    } else if result.has_warnings() {
        log::info!("{} warnings (use --verbose to list them)", result.warnings.len());
    }
    Ok(())
}

/// `report.pdf` becomes `report.md` next to it.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("md")
}

/// Write the document followed by a final newline.
fn write_output(path: &Path, markdown: &str) -> std::io::Result<()> {
    let mut content = String::with_capacity(markdown.len() + 1);
    content.push_str(markdown);
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(default_output_path(Path::new("docs/report.pdf")), PathBuf::from("docs/report.md"));
        assert_eq!(default_output_path(Path::new("notes")), PathBuf::from("notes.md"));
    }

    #[test]
    fn test_write_output_adds_final_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        write_output(&path, "# Title\n\nBody").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "# Title\n\nBody\n");
    }

    #[test]
    fn test_build_options_from_flags() {
        let cli = Cli::parse_from([
            "pdf2md",
            "in.pdf",
            "--strict",
            "--sequential",
            "--pages",
            "2-3",
            "--cleanup",
            "none",
            "--fragment-cap",
            "100",
            "--page-timeout",
            "0",
        ]);
        let options = build_options(&cli).unwrap();
        assert!(!options.parse.allow_degraded());
        assert!(!options.parse.parallel);
        assert_eq!(options.parse.pages, PageSelection::Range(2..=3));
        assert_eq!(options.parse.fragment_cap, 100);
        assert_eq!(options.parse.page_timeout, None);
        assert!(options.render.cleanup.is_none());
        assert!(!options.render.dehyphenate);
    }

    #[test]
    fn test_dehyphenate_flag() {
        let cli = Cli::parse_from(["pdf2md", "in.pdf", "--dehyphenate"]);
        assert!(build_options(&cli).unwrap().render.dehyphenate);
    }

    #[test]
    fn test_invalid_pages_rejected() {
        let cli = Cli::parse_from(["pdf2md", "in.pdf", "--pages", "x-y"]);
        assert!(build_options(&cli).is_err());
    }
}
