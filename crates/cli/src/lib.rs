use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inkpad_core::{
    AnnotationSet, CancellationToken, PenStyle, PlacementExporter, RasterSurface, SignatureImage,
    Stroke, StrokeRecorder, ViewerRect, Viewport,
};
use inkpad_pdf_engine::{default_backend, PageGeometry, PdfBackend};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "inkpad-cli")]
#[command(about = "Inkpad CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Rasterize a recorded stroke file to a signature PNG.
    RenderStrokes {
        /// JSON array of strokes, each an array of {x, y, time?} points.
        #[arg(value_name = "STROKES")]
        strokes: PathBuf,
        #[arg(long, default_value_t = 700.0)]
        width: f32,
        #[arg(long, default_value_t = 260.0)]
        height: f32,
        /// Device pixels per logical pixel.
        #[arg(long, default_value_t = 1.0)]
        density: f32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Place a signature image on a page and write the flattened PDF.
    Sign {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Signature PNG, e.g. the output of render-strokes.
        #[arg(long, value_name = "IMAGE")]
        image: PathBuf,
        /// Target page, 1-based.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Placement rectangle in viewer logical pixels, top-left origin.
        #[arg(long, default_value_t = 100.0)]
        x: f32,
        #[arg(long, default_value_t = 100.0)]
        y: f32,
        #[arg(long, default_value_t = 150.0)]
        width: f32,
        #[arg(long, default_value_t = 60.0)]
        height: f32,
        /// Logical size the viewer displays the page at; defaults to
        /// the page's intrinsic point size (a 1:1 mapping).
        #[arg(long)]
        viewer_width: Option<f32>,
        #[arg(long)]
        viewer_height: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::RenderStrokes { strokes, width, height, density, output } => {
            run_render_strokes(&strokes, width, height, density, output.as_deref())
        }
        Commands::Sign {
            file,
            image,
            page,
            x,
            y,
            width,
            height,
            viewer_width,
            viewer_height,
            output,
        } => run_sign(&SignArgs {
            file,
            image,
            page,
            rect: ViewerRect::new(x, y, width, height),
            viewer_width,
            viewer_height,
            output,
        }),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

struct SignArgs {
    file: PathBuf,
    image: PathBuf,
    page: u32,
    rect: ViewerRect,
    viewer_width: Option<f32>,
    viewer_height: Option<f32>,
    output: Option<PathBuf>,
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let bytes = fs::read(file)?;
    let mut backend = default_backend();
    let handle = backend.open(bytes).context("failed to open PDF")?;

    let page_count = backend.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let geometry = backend.page_geometry(handle, 0)?;
        Some(PageSizeOutput { width: geometry.width_pt, height: geometry.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    backend.close(handle)?;

    Ok(())
}

fn run_render_strokes(
    strokes_path: &Path,
    width: f32,
    height: f32,
    density: f32,
    output: Option<&Path>,
) -> Result<()> {
    let image = rasterize_strokes(strokes_path, width, height, density)?;

    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| strokes_path.with_extension("png"));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .raster()
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_sign(args: &SignArgs) -> Result<()> {
    ensure_pdf_exists(&args.file)?;

    if args.page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    let page_index = args.page - 1;

    let source = fs::read(&args.file)?;
    let mut backend = default_backend();
    let handle = backend.open(source.clone()).context("failed to open PDF")?;
    let page_count = backend.page_count(handle)?;
    let pages: Vec<PageGeometry> = (0..page_count)
        .map(|index| backend.page_geometry(handle, index))
        .collect::<std::result::Result<_, _>>()?;
    backend.close(handle)?;

    let raster = image::open(&args.image)
        .with_context(|| format!("failed to read signature image {}", args.image.display()))?
        .to_rgba8();
    let (raster_width, raster_height) = raster.dimensions();
    let image = SignatureImage::from_raster(raster, raster_width as f32, raster_height as f32);

    let mut annotations = AnnotationSet::new();
    annotations
        .add(page_index, image, args.rect, page_count)
        .with_context(|| format!("cannot place signature on page {}", args.page))?;

    // Default to a 1:1 logical-to-point mapping against the target
    // page so placement rectangles read directly as points.
    let target = pages[page_index as usize];
    let viewport = Viewport::new(
        args.viewer_width.unwrap_or(target.width_pt),
        args.viewer_height.unwrap_or(target.height_pt),
    );
    let exported = PlacementExporter::export(
        &mut backend,
        &source,
        &annotations,
        &viewport,
        &pages,
        &CancellationToken::new(),
    )
    .context("failed to export signed PDF")?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_signed_output(&args.file));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&output, exported)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

/// Replay a recorded stroke file through a fresh recorder and pad
/// surface, producing the snapshot image.
fn rasterize_strokes(
    strokes_path: &Path,
    width: f32,
    height: f32,
    density: f32,
) -> Result<SignatureImage> {
    let json = fs::read_to_string(strokes_path)
        .with_context(|| format!("failed to read strokes from {}", strokes_path.display()))?;
    let strokes: Vec<Stroke> =
        serde_json::from_str(&json).context("strokes file is not valid stroke JSON")?;

    if strokes.iter().all(Stroke::is_empty) {
        anyhow::bail!("strokes file contains no ink");
    }

    let mut viewport = Viewport::new(width, height);
    viewport.resize(width, height, density);
    let (pixel_width, pixel_height) = viewport.physical_size();

    let mut recorder = StrokeRecorder::new(PenStyle::default());
    for stroke in &strokes {
        let mut points = stroke.points().iter();
        let Some(first) = points.next() else { continue };
        recorder.begin_stroke(*first)?;
        for point in points {
            recorder.extend_stroke(*point)?;
        }
        recorder.end_stroke()?;
    }

    let mut surface = RasterSurface::new(pixel_width, pixel_height, viewport.pixel_density);
    Ok(recorder.snapshot(&mut surface, &viewport)?)
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_signed_output(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("signed");

    file.with_file_name(format!("{stem}-signed.pdf"))
}
