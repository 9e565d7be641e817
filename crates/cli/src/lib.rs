pub mod config;
pub mod logging;
pub mod reader;

use anyhow::{bail, Context, Result};
use catalog::extract::{extract_text, extracted_text_file_name};
use catalog::ingest::clean_file_name;
use catalog::settings::{export_file_name, export_json, export_library, format_bytes, library_stats};
use catalog::{Ingestor, Library, UploadedFile};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use doc_model::{DocumentContent, DocumentId, DocumentRecord, SortOrder};
use pdf_engine::{PdfBackend, PdfDocument, PdfPage};
use serde::Serialize;
use std::cell::OnceCell;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use storage::JsonFileStore;
use tracing::debug;
use viewer_core::{RenderApply, SessionError, ViewingSession};

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "pdf-shelf")]
#[command(about = "Personal PDF library and reader", version)]
pub struct Cli {
    /// Directory holding `pdf-library.json` and `config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,
    /// Log at info level unless PDF_SHELF_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add PDF files to the library.
    Add {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// List library documents.
    List {
        #[arg(long)]
        query: Option<String>,
        #[arg(long, value_enum, default_value_t = SortArg::Date)]
        sort: SortArg,
        #[arg(long)]
        json: bool,
    },
    /// Print one document's metadata.
    Show { id: String },
    /// Remove one document from the library.
    Delete { id: String },
    /// Remove every document from the library.
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Print library statistics.
    Stats,
    /// Write a JSON backup of the library metadata.
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render one page to a PNG file.
    ///
    /// Without the `pdfium` build feature pages are drawn blank, at the
    /// right size and orientation.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        zoom_in: u32,
        #[arg(long, default_value_t = 0)]
        zoom_out: u32,
        /// Number of clockwise quarter turns.
        #[arg(long, default_value_t = 0)]
        rotate: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Search the text of a PDF.
    Search {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Write the text of every page to a file.
    ExtractText {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Read a PDF interactively, one command per line on stdin.
    Read {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Read a library document by id.
    ///
    /// Stored records keep no content, so the file has to be given again
    /// with `--file`.
    ReadId {
        id: String,
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortArg {
    Name,
    Date,
}

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Name => SortOrder::Name,
            SortArg::Date => SortOrder::Date,
        }
    }
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    title: Option<String>,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEntry<'a> {
    id: &'a str,
    title: &'a str,
    name: &'a str,
    upload_date: DateTime<Utc>,
    available: bool,
}

#[derive(Debug, Serialize)]
struct SearchHit<'a> {
    page: u32,
    excerpt: &'a str,
}

#[cfg(not(feature = "pdfium"))]
type Backend = pdf_engine::LopdfBackend;
#[cfg(feature = "pdfium")]
type Backend = pdf_engine::pdfium::PdfiumBackend;

#[cfg(not(feature = "pdfium"))]
fn bind_backend() -> Result<Backend> {
    Ok(pdf_engine::default_backend())
}

#[cfg(feature = "pdfium")]
fn bind_backend() -> Result<Backend> {
    Backend::bind().context("failed to load the PDFium library")
}

struct Shelf {
    root: PathBuf,
    config: Config,
    backend: OnceCell<Backend>,
}

impl Shelf {
    fn library(&self) -> Result<Library<JsonFileStore>> {
        let store = JsonFileStore::with_root(&self.root);
        Library::load(store).context("failed to load the library")
    }

    /// The PDF backend, bound on first use.
    fn backend(&self) -> Result<Backend> {
        if let Some(backend) = self.backend.get() {
            return Ok(*backend);
        }

        let backend = bind_backend()?;
        Ok(*self.backend.get_or_init(|| backend))
    }

    fn ingestor(&self) -> Result<Ingestor<Backend>> {
        Ok(Ingestor::new(self.backend()?, self.config.ingest_options()))
    }

    fn session(&self) -> Result<ViewingSession<Backend>> {
        Ok(ViewingSession::with_limits(self.backend()?, self.config.session_limits()))
    }
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let root = config::resolve_data_root(cli.data_dir.as_deref())?;
    let config = Config::load(&root)?;
    logging::init(cli.verbose, config.log_level.as_deref());
    debug!(root = %root.display(), "resolved data root");

    let shelf = Shelf { root, config, backend: OnceCell::new() };

    match cli.command {
        Commands::Add { files } => run_add(&shelf, &files),
        Commands::List { query, sort, json } => {
            run_list(&shelf, query.as_deref().unwrap_or_default(), sort.into(), json)
        }
        Commands::Show { id } => run_show(&shelf, &DocumentId::from(id.as_str())),
        Commands::Delete { id } => {
            let mut library = shelf.library()?;
            let removed = library.delete(&DocumentId::from(id.as_str()))?;
            println!("deleted {} ({})", removed.id, removed.title);
            Ok(())
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to clear the library without --yes");
            }
            let removed = shelf.library()?.clear()?;
            println!("removed {removed} document(s)");
            Ok(())
        }
        Commands::Stats => run_stats(&shelf),
        Commands::Export { output } => run_export(&shelf, output),
        Commands::Info { file } => run_info(&shelf, &file),
        Commands::Render { file, page, zoom_in, zoom_out, rotate, output } => run_render(
            &shelf,
            &file,
            RenderArgs { page, zoom_in, zoom_out, rotate },
            output.as_deref(),
        ),
        Commands::Search { file, query, json } => run_search(&shelf, &file, &query, json),
        Commands::ExtractText { file, output } => run_extract_text(&shelf, &file, output),
        Commands::Read { file } => {
            let record = transient_record(&shelf, &file)?;
            run_read(&shelf, &record)
        }
        Commands::ReadId { id, file } => run_read_id(&shelf, &DocumentId::from(id.as_str()), file),
    }
}

fn run_add(shelf: &Shelf, files: &[PathBuf]) -> Result<()> {
    let mut library = shelf.library()?;

    let mut uploads = Vec::with_capacity(files.len());
    let mut unreadable = 0;
    for path in files {
        match read_file(path) {
            Ok(upload) => uploads.push(upload),
            Err(err) => {
                eprintln!("skipped: {err:#}");
                unreadable += 1;
            }
        }
    }

    let report = shelf.ingestor()?.ingest_batch(uploads);

    for record in report.accepted {
        let line = format!("added {} {}", record.id, record.title);
        library.add(record)?;
        println!("{line}");
    }

    for err in &report.rejected {
        eprintln!("rejected: {err}");
    }

    let failed = unreadable + report.rejected.len();
    if failed > 0 {
        bail!("{failed} of {} file(s) rejected", files.len());
    }

    Ok(())
}

fn run_list(shelf: &Shelf, query: &str, sort: SortOrder, json: bool) -> Result<()> {
    let library = shelf.library()?;
    let visible = library.view(query, sort);

    if json {
        let entries: Vec<ListEntry<'_>> = visible
            .iter()
            .map(|record| ListEntry {
                id: record.id.as_str(),
                title: &record.title,
                name: &record.display_name,
                upload_date: record.uploaded_at,
                available: !record.is_stale(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if visible.is_empty() {
        if library.is_empty() {
            println!("library is empty");
        } else {
            println!("no documents match \"{query}\"");
        }
        return Ok(());
    }

    for record in visible {
        println!(
            "{}\t{}\t{}\t{}",
            record.id,
            record.title,
            record.display_name,
            record.uploaded_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}

fn run_show(shelf: &Shelf, id: &DocumentId) -> Result<()> {
    let library = shelf.library()?;
    let record = library.get(id).ok_or_else(|| catalog::CatalogError::NotFound { id: id.clone() })?;

    println!("id: {}", record.id);
    println!("title: {}", record.title);
    println!("file: {}", record.display_name);
    println!("uploaded: {}", record.uploaded_at.to_rfc3339());
    match record.size_bytes() {
        Some(size) => println!("content: {}", format_bytes(size)),
        None => println!("content: not available, re-upload to read"),
    }
    println!("thumbnail: {} bytes", record.thumbnail.len());

    Ok(())
}

fn run_stats(shelf: &Shelf) -> Result<()> {
    let library = shelf.library()?;
    let stats = library_stats(library.records());

    println!("documents: {}", stats.total_documents);
    println!("unavailable: {}", stats.stale_documents);
    println!("storage used: {}", format_bytes(stats.storage_bytes));
    match stats.last_upload {
        Some(date) => println!("last upload: {}", date.format("%Y-%m-%d %H:%M")),
        None => println!("last upload: never"),
    }

    Ok(())
}

fn run_export(shelf: &Shelf, output: Option<PathBuf>) -> Result<()> {
    let library = shelf.library()?;
    let now = Utc::now();

    let export = export_library(library.records(), now);
    let json = export_json(&export)?;

    let output = output.unwrap_or_else(|| PathBuf::from(export_file_name(now.date_naive())));
    write_output(&output, json.as_bytes())?;
    println!("{}", output.display());

    Ok(())
}

fn run_info(shelf: &Shelf, file: &Path) -> Result<()> {
    ensure_file_exists(file)?;

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let document = shelf.backend()?.decode(&bytes).context("failed to open PDF")?;

    let page_count = document.page_count();
    let first_page_size_pt = if page_count > 0 {
        let size = document.page(1)?.size();
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count,
        title: document.metadata_title(),
        first_page_size_pt,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

struct RenderArgs {
    page: u32,
    zoom_in: u32,
    zoom_out: u32,
    rotate: u32,
}

fn run_render(shelf: &Shelf, file: &Path, args: RenderArgs, output: Option<&Path>) -> Result<()> {
    if args.page == 0 {
        bail!("--page is 1-based and must be >= 1");
    }

    let record = transient_record(shelf, file)?;
    let mut session = shelf.session()?;
    let _first_page = session.open(&record).context("failed to open PDF")?;

    if args.page != session.current_page() && session.go_to_page(args.page).is_none() {
        bail!("page {} is out of range (document has {} pages)", args.page, session.total_pages());
    }
    for _ in 0..args.zoom_in {
        let _superseded = session.zoom_in();
    }
    for _ in 0..args.zoom_out {
        let _superseded = session.zoom_out();
    }
    for _ in 0..args.rotate % 4 {
        let _superseded = session.rotate();
    }

    if session.render_current_page() != Some(RenderApply::Applied) {
        bail!("{}", session.render_error().unwrap_or("page was not rendered"));
    }

    let Some(surface) = session.surface() else {
        bail!("page was not rendered");
    };

    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_render_output(file, surface.page_number));
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    surface
        .image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;
    println!("{}", output.display());

    Ok(())
}

fn run_search(shelf: &Shelf, file: &Path, query: &str, json: bool) -> Result<()> {
    let record = transient_record(shelf, file)?;
    let mut session = shelf.session()?;
    let _first_page = session.open(&record).context("failed to open PDF")?;

    let matches = session.search(query);

    if json {
        let hits: Vec<SearchHit<'_>> = matches
            .iter()
            .map(|hit| SearchHit { page: hit.page_number, excerpt: &hit.excerpt })
            .collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("no matches for \"{query}\"");
    }
    for hit in matches {
        println!("page {}: {}", hit.page_number, hit.excerpt);
    }

    Ok(())
}

fn run_extract_text(shelf: &Shelf, file: &Path, output: Option<PathBuf>) -> Result<()> {
    let upload = read_upload(shelf, file)?;
    let document = shelf.backend()?.decode(&upload.bytes).context("failed to open PDF")?;

    let text = extract_text(&document).context("failed to extract text")?;

    let output =
        output.unwrap_or_else(|| file.with_file_name(extracted_text_file_name(&upload.name)));
    write_output(&output, text.as_bytes())?;
    println!("{}", output.display());

    Ok(())
}

fn run_read(shelf: &Shelf, record: &DocumentRecord) -> Result<()> {
    let mut session = shelf.session()?;

    match session.open(record) {
        Ok(ticket) => {
            session.run_render(ticket);
        }
        // The load error stays on the session; `retry` can be issued from the prompt.
        Err(SessionError::Load(message)) => debug!(%message, "starting reader without a document"),
        Err(err) => return Err(err.into()),
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    reader::run_reader(&mut session, stdin.lock(), &mut stdout)
}

fn run_read_id(shelf: &Shelf, id: &DocumentId, file: Option<PathBuf>) -> Result<()> {
    let mut library = shelf.library()?;

    if let Some(file) = file {
        let upload = read_upload(shelf, &file)?;
        library.attach_content(id, DocumentContent::new(upload.bytes))?;
    }

    let record = library.select(id)?;
    run_read(shelf, record)
}

fn read_file(file: &Path) -> Result<UploadedFile> {
    ensure_file_exists(file)?;
    UploadedFile::from_path(file).with_context(|| format!("failed to read {}", file.display()))
}

/// Reads and validates a file given on the command line.
fn read_upload(shelf: &Shelf, file: &Path) -> Result<UploadedFile> {
    let upload = read_file(file)?;
    shelf.ingestor()?.validate(&upload)?;

    Ok(upload)
}

/// A record for a file that is viewed without being added to the library.
fn transient_record(shelf: &Shelf, file: &Path) -> Result<DocumentRecord> {
    let upload = read_upload(shelf, file)?;

    Ok(DocumentRecord {
        id: DocumentId::new_random(),
        title: clean_file_name(&upload.name),
        display_name: upload.name,
        content: Some(DocumentContent::new(upload.bytes)),
        thumbnail: String::new(),
        uploaded_at: Utc::now(),
    })
}

fn write_output(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
