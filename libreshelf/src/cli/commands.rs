///! Subcommand implementations
use anyhow::{anyhow, bail, Context, Result};
use image::{ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};

use libreshelf::document::{ComicReader, EpubReader, PdfReader};
use libreshelf::utils::file::{detect_book_format, format_file_size, is_book_file};
use libreshelf::{
    BookFormat, Content, DocumentReader, NetworkDispatcher, NetworkSource, ShelfConfig,
};

fn book_format(file: &Path) -> Result<BookFormat> {
    match detect_book_format(file) {
        BookFormat::Unknown => bail!("{} is not an EPUB, PDF or comic archive", file.display()),
        format => Ok(format),
    }
}

fn save_png(image: &RgbaImage, output: &Path) -> Result<()> {
    image
        .save_with_format(output, ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("{} ({}x{})", output.display(), image.width(), image.height());
    Ok(())
}

pub fn info(config: &ShelfConfig, file: &Path) -> Result<()> {
    let format = book_format(file)?;
    let size = std::fs::metadata(file)
        .with_context(|| format!("Cannot read {}", file.display()))?
        .len();

    println!("File:    {}", file.display());
    println!("Format:  {}", format.as_str());
    println!("Size:    {}", format_file_size(size));

    match format {
        BookFormat::Epub => {
            let mut reader = EpubReader::new();
            let summary = reader.open(file)?;
            let meta = reader.metadata()?;

            println!("Title:   {}", meta.title);
            println!("Author:  {}", meta.author);
            if !meta.publisher.is_empty() {
                println!("Publisher: {}", meta.publisher);
            }
            if !meta.language.is_empty() {
                println!("Language: {}", meta.language);
            }
            if !meta.isbn.is_empty() {
                println!("ISBN:    {}", meta.isbn);
            }
            println!("Chapters: {}", summary.unit_count);
            for item in reader.table_of_contents()? {
                let href = &reader.chapters()?[item.chapter_index].href;
                println!("  {:>4}  {}  ({})", item.chapter_index, item.title, href);
            }
        }
        BookFormat::Pdf => {
            let mut reader = PdfReader::new();
            let summary = reader.open(file)?;
            println!("Pages:   {}", summary.unit_count);
        }
        _ => {
            let mut reader = ComicReader::new(format).with_max_entry_size(config.reader.max_entry_size);
            let summary = reader.open(file)?;
            println!("Pages:   {}", summary.unit_count);
            for (index, name) in reader.page_names()?.iter().enumerate() {
                println!("  {:>4}  {}", index, name);
            }
        }
    }
    Ok(())
}

pub fn page(
    config: &ShelfConfig,
    file: &Path,
    index: usize,
    output: Option<&Path>,
    scale: Option<f32>,
) -> Result<()> {
    let format = book_format(file)?;

    let content = match format {
        BookFormat::Pdf => {
            let mut reader = PdfReader::new();
            let summary = reader.open(file)?;
            let scale = scale.unwrap_or(config.reader.default_scale);
            let page = reader.render_page(index, scale)?.ok_or_else(|| {
                anyhow!("Page {} out of range ({} pages)", index, summary.unit_count)
            })?;
            Content::Image(page)
        }
        BookFormat::Epub => {
            let mut reader = EpubReader::new();
            reader.open(file)?;
            reader.fetch(index)?
        }
        _ => {
            let mut reader = ComicReader::new(format).with_max_entry_size(config.reader.max_entry_size);
            reader.open(file)?;
            reader.fetch(index)?
        }
    };

    match (content, output) {
        (Content::Markup(markup), Some(output)) => std::fs::write(output, markup)
            .with_context(|| format!("Failed to write {}", output.display())),
        (Content::Markup(markup), None) => {
            println!("{}", markup);
            Ok(())
        }
        (Content::Image(image), Some(output)) => save_png(&image, output),
        (Content::Image(_), None) => bail!("Pages are images; pass --output <file.png>"),
    }
}

pub fn cover(
    config: &ShelfConfig,
    file: &Path,
    output: &Path,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<()> {
    let mut cover = config.reader.cover_config();
    cover.max_width = width.unwrap_or(cover.max_width);
    cover.max_height = height.unwrap_or(cover.max_height);

    let image = match book_format(file)? {
        BookFormat::Pdf => {
            let mut reader = PdfReader::new();
            reader.open(file)?;
            reader.cover(&cover)?
        }
        BookFormat::Epub => bail!("EPUB covers are not supported"),
        format => {
            let mut reader = ComicReader::new(format).with_max_entry_size(config.reader.max_entry_size);
            reader.open(file)?;
            reader.cover(&cover)?
        }
    };
    save_png(&image, output)
}

pub fn sources(config: &ShelfConfig) {
    if config.sources.is_empty() {
        println!("No sources configured");
        return;
    }
    for source in &config.sources {
        println!(
            "{:<12} {:<10} {}:{}/{}{}",
            source.id,
            source.kind.as_str(),
            source.host,
            source.effective_port(),
            source.path.trim_start_matches('/'),
            if source.is_active { "" } else { "  (inactive)" }
        );
    }
}

fn find_source<'a>(config: &'a ShelfConfig, key: &str) -> Result<&'a NetworkSource> {
    config
        .source(key)
        .ok_or_else(|| anyhow!("No source with id or name {:?}", key))
}

fn dispatcher(config: &ShelfConfig) -> NetworkDispatcher {
    NetworkDispatcher::new(config.network.timeouts())
}

pub async fn list(config: &ShelfConfig, source: &str, path: &str) -> Result<()> {
    let source = find_source(config, source)?;
    let entries = dispatcher(config).try_list(source, path).await?;

    for entry in entries {
        let modified = entry
            .last_modified
            .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        if entry.is_directory {
            println!("{:>10}  {:<16}  {}/", "<dir>", modified, entry.path);
        } else {
            println!(
                "{:>10}  {:<16}  {}{}",
                format_file_size(entry.size),
                modified,
                entry.path,
                if is_book_file(&entry.name) { "" } else { "  (not a book)" }
            );
        }
    }
    Ok(())
}

pub async fn get(
    config: &ShelfConfig,
    source: &str,
    remote_path: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let source = find_source(config, source)?;
    let destination = match output {
        Some(path) => path,
        None => {
            let name = remote_path
                .rsplit('/')
                .find(|s| !s.is_empty())
                .ok_or_else(|| anyhow!("Cannot derive a file name from {:?}", remote_path))?;
            PathBuf::from(name)
        }
    };

    let bytes = dispatcher(config)
        .try_download(source, remote_path, &destination)
        .await
        .with_context(|| format!("Downloading {} from {} failed", remote_path, source.name))?;
    println!("{} ({})", destination.display(), format_file_size(bytes));
    Ok(())
}

pub async fn test(config: &ShelfConfig, source: &str) -> Result<()> {
    let source = find_source(config, source)?;
    dispatcher(config).try_test_connection(source).await?;
    println!("{}: OK", source.name);
    Ok(())
}
