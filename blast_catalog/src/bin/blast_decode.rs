use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use blast_catalog::{Catalog, FrameTarget, load_catalog, parse_address, summarize};
use blast_formats::{EncodedBlob, PaletteTable, PixelLayout, RasterImage, Variant};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(about = "Decode blast-compressed textures to raw pixel dumps", version)]
struct Args {
    /// JSON manifest listing blobs, palettes, composites and animations
    #[arg(long, value_name = "FILE", conflicts_with = "root")]
    manifest: Option<PathBuf>,

    /// Directory of loose blobs named <ADDR>.blast<N> (scanned recursively)
    #[arg(long, value_name = "DIR", conflicts_with = "manifest")]
    root: Option<PathBuf>,

    /// Palette blob used for variants 4 and 5 found under --root
    #[arg(long, value_name = "FILE", requires = "root")]
    palette: Option<PathBuf>,

    /// Address of a blob to decode (hex, may repeat); defaults to every blob
    #[arg(long = "asset", value_name = "ADDR", value_parser = parse_address)]
    assets: Vec<u32>,

    /// Destination directory for decoded output
    #[arg(long, value_name = "DIR", default_value = "decoded")]
    dest: PathBuf,

    /// What to write for each blob
    #[arg(long, value_enum, default_value_t = OutputKind::Pixels)]
    output: OutputKind,

    /// Print the catalog instead of decoding
    #[arg(long)]
    list: bool,

    /// Print the listing as JSON
    #[arg(long, requires = "list")]
    json: bool,

    /// Play back the named animation and report each frame
    #[arg(long, value_name = "NAME", requires = "manifest")]
    animation: Option<String>,

    /// Number of frames to step through (defaults to one full loop)
    #[arg(long, value_name = "N", requires = "animation")]
    frames: Option<usize>,

    /// Decode the whole animation with the first tile's palette
    #[arg(long, requires = "animation")]
    share_palette: bool,

    /// Overwrite existing files instead of skipping them
    #[arg(long)]
    overwrite: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputKind {
    /// Unpacked rasters (.rgba, .ga8, .ga16)
    Pixels,
    /// Decompressed texel data before unpacking
    Decoded,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut catalog = match (&args.manifest, &args.root) {
        (Some(manifest), _) => load_catalog(manifest)?,
        (None, Some(root)) => scan_root(root, args.palette.as_deref())?,
        (None, None) => bail!("pass --manifest or --root"),
    };

    if args.list {
        return print_listing(&catalog, args.json);
    }

    if let Some(name) = args.animation.as_deref() {
        return play_animation(&mut catalog, name, args.frames, args.share_palette);
    }

    fs::create_dir_all(&args.dest)
        .with_context(|| format!("creating destination {}", args.dest.display()))?;

    let addresses: Vec<u32> = if args.assets.is_empty() {
        catalog.blobs().map(|blob| blob.address).collect()
    } else {
        args.assets.clone()
    };

    let mut written = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for address in addresses {
        match write_blob(&catalog, address, &args) {
            Ok(true) => written += 1,
            Ok(false) => skipped += 1,
            Err(err) => {
                warn!("0x{address:06X}: {err:#}");
                failed += 1;
            }
        }
    }

    if args.assets.is_empty() && args.output == OutputKind::Pixels {
        for composite in catalog.composites() {
            let path = args.dest.join(format!("{}.composite", composite.label()));
            let result = catalog
                .render_composite(composite)
                .map_err(anyhow::Error::from)
                .and_then(|image| write_raster(&image, &path, args.overwrite));
            match result {
                Ok(true) => written += 1,
                Ok(false) => skipped += 1,
                Err(err) => {
                    warn!("composite {}: {err:#}", composite.label());
                    failed += 1;
                }
            }
        }
    }

    info!("wrote {written} files, skipped {skipped}, {failed} failed");
    println!(
        "wrote {written} files to {} ({skipped} skipped, {failed} failed)",
        args.dest.display()
    );
    Ok(())
}

fn scan_root(root: &Path, palette: Option<&Path>) -> Result<Catalog> {
    let mut catalog = Catalog::new();

    if let Some(path) = palette {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let table = PaletteTable::from_bytes(&bytes)
            .with_context(|| format!("parsing palette {}", path.display()))?;
        catalog.insert_palette(0, table);
        catalog.set_default_palette(0)?;
    }

    for entry in WalkDir::new(root).into_iter().filter_map(|res| res.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some((address, variant)) = parse_blob_name(entry.path()) else {
            continue;
        };
        let data = fs::read(entry.path())
            .with_context(|| format!("reading {}", entry.path().display()))?;
        if catalog
            .insert_blob(EncodedBlob::new(address, variant, data))
            .is_some()
        {
            warn!("duplicate blob 0x{address:06X} at {}", entry.path().display());
        }
    }

    info!("found {} blobs under {}", catalog.blobs().count(), root.display());
    Ok(catalog)
}

/// `00DB08.blast1` -> `(0xDB08, Variant::Rgba16)`.
fn parse_blob_name(path: &Path) -> Option<(u32, Variant)> {
    let stem = path.file_stem()?.to_str()?;
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let tag = extension.strip_prefix("blast")?.parse::<u16>().ok()?;
    let variant = Variant::from_tag(tag).ok()?;
    let address = parse_address(stem).ok()?;
    Some((address, variant))
}

fn write_blob(catalog: &Catalog, address: u32, args: &Args) -> Result<bool> {
    let blob = catalog
        .blob(address)
        .with_context(|| format!("no blob at 0x{address:06X}"))?;

    // Raw blobs have no pixel layout, so their decoded bytes are the output.
    if args.output == OutputKind::Decoded || blob.variant == Variant::Raw {
        let palette = catalog
            .palette_selection(address)?
            .and_then(|palette| catalog.palette(palette));
        let decoded = blob.decode(palette)?;
        let path = args.dest.join(format!(
            "{address:06X}.{}",
            blob.variant.decoded_extension()
        ));
        return write_file(&path, &decoded, args.overwrite);
    }

    let image = catalog.render(address)?;
    let path = args.dest.join(format!("{address:06X}"));
    write_raster(&image, &path, args.overwrite)
}

fn write_raster(image: &RasterImage, base: &Path, overwrite: bool) -> Result<bool> {
    let extension = match image.layout() {
        PixelLayout::Rgba8888 => "rgba",
        PixelLayout::GrayAlpha8 => "ga8",
        PixelLayout::GrayAlpha16 => "ga16",
    };
    let file_name = format!(
        "{}.{}x{}.{extension}",
        base.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image"),
        image.width(),
        image.height()
    );
    write_file(&base.with_file_name(file_name), image.pixels(), overwrite)
}

fn write_file(path: &Path, bytes: &[u8], overwrite: bool) -> Result<bool> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(true)
}

fn print_listing(catalog: &Catalog, json: bool) -> Result<()> {
    let rows = summarize(catalog);
    if json {
        let text = serde_json::to_string_pretty(&rows).context("serialising listing")?;
        println!("{text}");
        return Ok(());
    }

    println!(
        "{:<10} {:<16} {:<14} {:<7} {:>9} {:>8} {:>8} {:>6}",
        "address", "name", "variant", "format", "size", "encoded", "decoded", "frames"
    );
    for row in rows {
        let size = match (row.width, row.height) {
            (Some(width), Some(height)) => format!("{width}x{height}"),
            _ => String::from("-"),
        };
        println!(
            "{:<10} {:<16} {:<14} {:<7} {:>9} {:>8} {:>8} {:>6}",
            row.address,
            row.name.as_deref().unwrap_or("-"),
            row.variant,
            row.format,
            size,
            row.encoded_size,
            row.decoded_size,
            row.frames
        );
    }
    Ok(())
}

fn play_animation(
    catalog: &mut Catalog,
    name: &str,
    frames: Option<usize>,
    share_palette: bool,
) -> Result<()> {
    if share_palette {
        catalog.share_animation_palette(name)?;
    }

    let animation = catalog.animation(name)?;
    let mut player = catalog.player(name)?;
    let steps = frames.unwrap_or(player.frame_count());
    let interval = player.interval();

    for step in 0..steps {
        let image = catalog.render_frame(animation, &player)?;
        let target = match player.current(animation) {
            Some(FrameTarget::Tile(address)) => format!("0x{address:06X}"),
            Some(FrameTarget::Composite(composite)) => composite.label(),
            None => String::from("-"),
        };
        println!(
            "{:>8.3}s  frame {:>3}  {target}  {}x{}",
            player.seconds_at(step),
            player.current_index(),
            image.width(),
            image.height()
        );
        player.tick(interval);
    }
    Ok(())
}
