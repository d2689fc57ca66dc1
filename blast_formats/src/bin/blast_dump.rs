use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use blast_formats::blast::{self, Token};
use blast_formats::{PaletteTable, Variant, guess_resolution};
use clap::Parser;

/// Inspect a raw blast-encoded texture and summarise its word stream.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Variant tag (0-6) the blob was stored with
    variant: u16,
    /// Path to the encoded bytes
    path: PathBuf,
    /// Palette blob for variants 4 and 5
    #[arg(long, value_name = "FILE")]
    palette: Option<PathBuf>,
    /// Print every word instead of just the summary
    #[arg(long)]
    tokens: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let variant = Variant::from_tag(args.variant)?;
    let encoded =
        fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let tokens = blast::inspect(variant, &encoded)
        .with_context(|| format!("scanning {}", args.path.display()))?;
    let stats = blast::stream_stats(variant, &tokens);

    println!("{} ({}) {} bytes", variant, variant.format_id(), encoded.len());
    println!(
        "words: {}  literals: {}  back-references: {}  copied: {} bytes",
        stats.words, stats.literals, stats.back_references, stats.copied_bytes
    );
    println!("decoded length: {} bytes", stats.decoded_len);
    if let Some((width, height)) = guess_resolution(variant, stats.decoded_len) {
        println!("guessed resolution: {width}x{height}");
    }

    if args.tokens {
        for (index, token) in tokens.iter().enumerate() {
            match token {
                Token::Literal(word) => println!("{index:>6}  {word:04X}  literal"),
                Token::BackReference { length, offset } => {
                    println!(
                        "{index:>6}        copy {length:>2} x{} from -{offset}",
                        variant.element_size()
                    )
                }
            }
        }
    }

    let palette = match &args.palette {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Some(PaletteTable::from_bytes(&bytes)?)
        }
        None => None,
    };

    if variant.requires_palette() && palette.is_none() {
        println!("skipping full decode: {variant} needs --palette");
        return Ok(());
    }

    let decoded = blast::decode_blob(variant, &encoded, palette.as_ref())
        .with_context(|| format!("decoding {}", args.path.display()))?;
    println!("decoded {} bytes", decoded.len());
    Ok(())
}
