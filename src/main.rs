//! dudv CLI - inspect and convert V8U8 DDS normal maps.
//!
//! This is the main entry point for the dudv command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

use dudv::dds::DdsPreview;
use dudv::{
    extension_for_format, is_valid_format, Image, ImageType, MipMapMode, SaveOptions,
    SurfaceFormat, VALID_FORMATS,
};

/// dudv - V8U8 normal map conversion tool
#[derive(Parser)]
#[command(name = "dudv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show size, format and mip count of an image
    Info {
        /// Image to inspect
        #[arg(env = "DUDV_INPUT")]
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a DDS header without loading pixel data
    Detect {
        /// DDS file to inspect
        #[arg(env = "DUDV_INPUT")]
        input: PathBuf,
    },

    /// Convert an image to another format
    Convert {
        /// Input image
        #[arg(short, long, env = "DUDV_INPUT")]
        input: PathBuf,

        /// Output file
        #[arg(short, long, env = "DUDV_OUTPUT")]
        output: PathBuf,

        /// Target format (PNG, JPG, BMP, GIF, DDS, V8U8, DXT1, ...). Defaults to the output extension
        #[arg(short, long)]
        format: Option<String>,

        /// DDS surface encoding
        #[arg(short, long)]
        surface: Option<String>,

        /// Mipmap handling for DDS output
        #[arg(short, long, value_enum, default_value_t = MipsArg::Build)]
        mips: MipsArg,

        /// JPEG quality (0-100)
        #[arg(short, long, default_value_t = 80)]
        quality: u8,
    },

    /// Decode the top level to a PNG for viewing
    Preview {
        /// Input image
        #[arg(short, long, env = "DUDV_INPUT")]
        input: PathBuf,

        /// Output PNG file
        #[arg(short, long, env = "DUDV_OUTPUT")]
        output: PathBuf,

        /// Scale the preview to WIDTHxHEIGHT, e.g. 256x256
        #[arg(short, long, value_parser = parse_size)]
        size: Option<(u32, u32)>,
    },

    /// Convert every file matching a pattern
    Batch {
        /// Glob pattern, e.g. "textures/**/*_ddn.dds"
        #[arg(short, long)]
        pattern: String,

        /// Output directory
        #[arg(short, long, env = "DUDV_OUTPUT")]
        output: PathBuf,

        /// Target format
        #[arg(short, long, default_value = "PNG")]
        format: String,

        /// Mipmap handling for DDS output
        #[arg(short, long, value_enum, default_value_t = MipsArg::Build)]
        mips: MipsArg,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MipsArg {
    /// Build missing levels
    Build,
    /// Discard and regenerate all levels
    Rebuild,
    /// Keep only the top level
    Remove,
    /// Keep only the top level, whatever the image holds
    ForceRemove,
    /// Leave the chain as it is
    Keep,
}

impl From<MipsArg> for MipMapMode {
    fn from(arg: MipsArg) -> Self {
        match arg {
            MipsArg::Build => MipMapMode::BuildAll,
            MipsArg::Rebuild => MipMapMode::Rebuild,
            MipsArg::Remove => MipMapMode::RemoveAllButOne,
            MipsArg::ForceRemove => MipMapMode::ForceRemove,
            MipsArg::Keep => MipMapMode::None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()?;

    match cli.command {
        Commands::Info { input, json } => {
            cmd_info(&input, json)?;
        }
        Commands::Detect { input } => {
            cmd_detect(&input)?;
        }
        Commands::Convert {
            input,
            output,
            format,
            surface,
            mips,
            quality,
        } => {
            cmd_convert(&input, &output, format.as_deref(), surface.as_deref(), mips, quality)?;
        }
        Commands::Preview {
            input,
            output,
            size,
        } => {
            cmd_preview(&input, &output, size)?;
        }
        Commands::Batch {
            pattern,
            output,
            format,
            mips,
        } => {
            cmd_batch(&pattern, &output, &format, mips)?;
        }
    }

    Ok(())
}

fn cmd_info(input: &Path, json: bool) -> Result<()> {
    let image = Image::open(input).context("Failed to load image")?;
    let metadata = image.metadata();

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("File:     {}", input.display());
    println!("Kind:     {}", if image.is_v8u8() { "V8U8 DDS" } else { "standard" });
    println!("Size:     {}x{}", metadata.width, metadata.height);
    println!("Surface:  {:?}", metadata.surface_format);
    println!("Depth:    {} bpp, {} channels", metadata.bits_per_pixel, metadata.channels);
    println!("Mips:     {}", metadata.mip_count);

    Ok(())
}

fn cmd_detect(input: &Path) -> Result<()> {
    let data = fs::read(input).context("Failed to read input file")?;
    let preview = DdsPreview::from_bytes(&data).context("Not a readable DDS header")?;

    println!(
        "{}: {:?} {}x{}, {} mips{}",
        input.display(),
        preview.format,
        preview.width,
        preview.height,
        preview.mip_count,
        if preview.is_compressed() { " (compressed)" } else { "" }
    );
    println!(
        "  {} bpp, top level {} bytes, full chain {} bytes",
        preview.bits_per_pixel(),
        preview.top_level_size(),
        preview.mip_chain_size()
    );
    println!("  V8U8: {}", dudv::dds::is_v8u8_bytes(&data));

    Ok(())
}

/// Resolve a format name into a container and surface.
fn parse_target(format: &str, surface: Option<&str>) -> Result<(ImageType, SurfaceFormat)> {
    if let Ok(image_type) = format.parse::<ImageType>() {
        let surface = match surface {
            Some(s) => s.parse()?,
            None => SurfaceFormat::None,
        };
        return Ok((image_type, surface));
    }

    if !is_valid_format(format) {
        anyhow::bail!(
            "Unknown format '{}' (expected one of {})",
            format,
            VALID_FORMATS.join(", ")
        );
    }
    Ok((ImageType::Dds, format.parse()?))
}

fn save_options(
    format: &str,
    surface: Option<&str>,
    mips: MipsArg,
    quality: u8,
) -> Result<SaveOptions> {
    let (image_type, surface) = parse_target(format, surface)?;
    Ok(SaveOptions::new(image_type)
        .surface(surface)
        .mip_mode(mips.into())
        .quality(quality))
}

fn cmd_convert(
    input: &Path,
    output: &Path,
    format: Option<&str>,
    surface: Option<&str>,
    mips: MipsArg,
    quality: u8,
) -> Result<()> {
    let format = match format {
        Some(f) => f.to_string(),
        None => output
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string)
            .context("No --format given and the output has no extension")?,
    };
    let opts = save_options(&format, surface, mips, quality)?;

    println!("Converting: {} -> {}", input.display(), output.display());

    let start = Instant::now();
    let mut image = Image::open(input).context("Failed to load image")?;
    let outcome = image
        .convert_and_save_to_path(output, &opts)
        .context("Failed to convert image")?;

    if let Some(e) = &outcome.mip_error {
        eprintln!("Warning: saved without requested mipmaps: {}", e);
    }
    println!(
        "Wrote {}x{} ({} mips) in {:?}",
        image.width(),
        image.height(),
        image.mips(),
        start.elapsed()
    );

    Ok(())
}

/// Parse `WIDTHxHEIGHT` into a non-zero size.
fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("Expected WIDTHxHEIGHT, got '{}'", s))?;
    let width: u32 = w.trim().parse().context("Invalid width")?;
    let height: u32 = h.trim().parse().context("Invalid height")?;
    if width == 0 || height == 0 {
        anyhow::bail!("Preview size must be non-zero, got {}x{}", width, height);
    }
    Ok((width, height))
}

fn cmd_preview(input: &Path, output: &Path, size: Option<(u32, u32)>) -> Result<()> {
    let image = Image::open(input).context("Failed to load image")?;
    let png = image
        .to_bytes_sized(ImageType::Png, 100, size)
        .context("Failed to encode preview")?;
    fs::write(output, png).context("Failed to write output file")?;

    let (width, height) = size.unwrap_or((image.width(), image.height()));
    println!("Preview written to {} ({}x{})", output.display(), width, height);

    Ok(())
}

fn cmd_batch(pattern: &str, output: &Path, format: &str, mips: MipsArg) -> Result<()> {
    let opts = save_options(format, None, mips, 80)?;
    let extension = extension_for_format(format)
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .unwrap_or_else(|| opts.image_type.extension().to_string());

    let inputs: Vec<PathBuf> = glob::glob(pattern)
        .context("Invalid glob pattern")?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();

    println!("Converting {} files to {}...", inputs.len(), output.display());

    fs::create_dir_all(output)?;

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut converted = 0;
    let mut partial = 0;
    let mut errors = 0;

    for input in &inputs {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let output_path = output.join(format!("{}.{}", stem, extension));

        let result = Image::open(input)
            .and_then(|mut image| image.convert_and_save_to_path(&output_path, &opts));

        match result {
            Ok(outcome) => {
                if !outcome.is_complete() {
                    partial += 1;
                }
                converted += 1;
            }
            Err(e) => {
                pb.suspend(|| eprintln!("Error converting {}: {}", input.display(), e));
                errors += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!(
        "Converted {} files in {:?} ({} without requested mips, {} errors)",
        converted,
        start.elapsed(),
        partial,
        errors
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("256x128").unwrap(), (256, 128));
        assert_eq!(parse_size("64X64").unwrap(), (64, 64));
        assert!(parse_size("0x8").is_err());
        assert!(parse_size("256").is_err());
    }

    #[test]
    fn test_preview_size_flag() {
        let cli = Cli::try_parse_from(["dudv", "preview", "-i", "a.dds", "-o", "a.png", "--size", "32x16"])
            .unwrap();
        match cli.command {
            Commands::Preview { size, .. } => assert_eq!(size, Some((32, 16))),
            _ => panic!("expected preview"),
        }
    }
}
