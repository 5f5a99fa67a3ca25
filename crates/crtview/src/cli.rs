use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use raster::VideoSpec;

#[derive(Parser, Debug)]
#[command(
    name = "crtview",
    author,
    version,
    about = "Emulated CRT test-card viewer"
)]
pub struct Cli {
    /// Television standard the test card starts in (`ntsc`, `pal`, `pal-m`, `secam`).
    #[arg(long, value_name = "SPEC", value_parser = parse_spec, default_value = "ntsc")]
    pub spec: VideoSpec,

    /// Preset to render with; defaults to the preset file's `default`.
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Preset file to load instead of the one in the user config directory.
    #[arg(long, value_name = "FILE", env = "CRTVIEW_PRESETS")]
    pub presets: Option<PathBuf>,

    /// Print the available presets and exit.
    #[arg(long)]
    pub list_presets: bool,

    /// Initial window size (e.g. `960x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size, default_value = "960x720")]
    pub size: (u32, u32),

    /// Seed the noise and ghosting phase for reproducible frames.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Render into the offscreen output slot instead of the window surface.
    #[arg(long)]
    pub scratch: bool,

    /// Frames between television standard switches on the test card (0 disables).
    #[arg(long, value_name = "FRAMES", default_value_t = 300)]
    pub switch_every: u64,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_spec(value: &str) -> Result<VideoSpec> {
    VideoSpec::from_id(value).ok_or_else(|| {
        let known: Vec<_> = VideoSpec::ALL.iter().map(|spec| spec.id).collect();
        anyhow!("unknown video spec '{value}' (expected one of {})", known.join(", "))
    })
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow!("expected WxH format, e.g. 960x720"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid height in size specification"))?;

    if width == 0 || height == 0 {
        bail!("surface dimensions must be greater than zero");
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_surface_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_surface_size(" 640 X 480 ").unwrap(), (640, 480));
        assert!(parse_surface_size("0x480").is_err());
        assert!(parse_surface_size("1280").is_err());
    }

    #[test]
    fn parses_specs_loosely() {
        assert_eq!(parse_spec("pal-m").unwrap().id, "PAL-M");
        assert_eq!(parse_spec("SECAM").unwrap().id, "SECAM");
        assert!(parse_spec("vga").is_err());
    }

    #[test]
    fn defaults_apply() {
        let cli = Cli::try_parse_from(["crtview"]).unwrap();
        assert_eq!(cli.spec.id, "NTSC");
        assert_eq!(cli.size, (960, 720));
        assert!(!cli.scratch);
        assert_eq!(cli.seed, None);
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from([
            "crtview", "--spec", "pal", "--preset", "broadcast", "--size", "320x240", "--seed",
            "9", "--scratch",
        ])
        .unwrap();
        assert_eq!(cli.spec.id, "PAL");
        assert_eq!(cli.preset.as_deref(), Some("broadcast"));
        assert_eq!(cli.size, (320, 240));
        assert_eq!(cli.seed, Some(9));
        assert!(cli.scratch);
    }
}
