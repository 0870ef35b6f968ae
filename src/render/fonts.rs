use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow, bail};
use plotters::style::{FontStyle, register_font};

use super::FONT_FAMILY;

/// Environment variable naming a TrueType font for chart text.
pub const FONT_ENV: &str = "OODLAB_FONT";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static REGISTERED: OnceLock<PathBuf> = OnceLock::new();

/// Make sure a font is registered for [`FONT_FAMILY`].
///
/// Lookup order: `explicit`, then `$OODLAB_FONT`, then well-known system
/// locations. Registration happens once per process.
pub fn ensure_font(explicit: Option<&Path>) -> Result<()> {
    if REGISTERED.get().is_some() {
        return Ok(());
    }

    let path = locate(explicit)?;
    let bytes = std::fs::read(&path)
        .with_context(|| format!("reading font {}", path.display()))?;
    // The registry keeps `&'static` data for the life of the process.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());

    for style in [FontStyle::Normal, FontStyle::Bold, FontStyle::Italic, FontStyle::Oblique] {
        register_font(FONT_FAMILY, style, bytes)
            .map_err(|_| anyhow!("{} is not a usable TrueType font", path.display()))?;
    }

    log::debug!("Registered chart font {}", path.display());
    let _ = REGISTERED.set(path);
    Ok(())
}

fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        if p.is_file() {
            return Ok(p.to_path_buf());
        }
        bail!("font file not found: {}", p.display());
    }

    if let Some(p) = std::env::var_os(FONT_ENV).map(PathBuf::from) {
        if p.is_file() {
            return Ok(p);
        }
        log::warn!("${FONT_ENV} points to a missing file: {}", p.display());
    }

    SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .ok_or_else(|| anyhow!("no TrueType font found; pass --font or set ${FONT_ENV}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_font_is_an_error() {
        let err = locate(Some(Path::new("/nonexistent/font.ttf"))).unwrap_err();
        assert!(err.to_string().contains("font file not found"));
    }
}
