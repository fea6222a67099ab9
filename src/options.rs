//! Page layout options applied to every PDF in one build.
//!
//! [`ExportOptions`] is the caller-facing surface and deliberately has no
//! `Default`: the page `format` and the `margin` must always be chosen by the
//! caller. It (de)serialises from the JSON shape build scripts already use:
//!
//! ```json
//! { "format": "Letter",
//!   "margin": { "top": "1cm", "right": "1cm", "bottom": "1cm", "left": "1cm" } }
//! ```
//!
//! [`ExportOptions::layout`] resolves everything to inches, which is what the
//! DevTools print command takes.

use crate::error::ExportError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CSS pixels per unit, as used by Chrome's print pipeline.
const PX_PER_IN: f64 = 96.0;
const PX_PER_CM: f64 = 37.8;
const PX_PER_MM: f64 = 3.78;

static LENGTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?|\.\d+)\s*(px|in|cm|mm)?\s*$").unwrap());

// ── Paper format ─────────────────────────────────────────────────────────

/// Named paper size keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PaperFormat {
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
}

impl PaperFormat {
    pub const ALL: [PaperFormat; 11] = [
        PaperFormat::Letter,
        PaperFormat::Legal,
        PaperFormat::Tabloid,
        PaperFormat::Ledger,
        PaperFormat::A0,
        PaperFormat::A1,
        PaperFormat::A2,
        PaperFormat::A3,
        PaperFormat::A4,
        PaperFormat::A5,
        PaperFormat::A6,
    ];

    /// Portrait `(width, height)` in inches.
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
            PaperFormat::Tabloid => (11.0, 17.0),
            PaperFormat::Ledger => (17.0, 11.0),
            PaperFormat::A0 => (33.1, 46.8),
            PaperFormat::A1 => (23.4, 33.1),
            PaperFormat::A2 => (16.54, 23.4),
            PaperFormat::A3 => (11.7, 16.54),
            PaperFormat::A4 => (8.27, 11.7),
            PaperFormat::A5 => (5.83, 8.27),
            PaperFormat::A6 => (4.13, 5.83),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PaperFormat::Letter => "Letter",
            PaperFormat::Legal => "Legal",
            PaperFormat::Tabloid => "Tabloid",
            PaperFormat::Ledger => "Ledger",
            PaperFormat::A0 => "A0",
            PaperFormat::A1 => "A1",
            PaperFormat::A2 => "A2",
            PaperFormat::A3 => "A3",
            PaperFormat::A4 => "A4",
            PaperFormat::A5 => "A5",
            PaperFormat::A6 => "A6",
        }
    }
}

impl fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaperFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PaperFormat::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ExportError::InvalidConfig(format!(
                    "unknown paper format '{wanted}' (expected one of: {})",
                    PaperFormat::ALL.map(PaperFormat::name).join(", ")
                ))
            })
    }
}

impl TryFrom<String> for PaperFormat {
    type Error = ExportError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PaperFormat> for String {
    fn from(f: PaperFormat) -> Self {
        f.name().to_string()
    }
}

// ── Length ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Px,
    In,
    Cm,
    Mm,
}

impl LengthUnit {
    fn px_per_unit(self) -> f64 {
        match self {
            LengthUnit::Px => 1.0,
            LengthUnit::In => PX_PER_IN,
            LengthUnit::Cm => PX_PER_CM,
            LengthUnit::Mm => PX_PER_MM,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::In => "in",
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
        }
    }
}

/// A non-negative distance with a unit, e.g. `1cm`, `0.5in`, `20px`.
///
/// A bare number is read as pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LengthRepr", into = "String")]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    pub const ZERO: Length = Length {
        value: 0.0,
        unit: LengthUnit::Px,
    };

    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    pub fn px(value: f64) -> Self {
        Self::new(value, LengthUnit::Px)
    }

    pub fn cm(value: f64) -> Self {
        Self::new(value, LengthUnit::Cm)
    }

    pub fn mm(value: f64) -> Self {
        Self::new(value, LengthUnit::Mm)
    }

    pub fn inches(value: f64) -> Self {
        Self::new(value, LengthUnit::In)
    }

    /// Length in CSS pixels.
    pub fn to_px(self) -> f64 {
        self.value * self.unit.px_per_unit()
    }

    /// Length in inches.
    pub fn to_inches(self) -> f64 {
        self.to_px() / PX_PER_IN
    }
}

impl Default for Length {
    fn default() -> Self {
        Length::ZERO
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for Length {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = LENGTH_RE
            .captures(s)
            .ok_or_else(|| ExportError::InvalidConfig(format!("invalid length '{s}'")))?;
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| ExportError::InvalidConfig(format!("invalid length '{s}'")))?;
        let unit = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
            None | Some("px") => LengthUnit::Px,
            Some("in") => LengthUnit::In,
            Some("cm") => LengthUnit::Cm,
            Some("mm") => LengthUnit::Mm,
            Some(other) => {
                return Err(ExportError::InvalidConfig(format!(
                    "unknown length unit '{other}'"
                )))
            }
        };
        Ok(Length { value, unit })
    }
}

/// Wire form of a [`Length`]: either `"1cm"` or a bare pixel count.
#[derive(Deserialize)]
#[serde(untagged)]
enum LengthRepr {
    Text(String),
    Pixels(f64),
}

impl TryFrom<LengthRepr> for Length {
    type Error = ExportError;

    fn try_from(repr: LengthRepr) -> Result<Self, Self::Error> {
        match repr {
            LengthRepr::Text(s) => s.parse(),
            LengthRepr::Pixels(px) if px.is_finite() && px >= 0.0 => Ok(Length::px(px)),
            LengthRepr::Pixels(px) => Err(ExportError::InvalidConfig(format!(
                "invalid length {px}"
            ))),
        }
    }
}

impl From<Length> for String {
    fn from(l: Length) -> Self {
        l.to_string()
    }
}

// ── Margin ───────────────────────────────────────────────────────────────

/// Independent distances between the paper edge and the printed content.
/// A side left out of the JSON object is zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Margin {
    #[serde(default)]
    pub top: Length,
    #[serde(default)]
    pub right: Length,
    #[serde(default)]
    pub bottom: Length,
    #[serde(default)]
    pub left: Length,
}

impl Margin {
    /// The same distance on all four sides.
    pub fn uniform(length: Length) -> Self {
        Self {
            top: length,
            right: length,
            bottom: length,
            left: length,
        }
    }
}

// ── Export options ───────────────────────────────────────────────────────

fn default_scale() -> f64 {
    1.0
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Page size and margin configuration applied to every PDF produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub format: PaperFormat,
    pub margin: Margin,
    /// Rotate the paper to landscape. Default: false.
    #[serde(default, skip_serializing_if = "is_false")]
    pub landscape: bool,
    /// Print CSS backgrounds. Default: false.
    #[serde(default, skip_serializing_if = "is_false")]
    pub print_background: bool,
    /// Rendering scale, 0.1–2.0. Default: 1.0.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

/// Fully resolved print geometry, all distances in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintLayout {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub landscape: bool,
    pub print_background: bool,
    pub scale: f64,
}

impl ExportOptions {
    pub fn new(format: PaperFormat, margin: Margin) -> Self {
        Self {
            format,
            margin,
            landscape: false,
            print_background: false,
            scale: default_scale(),
        }
    }

    /// Parse options from their JSON form, validating the result.
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        let options: ExportOptions = serde_json::from_str(json)
            .map_err(|e| ExportError::InvalidConfig(format!("export options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ExportError> {
        if !(0.1..=2.0).contains(&self.scale) {
            return Err(ExportError::InvalidConfig(format!(
                "scale must be 0.1–2.0, got {}",
                self.scale
            )));
        }
        let m = &self.margin;
        for (side, len) in [("top", m.top), ("right", m.right), ("bottom", m.bottom), ("left", m.left)] {
            if !len.value.is_finite() || len.value < 0.0 {
                return Err(ExportError::InvalidConfig(format!(
                    "margin {side} must be a non-negative length, got {len}"
                )));
            }
        }
        let layout = self.layout();
        let (width, height) = if layout.landscape {
            (layout.paper_height, layout.paper_width)
        } else {
            (layout.paper_width, layout.paper_height)
        };
        if layout.margin_left + layout.margin_right >= width
            || layout.margin_top + layout.margin_bottom >= height
        {
            return Err(ExportError::InvalidConfig(format!(
                "margins leave no printable area on {} paper",
                self.format
            )));
        }
        Ok(())
    }

    /// Resolve the options to inches. Landscape does not swap the paper
    /// dimensions here; the browser rotates the page itself.
    pub fn layout(&self) -> PrintLayout {
        let (paper_width, paper_height) = self.format.size_inches();
        PrintLayout {
            paper_width,
            paper_height,
            margin_top: self.margin.top.to_inches(),
            margin_right: self.margin.right.to_inches(),
            margin_bottom: self.margin.bottom.to_inches(),
            margin_left: self.margin.left.to_inches(),
            landscape: self.landscape,
            print_background: self.print_background,
            scale: self.scale,
        }
    }
}
