//! Static font metrics for the five template font families.
//!
//! Character widths are in em units (relative to font size). One reference table
//! (Inter) covers ASCII 0x20..=0x7E; the other families are expressed as a width
//! factor over it. This is an approximation, good enough to estimate how tall a
//! document renders at a given font size, which is all the fit loop needs.
//! Index = (char as usize) - 32.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Font family enum
// ────────────────────────────────────────────────────────────────────────────

/// The five supported resume font families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    /// Clean humanist sans-serif.
    #[default]
    Inter,
    /// Old-style serif. Approx. 85% of Inter.
    EbGaramond,
    /// Geometric humanist sans-serif. Approx. 105% of Inter.
    Lato,
    /// Condensed display sans-serif. Approx. 68% of Inter.
    Oswald,
    /// Traditional TeX font. Approx. 90% of Inter.
    ComputerModern,
}

impl FontFamily {
    /// Average glyph width relative to Inter.
    pub fn width_factor(self) -> f32 {
        match self {
            FontFamily::Inter => 1.0,
            FontFamily::EbGaramond => 0.85,
            FontFamily::Lato => 1.05,
            FontFamily::Oswald => 0.68,
            FontFamily::ComputerModern => 0.90,
        }
    }

    /// Baseline-to-baseline distance as a multiple of the font size.
    pub fn line_height(self) -> f32 {
        match self {
            FontFamily::Inter | FontFamily::Lato => 1.25,
            FontFamily::EbGaramond | FontFamily::ComputerModern => 1.2,
            FontFamily::Oswald => 1.3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FontFamily::Inter => "inter",
            FontFamily::EbGaramond => "eb_garamond",
            FontFamily::Lato => "lato",
            FontFamily::Oswald => "oswald",
            FontFamily::ComputerModern => "computer_modern",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page configuration
// ────────────────────────────────────────────────────────────────────────────

const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperSize {
    #[default]
    Letter,
    A4,
}

impl PaperSize {
    /// (width, height) in inches.
    pub fn dimensions_in(self) -> (f32, f32) {
        match self {
            PaperSize::Letter => (8.5, 11.0),
            PaperSize::A4 => (8.27, 11.69),
        }
    }
}

/// Printable area of a single resume page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub paper: PaperSize,
    /// Uniform margin on all four sides.
    pub margin_in: f32,
}

impl PageConfig {
    pub fn text_width_pt(&self) -> f32 {
        let (width, _) = self.paper.dimensions_in();
        (width - 2.0 * self.margin_in) * POINTS_PER_INCH
    }

    pub fn usable_height_pt(&self) -> f32 {
        let (_, height) = self.paper.dimensions_in();
        (height - 2.0 * self.margin_in) * POINTS_PER_INCH
    }
}

/// Page config for `paper` with 1" margins.
pub fn default_page_config(paper: PaperSize) -> PageConfig {
    PageConfig {
        paper,
        margin_in: 1.0,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metrics
// ────────────────────────────────────────────────────────────────────────────

/// Width measurements for one font family.
#[derive(Debug, Clone, Copy)]
pub struct FontMetrics {
    factor: f32,
}

impl FontMetrics {
    /// Rendered width of a string in em units. Non-ASCII falls back to the average width.
    pub fn measure_str(&self, s: &str) -> f32 {
        let raw: f32 = s
            .chars()
            .map(|c| {
                let code = c as usize;
                if (32..=126).contains(&code) {
                    INTER_WIDTHS[code - 32]
                } else {
                    INTER_AVERAGE_WIDTH
                }
            })
            .sum();
        raw * self.factor
    }

    pub fn space_width(&self) -> f32 {
        INTER_WIDTHS[0] * self.factor
    }

    /// Printed lines `s` occupies when greedily word-wrapped at `max_width_em`.
    pub fn estimated_lines(&self, s: &str, max_width_em: f32) -> u32 {
        let mut words = s.split_whitespace();
        let Some(first) = words.next() else {
            return 0;
        };

        let space = self.space_width();
        let mut lines = 1u32;
        let mut current = self.measure_str(first);

        for word in words {
            let w = self.measure_str(word);
            if current + space + w > max_width_em {
                lines += 1;
                current = w;
            } else {
                current += space + w;
            }
        }
        lines
    }
}

pub fn get_metrics(font: FontFamily) -> FontMetrics {
    FontMetrics {
        factor: font.width_factor(),
    }
}

const INTER_AVERAGE_WIDTH: f32 = 0.52;

#[rustfmt::skip]
static INTER_WIDTHS: [f32; 95] = [
    // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
    0.25, 0.30, 0.38, 0.56, 0.56, 0.89, 0.67, 0.22, 0.33, 0.33, 0.39, 0.59, 0.28, 0.33, 0.28, 0.31,
    // 0     1     2     3     4     5     6     7     8     9
    0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56,
    // :     ;     <     =     >     ?     @
    0.28, 0.28, 0.59, 0.59, 0.59, 0.50, 1.02,
    // A     B     C     D     E     F     G     H     I     J     K     L     M
    0.67, 0.61, 0.61, 0.67, 0.56, 0.50, 0.67, 0.67, 0.25, 0.39, 0.61, 0.53, 0.78,
    // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
    0.67, 0.72, 0.56, 0.72, 0.61, 0.50, 0.56, 0.67, 0.67, 0.89, 0.61, 0.61, 0.56,
    // [     \     ]     ^     _     `
    0.28, 0.31, 0.28, 0.47, 0.56, 0.34,
    // a     b     c     d     e     f     g     h     i     j     k     l     m
    0.56, 0.56, 0.50, 0.56, 0.56, 0.31, 0.56, 0.56, 0.22, 0.22, 0.53, 0.22, 0.83,
    // n     o     p     q     r     s     t     u     v     w     x     y     z
    0.56, 0.56, 0.56, 0.56, 0.33, 0.44, 0.39, 0.56, 0.50, 0.72, 0.50, 0.50, 0.44,
    // {     |     }     ~
    0.33, 0.26, 0.33, 0.59,
];

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
