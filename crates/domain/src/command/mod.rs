//! Byte-exact command streams for the supported printer languages.
//!
//! Everything here is a pure function of its input: the same text and
//! parameters always produce the same bytes.

pub mod cpcl;
pub mod epl;
pub mod escpos;
mod raster;
pub mod tspl;
pub mod universal;
pub mod zpl;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

pub use escpos::{Alignment, EscPosBuilder};
pub use raster::{BLACK_THRESHOLD, Raster};
pub use tspl::LabelGeometry;

/// Printer command dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelLanguage {
    /// Zebra
    Zpl,
    /// TSC
    Tspl,
    /// Eltron / older Zebra
    Epl,
    /// Mobile printers
    Cpcl,
    /// Receipt printers
    EscPos,
}

impl LabelLanguage {
    pub const ALL: [LabelLanguage; 5] = [Self::Zpl, Self::Tspl, Self::Epl, Self::Cpcl, Self::EscPos];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zpl => "zpl",
            Self::Tspl => "tspl",
            Self::Epl => "epl",
            Self::Cpcl => "cpcl",
            Self::EscPos => "escpos",
        }
    }
}

impl fmt::Display for LabelLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelLanguage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zpl" | "zebra" => Ok(Self::Zpl),
            "tspl" | "tsc" => Ok(Self::Tspl),
            "epl" | "epl2" => Ok(Self::Epl),
            "cpcl" => Ok(Self::Cpcl),
            "escpos" | "esc/pos" | "esc-pos" => Ok(Self::EscPos),
            other => Err(ParseError::new("label language", other)),
        }
    }
}

/// Free text rendered for `language` with its default geometry
pub fn encode_label(text: &str, language: LabelLanguage) -> Vec<u8> {
    match language {
        LabelLanguage::Zpl => zpl::label(text),
        LabelLanguage::Tspl => tspl::label(text, LabelGeometry::default()),
        LabelLanguage::Epl => epl::label(text),
        LabelLanguage::Cpcl => universal::raw_label(text),
        LabelLanguage::EscPos => escpos::label(text),
    }
}

/// Fixed diagnostic label for `language`
pub fn test_label(language: LabelLanguage) -> Vec<u8> {
    match language {
        LabelLanguage::Zpl => zpl::test_label(),
        LabelLanguage::Tspl => tspl::test_label(),
        LabelLanguage::Epl => epl::test_label(),
        LabelLanguage::Cpcl => cpcl::test_label(),
        LabelLanguage::EscPos => escpos::test_label(),
    }
}
