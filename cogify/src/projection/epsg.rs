//! EPSG codes for the projections the tiler understands.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Coordinate reference systems identified by their EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Epsg {
    /// Pseudo Web Mercator
    Google,
    /// Geographic WGS84 (degrees)
    Wgs84,
    /// New Zealand Transverse Mercator
    Nztm,
}

/// Lookup from normalized alias to projection.
const ALIASES: &[(&str, Epsg)] = &[
    ("google", Epsg::Google),
    ("epsg3857", Epsg::Google),
    ("3857", Epsg::Google),
    ("globalmercator", Epsg::Google),
    ("wgs84", Epsg::Wgs84),
    ("epsg4326", Epsg::Wgs84),
    ("4326", Epsg::Wgs84),
    ("nztm", Epsg::Nztm),
    ("epsg2193", Epsg::Nztm),
    ("2193", Epsg::Nztm),
];

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\W_]").expect("Valid regex"))
}

impl Epsg {
    /// Numeric EPSG code.
    pub fn code(self) -> u32 {
        match self {
            Epsg::Google => 3857,
            Epsg::Wgs84 => 4326,
            Epsg::Nztm => 2193,
        }
    }

    /// Looks up a projection from its numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            3857 => Some(Epsg::Google),
            4326 => Some(Epsg::Wgs84),
            2193 => Some(Epsg::Nztm),
            _ => None,
        }
    }

    /// Parses free text such as `"EPSG:3857"`, `"google"` or `"nz_tm"`.
    ///
    /// Punctuation, whitespace and case are ignored. Unknown text yields
    /// `None` so callers can treat the value as an optional override.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = separators().replace_all(text, "").to_lowercase();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, epsg)| *epsg)
    }
}

impl fmt::Display for Epsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Epsg::Google.code(), 3857);
        assert_eq!(Epsg::Wgs84.code(), 4326);
        assert_eq!(Epsg::Nztm.code(), 2193);
    }

    #[test]
    fn test_display_is_gdal_srs_string() {
        assert_eq!(Epsg::Google.to_string(), "EPSG:3857");
        assert_eq!(Epsg::Nztm.to_string(), "EPSG:2193");
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Epsg::parse("3857"), Some(Epsg::Google));
        assert_eq!(Epsg::parse("epsg3857"), Some(Epsg::Google));
        assert_eq!(Epsg::parse("google"), Some(Epsg::Google));
        assert_eq!(Epsg::parse("GlobalMercator"), Some(Epsg::Google));
        assert_eq!(Epsg::parse("WGS84"), Some(Epsg::Wgs84));
        assert_eq!(Epsg::parse("4326"), Some(Epsg::Wgs84));
        assert_eq!(Epsg::parse("nztm"), Some(Epsg::Nztm));
    }

    #[test]
    fn test_parse_ignores_punctuation_and_case() {
        assert_eq!(Epsg::parse("EPSG:3857"), Some(Epsg::Google));
        assert_eq!(Epsg::parse("epsg_2193"), Some(Epsg::Nztm));
        assert_eq!(Epsg::parse(" Epsg 4326 "), Some(Epsg::Wgs84));
        assert_eq!(Epsg::parse("NZ-TM"), Some(Epsg::Nztm));
    }

    #[test]
    fn test_parse_unknown_is_none() {
        assert_eq!(Epsg::parse("27700"), None);
        assert_eq!(Epsg::parse(""), None);
        assert_eq!(Epsg::parse("mercator"), None);
    }

    #[test]
    fn test_from_code_roundtrip() {
        for epsg in [Epsg::Google, Epsg::Wgs84, Epsg::Nztm] {
            assert_eq!(Epsg::from_code(epsg.code()), Some(epsg));
        }
        assert_eq!(Epsg::from_code(1), None);
    }
}
