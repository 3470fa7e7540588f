use std::fmt;
use std::str::FromStr;

use crate::RasterError;

/// A coordinate reference system in one of the notations engines understand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Crs {
    /// An EPSG registry code, e.g. `4326`.
    Epsg(u32),
    /// A PROJ string such as `+proj=longlat +datum=WGS84 +no_defs`.
    Proj(String),
    /// Well-Known Text.
    Wkt(String),
}

impl Crs {
    /// Returns the EPSG code if this CRS is expressed as one.
    #[must_use]
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Proj(_) | Crs::Wkt(_) => None,
        }
    }

    /// Best-effort classification of the coordinate system.
    ///
    /// EPSG codes in the 4000 range are geographic, apart from the well-known
    /// geocentric (ECEF) frames and the few projected systems numbered there.
    /// Other codes are assumed projected.
    #[must_use]
    pub fn kind(&self) -> CrsKind {
        match self {
            Crs::Epsg(code) if GEOCENTRIC_CODES.contains(code) => CrsKind::Geocentric,
            Crs::Epsg(code) if PROJECTED_4000_CODES.contains(code) => CrsKind::Projected,
            Crs::Epsg(code) if (4000..5000).contains(code) => CrsKind::Geographic,
            Crs::Epsg(_) => CrsKind::Projected,
            Crs::Proj(proj) => {
                if proj.contains("+proj=geocent") {
                    CrsKind::Geocentric
                } else if proj.contains("+proj=longlat") || proj.contains("+proj=latlong") {
                    CrsKind::Geographic
                } else {
                    CrsKind::Projected
                }
            }
            Crs::Wkt(wkt) => {
                let wkt = wkt.trim_start();
                if wkt.starts_with("GEOCCS") {
                    CrsKind::Geocentric
                } else if wkt.starts_with("GEOGCS") || wkt.starts_with("GEOGCRS") {
                    CrsKind::Geographic
                } else {
                    CrsKind::Projected
                }
            }
        }
    }

    /// Whether coordinates are angular (longitude / latitude).
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        self.kind() == CrsKind::Geographic
    }
}

/// The broad family a [`Crs`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrsKind {
    /// Longitude / latitude on an ellipsoid.
    Geographic,
    /// Earth-centred cartesian X, Y, Z.
    Geocentric,
    /// Planar coordinates.
    Projected,
}

/// Earth-centred frames: WGS 84 (4328, 4978), ITRF88 to ITRF2000 (4910..4919),
/// ITRF2005 (4896) and ETRS89 (4936).
const GEOCENTRIC_CODES: &[u32] = &[
    4328, 4896, 4910, 4911, 4912, 4913, 4914, 4915, 4916, 4917, 4918, 4919, 4936, 4978,
];

/// World Equidistant Cylindrical (4087, 4088) and ETRS89 / DKTM1..4 (4093..4096).
const PROJECTED_4000_CODES: &[u32] = &[4087, 4088, 4093, 4094, 4095, 4096];

impl FromStr for Crs {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RasterError::invalid("empty coordinate reference system"));
        }

        let code = s
            .strip_prefix("EPSG:")
            .or_else(|| s.strip_prefix("epsg:"))
            .unwrap_or(s);
        if let Ok(code) = code.parse::<u32>() {
            return Ok(Crs::Epsg(code));
        }

        if s.starts_with('+') {
            return Ok(Crs::Proj(s.to_string()));
        }
        if s.contains('[') && s.ends_with(']') {
            return Ok(Crs::Wkt(s.to_string()));
        }
        Err(RasterError::invalid(format!(
            "unrecognised coordinate reference system '{s}' (expected EPSG:<code>, a PROJ string or WKT)"
        )))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Proj(proj) => f.write_str(proj),
            Crs::Wkt(wkt) => f.write_str(wkt),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("EPSG:4326", Crs::Epsg(4326))]
    #[case("epsg:102008", Crs::Epsg(102_008))]
    #[case(" 32610 ", Crs::Epsg(32610))]
    #[case("+proj=longlat +datum=WGS84 +no_defs", Crs::Proj("+proj=longlat +datum=WGS84 +no_defs".into()))]
    fn test_parse(#[case] input: &str, #[case] expected: Crs) {
        assert_eq!(input.parse::<Crs>().unwrap(), expected);
    }

    #[test]
    fn test_parse_wkt() {
        let wkt = r#"GEOGCS["WGS 84",DATUM["WGS_1984"],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#;
        let crs: Crs = wkt.parse().unwrap();
        assert_eq!(crs, Crs::Wkt(wkt.to_string()));
        assert!(crs.is_geographic());
    }

    #[rstest]
    #[case("")]
    #[case("mercator please")]
    #[case("EPSG:abc")]
    fn test_parse_rejects_garbage(#[case] input: &str) {
        assert!(matches!(
            input.parse::<Crs>(),
            Err(RasterError::InvalidArgument(_))
        ));
    }

    #[rstest]
    #[case(Crs::Epsg(4326), CrsKind::Geographic)]
    #[case(Crs::Epsg(4269), CrsKind::Geographic)]
    #[case(Crs::Epsg(4978), CrsKind::Geocentric)]
    #[case(Crs::Epsg(4936), CrsKind::Geocentric)]
    #[case(Crs::Epsg(4087), CrsKind::Projected)]
    #[case(Crs::Epsg(32610), CrsKind::Projected)]
    #[case(Crs::Proj("+proj=geocent +datum=WGS84".into()), CrsKind::Geocentric)]
    #[case(Crs::Proj("+proj=utm +zone=10".into()), CrsKind::Projected)]
    #[case(Crs::Wkt(r#"GEOCCS["WGS 84",DATUM["WGS_1984"]]"#.into()), CrsKind::Geocentric)]
    fn test_kind(#[case] crs: Crs, #[case] expected: CrsKind) {
        assert_eq!(crs.kind(), expected);
        assert_eq!(crs.is_geographic(), expected == CrsKind::Geographic);
    }

    #[test]
    fn test_display_round_trips_epsg() {
        let crs = Crs::Epsg(3857);
        assert_eq!(crs.to_string().parse::<Crs>().unwrap(), crs);
        assert!(!crs.is_geographic());
    }
}
