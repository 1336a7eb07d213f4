//! Synthesized profiles.

use lcms2::{CIExyY, CIExyYTRIPLE, Profile as LcmsProfile, ToneCurve};

use crate::{IccError, IccResult};

/// Profiles the store can synthesize without a file.
///
/// Each kind serializes to ICC bytes and enters the profile store like any
/// other profile, under a fixed cache key derived from the kind and its
/// numeric parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuiltinProfile {
    /// IEC 61966-2-1 sRGB.
    Srgb,
    /// CIE XYZ (D50).
    Xyz,
    /// CIE L*a*b* v4 relative to the given white point.
    Lab {
        /// White point chromaticity.
        white_point: (f64, f64),
    },
    /// sRGB primaries with a linear transfer.
    LinearSrgb,
    /// Adobe RGB (1998).
    AdobeRgb,
    /// Display P3 (sRGB transfer).
    DisplayP3,
    /// ITU-R BT.2020 (BT.709 transfer).
    Rec2020,
    /// Gray with a pure gamma transfer, D50 white.
    Gray {
        /// Transfer gamma.
        gamma: f64,
    },
}

impl BuiltinProfile {
    /// Lab relative to D50.
    pub fn lab_d50() -> Self {
        let d50 = d50_white();
        Self::Lab {
            white_point: (d50.x, d50.y),
        }
    }

    /// Fixed store key; equal parameters give equal keys.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Srgb => "###SRGB###".into(),
            Self::Xyz => "###XYZ###".into(),
            Self::Lab { white_point: (x, y) } => format!("###LAB###{x:.6}{y:.6}"),
            Self::LinearSrgb => "###LINEAR_SRGB###".into(),
            Self::AdobeRgb => "###ADOBE_RGB###".into(),
            Self::DisplayP3 => "###DISPLAY_P3###".into(),
            Self::Rec2020 => "###REC2020###".into(),
            Self::Gray { gamma } => format!("###GRAY###{gamma:.6}"),
        }
    }

    /// Human-readable name.
    pub fn description(&self) -> String {
        match self {
            Self::Srgb => "sRGB built-in".into(),
            Self::Xyz => "XYZ built-in".into(),
            Self::Lab { white_point: (x, y) } => format!("Lab built-in (white {x:.4}, {y:.4})"),
            Self::LinearSrgb => "Linear sRGB built-in".into(),
            Self::AdobeRgb => "Adobe RGB (1998) compatible built-in".into(),
            Self::DisplayP3 => "Display P3 built-in".into(),
            Self::Rec2020 => "Rec. 2020 built-in".into(),
            Self::Gray { gamma } => format!("Gray gamma {gamma:.2} built-in"),
        }
    }

    /// Synthesizes the profile and serializes it to ICC bytes.
    pub fn to_icc(&self) -> IccResult<Vec<u8>> {
        let create = |e: lcms2::Error| IccError::ProfileOpen(format!("{}: {}", self.description(), e));
        let profile = match self {
            Self::Srgb => LcmsProfile::new_srgb(),
            Self::Xyz => LcmsProfile::new_xyz(),
            Self::Lab { white_point: (x, y) } => {
                let white = CIExyY { x: *x, y: *y, Y: 1.0 };
                LcmsProfile::new_lab4_context(lcms2::GlobalContext::new(), &white).map_err(create)?
            }
            Self::LinearSrgb => rgb(&d65_white(), &srgb_primaries(), &ToneCurve::new(1.0)).map_err(create)?,
            Self::AdobeRgb => {
                let primaries = CIExyYTRIPLE {
                    Red: CIExyY { x: 0.6400, y: 0.3300, Y: 1.0 },
                    Green: CIExyY { x: 0.2100, y: 0.7100, Y: 1.0 },
                    Blue: CIExyY { x: 0.1500, y: 0.0600, Y: 1.0 },
                };
                rgb(&d65_white(), &primaries, &ToneCurve::new(563.0 / 256.0)).map_err(create)?
            }
            Self::DisplayP3 => {
                let primaries = CIExyYTRIPLE {
                    Red: CIExyY { x: 0.680, y: 0.320, Y: 1.0 },
                    Green: CIExyY { x: 0.265, y: 0.690, Y: 1.0 },
                    Blue: CIExyY { x: 0.150, y: 0.060, Y: 1.0 },
                };
                let curve = ToneCurve::new_parametric(4, &[2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045])
                    .map_err(create)?;
                rgb(&d65_white(), &primaries, &curve).map_err(create)?
            }
            Self::Rec2020 => {
                let primaries = CIExyYTRIPLE {
                    Red: CIExyY { x: 0.708, y: 0.292, Y: 1.0 },
                    Green: CIExyY { x: 0.170, y: 0.797, Y: 1.0 },
                    Blue: CIExyY { x: 0.131, y: 0.046, Y: 1.0 },
                };
                let curve = ToneCurve::new_parametric(4, &[1.0 / 0.45, 1.0 / 1.099, 0.099 / 1.099, 1.0 / 4.5, 0.081])
                    .map_err(create)?;
                rgb(&d65_white(), &primaries, &curve).map_err(create)?
            }
            Self::Gray { gamma } => {
                LcmsProfile::new_gray(&d50_white(), &ToneCurve::new(*gamma)).map_err(create)?
            }
        };
        profile.icc().map_err(create)
    }
}

fn rgb(white: &CIExyY, primaries: &CIExyYTRIPLE, curve: &ToneCurve) -> lcms2::LCMSResult<LcmsProfile> {
    LcmsProfile::new_rgb(white, primaries, &[curve, curve, curve])
}

/// D50 white point.
fn d50_white() -> CIExyY {
    CIExyY { x: 0.3457, y: 0.3585, Y: 1.0 }
}

/// D65 white point.
fn d65_white() -> CIExyY {
    CIExyY { x: 0.3127, y: 0.3290, Y: 1.0 }
}

/// sRGB / Rec.709 primaries.
fn srgb_primaries() -> CIExyYTRIPLE {
    CIExyYTRIPLE {
        Red: CIExyY { x: 0.6400, y: 0.3300, Y: 1.0 },
        Green: CIExyY { x: 0.3000, y: 0.6000, Y: 1.0 },
        Blue: CIExyY { x: 0.1500, y: 0.0600, Y: 1.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_follow_params() {
        let a = BuiltinProfile::Lab { white_point: (0.3457, 0.3585) };
        let b = BuiltinProfile::Lab { white_point: (0.3457, 0.3585) };
        let c = BuiltinProfile::Lab { white_point: (0.3127, 0.3290) };
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
        assert_ne!(BuiltinProfile::Srgb.cache_key(), BuiltinProfile::LinearSrgb.cache_key());
    }

    #[test]
    fn test_all_serialize() {
        let kinds = [
            BuiltinProfile::Srgb,
            BuiltinProfile::Xyz,
            BuiltinProfile::lab_d50(),
            BuiltinProfile::LinearSrgb,
            BuiltinProfile::AdobeRgb,
            BuiltinProfile::DisplayP3,
            BuiltinProfile::Rec2020,
            BuiltinProfile::Gray { gamma: 2.2 },
        ];
        for kind in kinds {
            let data = kind.to_icc().unwrap();
            assert!(data.len() > 128, "{:?}", kind);
        }
    }
}
