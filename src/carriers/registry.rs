//! Carrier registry: the per-carrier crop and stamp layout table.
//!
//! Every carrier is a pure data record. Geometry for a concrete page is
//! computed by [`CropRule::resolve`], shared by all carriers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Known carriers. `Autres` is the fallback for anything unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CarrierKey {
    Chronopost,
    VintedGo,
    MondialRelay,
    RelaisColis,
    Ups,
    Colissimo,
    Autres,
}

impl CarrierKey {
    /// Folder-safe string form, also used as the lookup key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chronopost => "chronopost",
            Self::VintedGo => "vinted-go",
            Self::MondialRelay => "mondial-relay",
            Self::RelaisColis => "relais-colis",
            Self::Ups => "ups",
            Self::Colissimo => "colissimo",
            Self::Autres => "autres",
        }
    }
}

impl fmt::Display for CarrierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CarrierKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chronopost" => Ok(Self::Chronopost),
            "vinted-go" => Ok(Self::VintedGo),
            "mondial-relay" => Ok(Self::MondialRelay),
            "relais-colis" => Ok(Self::RelaisColis),
            "ups" => Ok(Self::Ups),
            "colissimo" => Ok(Self::Colissimo),
            "autres" => Ok(Self::Autres),
            other => Err(format!("unknown carrier: {other}")),
        }
    }
}

/// Page rotation applied after cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    None,
    /// 90° clockwise.
    Rotate90,
}

/// A point in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Resolved crop rectangle for one page, relative to the page origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropGeometry {
    pub lower_left: Point,
    pub upper_right: Point,
    pub rotation: Rotation,
}

impl CropGeometry {
    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    /// Move `point` inside the rectangle, keeping `margin` from the edges
    /// when the rectangle is large enough.
    pub fn clamp_point(&self, point: Point, margin: f64) -> Point {
        let clamp = |v: f64, lo: f64, hi: f64| {
            if hi - lo > 2.0 * margin {
                v.clamp(lo + margin, hi - margin)
            } else {
                v.clamp(lo, hi)
            }
        };
        Point::new(
            clamp(point.x, self.lower_left.x, self.upper_right.x),
            clamp(point.y, self.lower_left.y, self.upper_right.y),
        )
    }
}

/// Fractional crop rectangle: each edge is a fraction of the page dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRule {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
    pub rotation: Rotation,
}

impl CropRule {
    pub const fn new(left: f64, bottom: f64, right: f64, top: f64, rotation: Rotation) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
            rotation,
        }
    }

    /// Resolve the rule against a page of `width` × `height`.
    ///
    /// Coordinates are rounded to the nearest integer, then clamped to
    /// `[0, floor(width)] × [0, floor(height)]`.
    pub fn resolve(&self, width: f64, height: f64) -> CropGeometry {
        let max_x = width.max(0.0).floor();
        let max_y = height.max(0.0).floor();
        let snap = |fraction: f64, extent: f64, max: f64| (fraction * extent).round().clamp(0.0, max);

        let x0 = snap(self.left, width, max_x);
        let x1 = snap(self.right, width, max_x);
        let y0 = snap(self.bottom, height, max_y);
        let y1 = snap(self.top, height, max_y);

        CropGeometry {
            lower_left: Point::new(x0.min(x1), y0.min(y1)),
            upper_right: Point::new(x0.max(x1), y0.max(y1)),
            rotation: self.rotation,
        }
    }
}

/// Fractional anchor for the identifier stamp, in the uncropped page frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn resolve(&self, width: f64, height: f64) -> Point {
        Point::new(self.x * width, self.y * height)
    }
}

/// Layout record for one carrier.
#[derive(Debug, Clone, Serialize)]
pub struct CarrierProfile {
    pub key: CarrierKey,
    /// Name as it appears in carrier emails (matched case-insensitively).
    pub display_name: &'static str,
    pub crop: CropRule,
    pub anchor: Anchor,
}

impl CarrierProfile {
    pub fn crop_geometry(&self, width: f64, height: f64) -> CropGeometry {
        self.crop.resolve(width, height)
    }

    /// Stamp position in the uncropped frame, kept inside the crop rectangle.
    pub fn stamp_position(&self, width: f64, height: f64) -> Point {
        let geometry = self.crop_geometry(width, height);
        geometry.clamp_point(self.anchor.resolve(width, height), STAMP_MARGIN)
    }
}

/// Minimum distance kept between the stamp and the crop edges.
const STAMP_MARGIN: f64 = 4.0;

/// Immutable carrier table, built once and shared.
#[derive(Debug, Clone)]
pub struct CarrierRegistry {
    profiles: Vec<CarrierProfile>,
    fallback: CarrierProfile,
}

impl CarrierRegistry {
    /// The standard carrier table.
    pub fn standard() -> Self {
        let profile = |key: CarrierKey, display_name: &'static str, crop: CropRule, anchor: Anchor| {
            CarrierProfile {
                key,
                display_name,
                crop,
                anchor,
            }
        };

        let profiles = vec![
            profile(
                CarrierKey::Chronopost,
                "Chronopost",
                CropRule::new(0.5, 0.0, 1.0, 1.0, Rotation::None),
                Anchor::new(0.52, 0.03),
            ),
            profile(
                CarrierKey::VintedGo,
                "Vinted Go",
                CropRule::new(0.0, 0.5, 0.5, 1.0, Rotation::None),
                Anchor::new(0.02, 0.52),
            ),
            profile(
                CarrierKey::MondialRelay,
                "Mondial Relay",
                CropRule::new(0.0, 0.5, 1.0, 1.0, Rotation::Rotate90),
                Anchor::new(0.02, 0.52),
            ),
            profile(
                CarrierKey::RelaisColis,
                "Relais Colis",
                CropRule::new(0.0, 0.0, 0.5, 1.0, Rotation::None),
                Anchor::new(0.02, 0.03),
            ),
            profile(
                CarrierKey::Ups,
                "UPS Access",
                CropRule::new(0.0, 0.233, 0.401, 1.0, Rotation::None),
                Anchor::new(0.02, 0.25),
            ),
            profile(
                CarrierKey::Colissimo,
                "La Poste",
                CropRule::new(0.0, 0.0, 0.5, 1.0, Rotation::None),
                Anchor::new(0.02, 0.03),
            ),
        ];

        let fallback = profile(
            CarrierKey::Autres,
            "Autres",
            CropRule::new(0.0, 0.0, 1.0, 1.0, Rotation::None),
            Anchor::new(0.02, 0.03),
        );

        Self { profiles, fallback }
    }

    /// Look up by string key. Unknown keys return the fallback profile.
    pub fn lookup(&self, key: &str) -> &CarrierProfile {
        match key.parse::<CarrierKey>() {
            Ok(key) => self.profile(key),
            Err(_) => &self.fallback,
        }
    }

    /// Typed lookup.
    pub fn profile(&self, key: CarrierKey) -> &CarrierProfile {
        self.profiles
            .iter()
            .find(|p| p.key == key)
            .unwrap_or(&self.fallback)
    }

    /// Registered carriers in classification order, fallback excluded.
    pub fn profiles(&self) -> impl Iterator<Item = &CarrierProfile> {
        self.profiles.iter()
    }

    pub fn fallback(&self) -> &CarrierProfile {
        &self.fallback
    }
}

impl Default for CarrierRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
