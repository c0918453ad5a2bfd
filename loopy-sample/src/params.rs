//! The manifest data model, serialized as `sample.json`.
//!
//! Field names follow the viewer's camelCase schema. Optional fields that
//! are unset are left out of the JSON entirely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use loopy_core::{LoopyError, Result};
use loopy_io::Dtype;

use crate::url::Url;

/// Longest accepted channel name.
pub const MAX_CHANNEL_NAME: usize = 255;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// Marker drawn for each coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Circle,
}

/// One registered coordinate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordParams {
    pub name: String,
    pub shape: Shape,
    /// `id,x,y` CSV.
    pub url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m_per_px: Option<f64>,
    /// Marker diameter in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// How the viewer colors a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Quantitative,
    Categorical,
    Singular,
}

/// A feature stored as one CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainCsvParams {
    pub name: String,
    pub url: Url,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

/// A feature stored as a chunked `.bin` blob plus a JSON header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedCsvParams {
    pub name: String,
    pub url: Url,
    pub coord_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_url: Option<Url>,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ChunkedCsvParams {
    /// The header location, defaulting to `url` with a `.json` extension.
    pub fn header_url(&self) -> Url {
        self.header_url.clone().unwrap_or_else(|| {
            let stem = self
                .url
                .url
                .rsplit_once('.')
                .map_or(self.url.url.as_str(), |(stem, _)| stem);
            Url {
                url: format!("{stem}.json"),
                kind: self.url.kind,
            }
        })
    }
}

/// A registered feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeatureParams {
    #[serde(rename = "plainCSV")]
    Plain(PlainCsvParams),
    #[serde(rename = "chunkedCSV")]
    Chunked(ChunkedCsvParams),
}

impl FeatureParams {
    pub fn name(&self) -> &str {
        match self {
            FeatureParams::Plain(p) => &p.name,
            FeatureParams::Chunked(c) => &c.name,
        }
    }

    /// The coordinate set this feature is drawn on.
    pub fn coord_name(&self) -> Option<&str> {
        match self {
            FeatureParams::Plain(p) => p.coord_name.as_deref(),
            FeatureParams::Chunked(c) => Some(&c.coord_name),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            FeatureParams::Plain(p) => p.data_type,
            FeatureParams::Chunked(c) => c.data_type,
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            FeatureParams::Plain(p) => &p.url,
            FeatureParams::Chunked(c) => &c.url,
        }
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// Channel names of an image, or the literal `"rgb"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChannelsRepr", into = "ChannelsRepr")]
pub enum Channels {
    Rgb,
    Named(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ChannelsRepr {
    Named(Vec<String>),
    Word(String),
}

impl TryFrom<ChannelsRepr> for Channels {
    type Error = String;

    fn try_from(repr: ChannelsRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ChannelsRepr::Named(names) => Ok(Channels::Named(names)),
            ChannelsRepr::Word(w) if w == "rgb" => Ok(Channels::Rgb),
            ChannelsRepr::Word(w) => Err(format!("expected a list of channels or \"rgb\", got \"{w}\"")),
        }
    }
}

impl From<Channels> for ChannelsRepr {
    fn from(c: Channels) -> Self {
        match c {
            Channels::Rgb => ChannelsRepr::Word("rgb".into()),
            Channels::Named(names) => ChannelsRepr::Named(names),
        }
    }
}

impl Channels {
    /// `C1..Cn`.
    pub fn numbered(n: usize) -> Self {
        Channels::Named((1..=n).map(|i| format!("C{i}")).collect())
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        match self {
            Channels::Rgb => 3,
            Channels::Named(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that names are unique, alphanumeric (`_` allowed) and at most
    /// [`MAX_CHANNEL_NAME`] characters long.
    pub fn validate(&self) -> Result<()> {
        let Channels::Named(names) = self else {
            return Ok(());
        };
        let mut seen = std::collections::HashSet::new();
        for name in names {
            if name.is_empty()
                || name.len() > MAX_CHANNEL_NAME
                || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(LoopyError::InvalidInput(format!(
                    "channel name '{name}' must be 1-{MAX_CHANNEL_NAME} alphanumeric or '_' characters"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(LoopyError::InvalidInput(format!(
                    "channel name '{name}' is used more than once"
                )));
            }
        }
        Ok(())
    }
}

/// Display colors the viewer can assign to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Green,
    Red,
    Magenta,
    Cyan,
    Yellow,
    White,
}

/// The image of a sample: one URL per tile file, in channel-group order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParams {
    pub urls: Vec<Url>,
    pub channels: Channels,
    pub m_per_px: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_channels: Option<BTreeMap<Color, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<Dtype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_val: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate: Option<(f64, f64)>,
}

impl ImageParams {
    /// Descriptor for freshly tiled files.
    pub fn from_names(names: &[String], channels: Channels, m_per_px: f64) -> Self {
        Self {
            urls: names.iter().map(Url::local).collect(),
            channels,
            m_per_px,
            default_channels: None,
            dtype: None,
            max_val: None,
            translate: None,
        }
    }

    /// Append the tiles and channels of another image with the same
    /// geometry.
    pub fn add_from_names(&mut self, names: &[String], channels: Channels) -> Result<()> {
        let (Channels::Named(existing), Channels::Named(added)) = (&mut self.channels, &channels)
        else {
            return Err(LoopyError::InvalidInput(
                "RGB images cannot be combined with other images".into(),
            ));
        };
        if let Some(dup) = added.iter().find(|c| existing.contains(c)) {
            return Err(LoopyError::InvalidInput(format!(
                "channel name '{dup}' is already part of the image"
            )));
        }
        if let Some(dup) = names.iter().find(|n| self.urls.iter().any(|u| &u.url == *n)) {
            return Err(LoopyError::InvalidInput(format!(
                "tile file '{dup}' is already part of the image"
            )));
        }
        existing.extend(added.iter().cloned());
        self.urls.extend(names.iter().map(Url::local));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Overlays and the manifest
// ---------------------------------------------------------------------------

/// A feature, optionally within a chunked group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureAndGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub feature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayParams {
    /// Features shown when the sample is opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Vec<FeatureAndGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important_features: Option<Vec<FeatureAndGroup>>,
}

/// Everything `sample.json` holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_params: Option<ImageParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord_params: Option<Vec<CoordParams>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feat_params: Option<Vec<FeatureParams>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_params: Option<OverlayParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_md: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_md: Option<Url>,
}

impl SampleManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Shallow merge: every top-level field set in `other` replaces the one
    /// in `self`. Nested lists are replaced, not unioned.
    pub fn merge(self, other: SampleManifest) -> SampleManifest {
        SampleManifest {
            name: if other.name.is_empty() { self.name } else { other.name },
            img_params: other.img_params.or(self.img_params),
            coord_params: other.coord_params.or(self.coord_params),
            feat_params: other.feat_params.or(self.feat_params),
            overlay_params: other.overlay_params.or(self.overlay_params),
            notes_md: other.notes_md.or(self.notes_md),
            metadata_md: other.metadata_md.or(self.metadata_md),
        }
    }

    pub fn coord(&self, name: &str) -> Option<&CoordParams> {
        self.coord_params.as_ref()?.iter().find(|c| c.name == name)
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureParams> {
        self.feat_params.as_ref()?.iter().find(|f| f.name() == name)
    }

    pub fn coord_names(&self) -> Vec<&str> {
        self.coord_params
            .iter()
            .flatten()
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.feat_params.iter().flatten().map(FeatureParams::name).collect()
    }

    /// Parse `sample.json` contents.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_tagging() {
        let f = FeatureParams::Plain(PlainCsvParams {
            name: "gene".into(),
            url: Url::local("gene.csv"),
            data_type: DataType::Quantitative,
            coord_name: Some("spots".into()),
            unit: None,
            size: None,
        });
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(
            json,
            r#"{"type":"plainCSV","name":"gene","url":{"url":"gene.csv","type":"local"},"dataType":"quantitative","coordName":"spots"}"#
        );
        assert_eq!(serde_json::from_str::<FeatureParams>(&json).unwrap(), f);
    }

    #[test]
    fn test_chunked_header_url_default() {
        let c = ChunkedCsvParams {
            name: "genes".into(),
            url: Url::local("genes.bin"),
            coord_name: "spots".into(),
            header_url: None,
            data_type: DataType::Quantitative,
            unit: None,
        };
        assert_eq!(c.header_url(), Url::local("genes.json"));
        let json = serde_json::to_value(FeatureParams::Chunked(c)).unwrap();
        assert_eq!(json["type"], "chunkedCSV");
        assert!(json.get("headerUrl").is_none());
    }

    #[test]
    fn test_channels_serde() {
        assert_eq!(serde_json::to_string(&Channels::Rgb).unwrap(), "\"rgb\"");
        let named: Channels = serde_json::from_str(r#"["DAPI","GFP"]"#).unwrap();
        assert_eq!(named.len(), 2);
        assert!(serde_json::from_str::<Channels>("\"cmyk\"").is_err());
    }

    #[test]
    fn test_channel_validation() {
        assert!(Channels::numbered(3).validate().is_ok());
        let bad = Channels::Named(vec!["DAPI".into(), "has space".into()]);
        assert!(bad.validate().unwrap_err().to_string().contains("has space"));
        let dup = Channels::Named(vec!["A".into(), "A".into()]);
        assert!(dup.validate().is_err());
        let long = Channels::Named(vec!["a".repeat(256)]);
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_image_add_from_names() {
        let mut img = ImageParams::from_names(&["a.tif".into()], Channels::numbered(2), 0.5);
        img.add_from_names(&["b.tif".into()], Channels::Named(vec!["X".into()]))
            .unwrap();
        assert_eq!(img.urls.len(), 2);
        assert_eq!(img.channels.len(), 3);
        assert!(img
            .add_from_names(&["c.tif".into()], Channels::Named(vec!["X".into()]))
            .is_err());
    }

    #[test]
    fn test_default_channels_keys() {
        let mut img = ImageParams::from_names(&["a.tif".into()], Channels::numbered(1), 1.0);
        img.default_channels = Some(BTreeMap::from([(Color::Red, "C1".to_string())]));
        let json = serde_json::to_value(&img).unwrap();
        assert_eq!(json["defaultChannels"]["red"], "C1");
        assert_eq!(json["mPerPx"], 1.0);
    }

    #[test]
    fn test_shallow_merge() {
        let mut base = SampleManifest::new("old");
        base.notes_md = Some(Url::local("notes.md"));
        base.coord_params = Some(vec![CoordParams {
            name: "spots".into(),
            shape: Shape::Circle,
            url: Url::local("spots.csv"),
            m_per_px: None,
            size: None,
        }]);

        let mut over = SampleManifest::new("");
        over.coord_params = Some(vec![]);
        let merged = base.merge(over);
        assert_eq!(merged.name, "old");
        assert_eq!(merged.notes_md, Some(Url::local("notes.md")));
        assert!(merged.coord_names().is_empty());
    }
}
