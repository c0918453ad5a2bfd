//! The sample bundle state machine.
//!
//! A [`Sample`] accumulates registrations in memory and, in lazy mode, the
//! file writes they imply in an [`ActionQueue`]. [`Sample::write`] runs the
//! queue in registration order and then serializes the manifest. Validation
//! happens at registration time, before anything is queued, so a rejected
//! call leaves both the manifest and the queue untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use loopy_core::{Algorithm, LoopyError, Result, Summarizable};
use loopy_feature::encode::INDEX_LABEL;
use loopy_feature::{
    check_numeric, compress_chunked_features, join, sparse_compress_chunked_features,
    validate_coords, validate_features, write_plain_csv, JoinConfig, SparseLayout,
};
use loopy_image::{GeoTiff, SourceOptions, TileConfig};
use loopy_io::Table;

use crate::params::{
    Channels, ChunkedCsvParams, Color, CoordParams, DataType, FeatureAndGroup, FeatureParams,
    ImageParams, OverlayParams, PlainCsvParams, SampleManifest, Shape,
};
use crate::queue::ActionQueue;
use crate::url::Url;

/// Manifest file name inside a sample directory.
pub const MANIFEST_FILE: &str = "sample.json";

/// Default coordinate marker diameter in meters.
pub const DEFAULT_MARKER_SIZE: f64 = 1e-2;

/// Behaviour of a [`Sample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleOptions {
    /// Queue file writes until [`Sample::write`] instead of running them
    /// at registration.
    pub lazy: bool,
    pub join: JoinConfig,
    pub tile: TileConfig,
    /// Record compression of chunked features.
    pub algorithm: Algorithm,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            lazy: true,
            join: JoinConfig::default(),
            tile: TileConfig::default(),
            algorithm: Algorithm::default(),
        }
    }
}

/// Arguments of [`Sample::add_image`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    /// Channel names; `C1..Cn` when unset.
    pub channels: Option<Channels>,
    /// Meters per pixel.
    pub scale: f64,
    pub translate: (f64, f64),
    /// JPEG quality override for this image.
    pub quality: Option<u8>,
    pub convert_to_8bit: bool,
    pub default_channels: Option<BTreeMap<Color, String>>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            channels: None,
            scale: 1.0,
            translate: (0.0, 0.0),
            quality: None,
            convert_to_8bit: false,
            default_channels: None,
        }
    }
}

/// Arguments of [`Sample::add_chunked_feature`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkedOptions {
    /// Store only non-zero values, one chunk per feature.
    pub sparse: bool,
    pub unit: Option<String>,
    pub data_type: DataType,
}

/// Markdown documents a bundle can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markdown {
    Notes,
    Metadata,
}

impl Markdown {
    pub fn file_name(self) -> &'static str {
        match self {
            Markdown::Notes => "notes.md",
            Markdown::Metadata => "metadata.md",
        }
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| LoopyError::io_at(path, e))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LoopyError::io_at(path, e)),
    }
}

fn read_manifest(dir: &Path) -> Result<SampleManifest> {
    let path = dir.join(MANIFEST_FILE);
    let text = fs::read_to_string(&path).map_err(|e| LoopyError::io_at(&path, e))?;
    SampleManifest::from_json(&text)
        .map_err(|e| LoopyError::Parse(format!("{}: {e}", path.display())))
}

/// Names become file names, so they must be a single path component.
fn check_name(name: &str, what: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
    {
        return Err(LoopyError::InvalidInput(format!(
            "invalid {what} name '{name}'"
        )));
    }
    Ok(())
}

/// Join `features` onto the ids stored in the coordinate CSV at `coords_csv`.
fn join_on_coords(
    coords_csv: &Path,
    features: &Table,
    name: &str,
    config: &JoinConfig,
) -> Result<Table> {
    let coords = loopy_io::read_table(coords_csv)?;
    join(&coords, features, name, config)
}

/// One sample bundle under construction.
#[derive(Debug)]
pub struct Sample {
    manifest: SampleManifest,
    path: Option<PathBuf>,
    options: SampleOptions,
    queue: ActionQueue,
}

impl Sample {
    /// An unbound sample. Set a directory with [`Sample::set_path`] before
    /// registering anything.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LoopyError::InvalidInput("sample name must not be empty".into()));
        }
        Ok(Self::from_manifest(SampleManifest::new(name)))
    }

    /// Wrap an existing manifest, unbound.
    pub fn from_manifest(manifest: SampleManifest) -> Self {
        Self {
            manifest,
            path: None,
            options: SampleOptions::default(),
            queue: ActionQueue::new(),
        }
    }

    /// Open the bundle at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut sample = Self::from_manifest(read_manifest(path)?);
        sample.path = Some(path.to_path_buf());
        Ok(sample)
    }

    /// Bind to `path`, creating it if needed.
    ///
    /// An existing `sample.json` there is loaded and `name`, when given,
    /// overrides its name. Without an existing manifest `name` is required.
    pub fn bind(name: Option<&str>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let existing = path.join(MANIFEST_FILE).is_file();
        create_dir(path)?;

        let mut sample = match (existing, name) {
            (true, name) => {
                let overrides = SampleManifest::new(name.unwrap_or_default());
                Self::load(path)?.merge(overrides)
            }
            (false, Some(name)) => Self::new(name)?,
            (false, None) => {
                return Err(LoopyError::InvalidInput(format!(
                    "a sample name is required: {} has no {MANIFEST_FILE}",
                    path.display()
                )))
            }
        };
        sample.path = Some(path.to_path_buf());
        log::info!("'{}' bound to {}", sample.name(), path.display());
        Ok(sample)
    }

    /// Shallow-merge `overrides` into the manifest.
    pub fn merge(mut self, overrides: SampleManifest) -> Self {
        self.manifest = self.manifest.merge(overrides);
        self
    }

    pub fn with_options(mut self, options: SampleOptions) -> Self {
        self.options = options;
        self
    }

    /// Re-bind to another directory, creating it. Files already written
    /// elsewhere are not moved.
    pub fn set_path(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        create_dir(path)?;
        self.path = Some(path.to_path_buf());
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn manifest(&self) -> &SampleManifest {
        &self.manifest
    }

    pub fn options(&self) -> &SampleOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SampleOptions {
        &mut self.options
    }

    /// Labels of queued actions, oldest first.
    pub fn pending(&self) -> Vec<&str> {
        self.queue.labels()
    }

    fn dir(&self) -> Result<PathBuf> {
        self.path.clone().ok_or_else(|| {
            LoopyError::InvalidInput(format!(
                "sample '{}' has no path; call set_path first",
                self.manifest.name
            ))
        })
    }

    /// Queue `action` in lazy mode, run it now otherwise.
    fn submit(
        &mut self,
        label: String,
        action: impl FnOnce() -> Result<()> + 'static,
    ) -> Result<()> {
        if self.options.lazy {
            log::debug!("'{}' queued: {label}", self.manifest.name);
            self.queue.push(label, action);
            Ok(())
        } else {
            action()
        }
    }

    /// Drop the most recently queued action. Its descriptor stays in the
    /// manifest.
    pub fn do_not_execute_previous(&mut self) -> Result<&mut Self> {
        let label = self
            .queue
            .pop()
            .ok_or_else(|| LoopyError::InvalidInput("no queued action to drop".into()))?;
        log::info!("'{}' dropped queued action: {label}", self.manifest.name);
        Ok(self)
    }

    // -----------------------------------------------------------------------
    // Image
    // -----------------------------------------------------------------------

    /// Register a TIFF image. Its channels are tiled into groups of
    /// [`TileConfig::group_size`] named after the TIFF's stem.
    ///
    /// A second call adds its tiles and channels to the existing image.
    pub fn add_image(&mut self, tiff: impl AsRef<Path>, opts: ImageOptions) -> Result<&mut Self> {
        let dir = self.dir()?;
        let tiff = tiff.as_ref();
        if !tiff.is_file() {
            return Err(LoopyError::InvalidInput(format!(
                "TIFF file {} not found",
                tiff.display()
            )));
        }
        let ext = tiff
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !matches!(ext.as_deref(), Some("tif" | "tiff")) {
            return Err(LoopyError::InvalidInput(format!(
                "{} is not a .tif or .tiff file",
                tiff.display()
            )));
        }
        let stem = tiff
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| LoopyError::InvalidInput(format!("invalid file name {}", tiff.display())))?;

        let source = SourceOptions {
            scale: opts.scale,
            translate: opts.translate,
            rgb: opts.channels == Some(Channels::Rgb),
            convert_to_8bit: opts.convert_to_8bit,
        };
        let geo = GeoTiff::from_tiff(tiff, source)?;

        let channels = opts
            .channels
            .unwrap_or_else(|| Channels::numbered(geo.channels()));
        if channels.len() != geo.channels() {
            return Err(LoopyError::InvalidInput(format!(
                "expected {} channels, got {}",
                geo.channels(),
                channels.len()
            )));
        }
        channels.validate()?;
        if let (Some(defaults), Channels::Named(names)) = (&opts.default_channels, &channels) {
            if let Some(unknown) = defaults.values().find(|c| !names.contains(c)) {
                return Err(LoopyError::InvalidInput(format!(
                    "default channel '{unknown}' is not one of the image channels"
                )));
            }
        }

        let mut tile = self.options.tile.clone();
        if opts.quality.is_some() {
            tile.quality = opts.quality;
        }
        let (dtype, max_val, scale) = (geo.dtype(), geo.max_value(), geo.scale());
        let job = geo.plan(dir.join(format!("{stem}.tif")), tile)?;
        let names = job.names();
        log::info!("'{}' adding image {}: {}", self.manifest.name, tiff.display(), job.summary());

        let img_params = match &self.manifest.img_params {
            Some(existing) => {
                let mut merged = existing.clone();
                merged.add_from_names(&names, channels)?;
                merged
            }
            None => ImageParams {
                default_channels: opts.default_channels,
                dtype: Some(dtype),
                max_val: Some(max_val),
                translate: Some(opts.translate),
                ..ImageParams::from_names(&names, channels, scale)
            },
        };

        self.submit(format!("Add image: {}", tiff.display()), move || {
            job.run().map(|_| ())
        })?;
        self.manifest.img_params = Some(img_params);
        Ok(self)
    }

    // -----------------------------------------------------------------------
    // Coordinates
    // -----------------------------------------------------------------------

    /// Register a coordinate set: ids as the table index, `x` and `y`
    /// columns. Replaces any set of the same name.
    pub fn add_coords(
        &mut self,
        table: Table,
        name: &str,
        m_per_px: f64,
        size: f64,
    ) -> Result<&mut Self> {
        let dir = self.dir()?;
        check_name(name, "coordinate set")?;
        if self.manifest.feature(name).is_some() {
            return Err(LoopyError::Consistency(format!(
                "'{name}' is already registered as a feature"
            )));
        }
        validate_coords(&table, name)?;

        log::info!("'{}' adding coords '{name}'", self.manifest.name);
        let file = format!("{name}.csv");
        let out = dir.join(&file);
        self.submit(format!("Add coords {name}"), move || {
            loopy_io::write_table(&table, INDEX_LABEL, &out)
        })?;

        let coords = self.manifest.coord_params.get_or_insert_with(Vec::new);
        coords.retain(|c| c.name != name);
        coords.push(CoordParams {
            name: name.to_string(),
            shape: Shape::Circle,
            url: Url::local(file),
            m_per_px: Some(m_per_px),
            size: Some(size),
        });
        Ok(self)
    }

    /// Remove a coordinate set and its CSV.
    pub fn delete_coords(&mut self, name: &str) -> Result<&mut Self> {
        let not_found = || LoopyError::InvalidInput(format!("coordinate set '{name}' not found"));
        let coords = self.manifest.coord_params.as_mut().ok_or_else(not_found)?;
        let pos = coords.iter().position(|c| c.name == name).ok_or_else(not_found)?;
        let removed = coords.remove(pos);

        let dependents: Vec<&str> = self
            .manifest
            .feat_params
            .iter()
            .flatten()
            .filter(|f| f.coord_name() == Some(name))
            .map(FeatureParams::name)
            .collect();
        if !dependents.is_empty() {
            log::warn!(
                "'{}' features {dependents:?} still reference deleted coords '{name}'",
                self.manifest.name
            );
        }

        if let Some(dir) = &self.path {
            remove_if_exists(&dir.join(&removed.url.url))?;
        }
        Ok(self)
    }

    // -----------------------------------------------------------------------
    // Features
    // -----------------------------------------------------------------------

    /// Shared checks of feature registration. Returns the output directory
    /// and the CSV of the referenced coordinate set.
    fn prepare_feature(
        &self,
        table: &Table,
        name: &str,
        coord_name: &str,
    ) -> Result<(PathBuf, PathBuf)> {
        let dir = self.dir()?;
        check_name(name, "feature")?;
        let coord = self.manifest.coord(coord_name).ok_or_else(|| {
            LoopyError::InvalidInput(format!(
                "coordinate set '{coord_name}' not found; register it with add_coords first"
            ))
        })?;
        if self.manifest.coord(name).is_some() {
            return Err(LoopyError::Consistency(format!(
                "'{name}' is already registered as a coordinate set"
            )));
        }
        validate_features(table, name)?;
        let coords_csv = dir.join(&coord.url.url);
        Ok((dir, coords_csv))
    }

    fn replace_feature(&mut self, feature: FeatureParams) {
        let features = self.manifest.feat_params.get_or_insert_with(Vec::new);
        features.retain(|f| f.name() != feature.name());
        features.push(feature);
    }

    /// Register a feature written as one CSV aligned on `coord_name`'s ids.
    pub fn add_csv_feature(
        &mut self,
        table: Table,
        name: &str,
        coord_name: &str,
        data_type: DataType,
    ) -> Result<&mut Self> {
        let (dir, coords_csv) = self.prepare_feature(&table, name, coord_name)?;
        log::info!("'{}' adding csv feature '{name}'", self.manifest.name);

        let file = format!("{name}.csv");
        let out = dir.join(&file);
        let join_config = self.options.join;
        let feature = name.to_string();
        self.submit(format!("Add csv feature {name}"), move || {
            let joined = join_on_coords(&coords_csv, &table, &feature, &join_config)?;
            write_plain_csv(&joined, &out)
        })?;

        self.replace_feature(FeatureParams::Plain(PlainCsvParams {
            name: name.to_string(),
            url: Url::local(file),
            data_type,
            coord_name: Some(coord_name.to_string()),
            unit: None,
            size: None,
        }));
        Ok(self)
    }

    /// Register a feature matrix as a chunked store (`<name>.bin` plus the
    /// `<name>.json` header), one chunk per column. Sparse stores keep only
    /// the non-zero values of each column.
    pub fn add_chunked_feature(
        &mut self,
        table: Table,
        name: &str,
        coord_name: &str,
        opts: ChunkedOptions,
    ) -> Result<&mut Self> {
        let (dir, coords_csv) = self.prepare_feature(&table, name, coord_name)?;
        if Some(name) == Path::new(MANIFEST_FILE).file_stem().and_then(|s| s.to_str()) {
            return Err(LoopyError::InvalidInput(format!(
                "chunked feature '{name}' would overwrite {MANIFEST_FILE}"
            )));
        }
        if opts.sparse {
            check_numeric(&table)?;
        }
        log::info!("'{}' adding chunked feature '{name}'", self.manifest.name);

        let bin_file = format!("{name}.bin");
        let header_file = format!("{name}.json");
        let (bin_path, header_path) = (dir.join(&bin_file), dir.join(&header_file));
        let join_config = self.options.join;
        let algorithm = self.options.algorithm;
        let sample = self.manifest.name.clone();
        let (feature, coords) = (name.to_string(), coord_name.to_string());
        let sparse = opts.sparse;

        self.submit(format!("Add chunked {name}"), move || {
            let joined = join_on_coords(&coords_csv, &table, &feature, &join_config)?;
            let mut progress = |msg: &str| log::info!("'{sample}' {msg}");
            let (mut header, blob) = if sparse {
                sparse_compress_chunked_features(&joined, SparseLayout::Csc, algorithm, &mut progress)?
            } else {
                compress_chunked_features(&joined, algorithm, &mut progress)?
            };
            header.coord_name = Some(coords);
            log::info!(
                "'{sample}' writing {} bytes of compressed chunks for '{feature}'",
                blob.bytes.len()
            );
            header.write(&header_path)?;
            fs::write(&bin_path, &blob.bytes).map_err(|e| LoopyError::io_at(&bin_path, e))
        })?;

        self.replace_feature(FeatureParams::Chunked(ChunkedCsvParams {
            name: name.to_string(),
            url: Url::local(bin_file),
            coord_name: coord_name.to_string(),
            header_url: Some(Url::local(header_file)),
            data_type: opts.data_type,
            unit: opts.unit,
        }));
        Ok(self)
    }

    /// Remove a feature and whichever of its `.csv`, `.bin` and `.json`
    /// files exist.
    pub fn delete_feature(&mut self, name: &str) -> Result<&mut Self> {
        let not_found = || LoopyError::InvalidInput(format!("feature '{name}' not found"));
        let features = self.manifest.feat_params.as_mut().ok_or_else(not_found)?;
        let pos = features
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(not_found)?;
        features.remove(pos);

        if let Some(dir) = &self.path {
            for ext in ["csv", "bin", "json"] {
                remove_if_exists(&dir.join(format!("{name}.{ext}")))?;
            }
        }
        Ok(self)
    }

    /// Show `feature` when the sample opens. Adding the same pair twice is a
    /// no-op.
    pub fn set_default_feature(&mut self, feature: &str, group: Option<&str>) -> &mut Self {
        let entry = FeatureAndGroup {
            group: group.map(String::from),
            feature: feature.to_string(),
        };
        let defaults = self
            .manifest
            .overlay_params
            .get_or_insert_with(OverlayParams::default)
            .defaults
            .get_or_insert_with(Vec::new);
        if !defaults.contains(&entry) {
            defaults.push(entry);
        }
        self
    }

    // -----------------------------------------------------------------------
    // Pass-through files
    // -----------------------------------------------------------------------

    /// Write a markdown document into the bundle and reference it.
    pub fn attach_markdown(&mut self, kind: Markdown, text: impl Into<String>) -> Result<&mut Self> {
        let dir = self.dir()?;
        let file = kind.file_name();
        let out = dir.join(file);
        let text = text.into();
        self.submit(format!("Add {file}"), move || {
            fs::write(&out, text).map_err(|e| LoopyError::io_at(&out, e))
        })?;
        let url = Some(Url::local(file));
        match kind {
            Markdown::Notes => self.manifest.notes_md = url,
            Markdown::Metadata => self.manifest.metadata_md = url,
        }
        Ok(self)
    }

    /// Copy a file such as `web_summary.html` into the bundle verbatim.
    pub fn copy_artifact(&mut self, src: impl AsRef<Path>) -> Result<&mut Self> {
        let dir = self.dir()?;
        let src = src.as_ref().to_path_buf();
        if !src.is_file() {
            return Err(LoopyError::InvalidInput(format!(
                "{} not found",
                src.display()
            )));
        }
        let file_name = src
            .file_name()
            .ok_or_else(|| LoopyError::InvalidInput(format!("invalid file name {}", src.display())))?
            .to_owned();
        let out = dir.join(&file_name);
        self.submit(format!("Copy {}", src.display()), move || {
            fs::copy(&src, &out)
                .map(|_| ())
                .map_err(|e| LoopyError::io_at(&src, e))
        })?;
        Ok(self)
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Run every queued action, then write `sample.json`.
    ///
    /// A failing action is reported as [`LoopyError::Deferred`] with its
    /// label; actions queued after it stay pending and the manifest is not
    /// written.
    pub fn write(&mut self) -> Result<&mut Self> {
        let dir = self.dir()?;
        if !self.queue.is_empty() {
            log::info!(
                "'{}' executing {} queued actions",
                self.manifest.name,
                self.queue.len()
            );
            self.queue.run_all()?;
        }

        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, self.manifest.to_json()?).map_err(|e| LoopyError::io_at(&path, e))?;
        log::info!("'{}' written to {}", self.manifest.name, dir.display());
        Ok(self)
    }
}

impl Summarizable for Sample {
    fn summary(&self) -> String {
        let path = self
            .path
            .as_ref()
            .map_or_else(|| "None".to_string(), |p| p.display().to_string());
        format!(
            "Sample(name={}, path={path}) with {:?} as coords and {:?} as features.",
            self.manifest.name,
            self.manifest.coord_names(),
            self.manifest.feature_names()
        )
    }
}
