//! Built-in dataset layouts and the factory that opens them

use super::{FileDataset, LabelDecoding, SampleEntry};
use crate::error::{Result, SegEvalError};
use crate::metrics::DEFAULT_IGNORE_INDEX;
use crate::transforms::TransformPipeline;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// Supported dataset layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    /// Cityscapes fine annotations with train ids (19 classes)
    Cityscapes,
    /// PascalVOC 2012 segmentation (21 classes)
    PascalVoc,
    /// ADE20K scene parsing challenge (150 classes)
    Ade20k,
    /// Generic list-file dataset with a caller-supplied class count
    Custom,
}

impl DatasetKind {
    /// All kinds in display order
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Cityscapes, Self::PascalVoc, Self::Ade20k, Self::Custom]
    }

    /// Class count of the layout, `None` when the caller must supply it
    #[must_use]
    pub const fn default_num_classes(self) -> Option<usize> {
        match self {
            Self::Cityscapes => Some(19),
            Self::PascalVoc => Some(21),
            Self::Ade20k => Some(150),
            Self::Custom => None,
        }
    }

    /// Modes accepted by [`DatasetKind::open`]
    ///
    /// `Custom` accepts any mode with a matching list file and returns an
    /// empty slice.
    #[must_use]
    pub const fn supported_modes(self) -> &'static [&'static str] {
        match self {
            Self::Cityscapes => &["train", "val", "test"],
            Self::PascalVoc => &["train", "trainval", "val"],
            Self::Ade20k => &["train", "val"],
            Self::Custom => &[],
        }
    }

    #[must_use]
    pub const fn label_decoding(self) -> LabelDecoding {
        match self {
            Self::Cityscapes | Self::Custom => LabelDecoding::Grayscale,
            Self::PascalVoc => LabelDecoding::VocPalette,
            Self::Ade20k => LabelDecoding::ReduceZero,
        }
    }

    /// Discover the samples of this layout under `options.root`
    ///
    /// Every listed image and label file is checked for existence before the
    /// dataset is returned.
    ///
    /// # Errors
    /// - Missing root directory, list file or sample files
    /// - Unsupported mode
    /// - Class count missing (`Custom`) or contradicting the layout
    pub fn open(self, options: &DatasetOptions) -> Result<FileDataset> {
        let num_classes = self.resolve_num_classes(options.num_classes)?;
        self.check_mode(&options.mode)?;

        if !options.root.is_dir() {
            return Err(SegEvalError::invalid_config(format!(
                "Dataset directory not found: {}",
                options.root.display()
            )));
        }

        let entries = match self {
            Self::Cityscapes => cityscapes_entries(&options.root, &options.mode)?,
            Self::PascalVoc => voc_entries(&options.root, &options.mode)?,
            Self::Ade20k => ade20k_entries(&options.root, &options.mode)?,
            Self::Custom => list_file_entries(&options.root, &options.mode)?,
        };
        check_entries_exist(&entries)?;

        log::info!(
            "📂 {self} ({}): {} samples, {num_classes} classes",
            options.mode,
            entries.len()
        );

        Ok(FileDataset::new(
            self.to_string(),
            entries,
            num_classes,
            options.ignore_index,
            self.label_decoding(),
            options.transforms.clone(),
        ))
    }

    fn resolve_num_classes(self, requested: Option<usize>) -> Result<usize> {
        match (self.default_num_classes(), requested) {
            (_, Some(0)) => Err(SegEvalError::config_value_error(
                "num_classes",
                0,
                "at least 1",
            )),
            (Some(expected), Some(n)) if n != expected => Err(SegEvalError::invalid_config(
                format!("{self} has {expected} classes, but num_classes is {n}"),
            )),
            (Some(expected), _) => Ok(expected),
            (None, Some(n)) => Ok(n),
            (None, None) => Err(SegEvalError::invalid_config(format!(
                "num_classes is required for the {self} dataset type"
            ))),
        }
    }

    fn check_mode(self, mode: &str) -> Result<()> {
        let modes = self.supported_modes();
        if modes.is_empty() || modes.contains(&mode) {
            return Ok(());
        }
        Err(SegEvalError::invalid_config(format!(
            "Unsupported mode '{mode}' for {self}. Expected one of: {}",
            modes.join(", ")
        )))
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cityscapes => "Cityscapes",
            Self::PascalVoc => "PascalVOC",
            Self::Ade20k => "ADE20K",
            Self::Custom => "Dataset",
        };
        f.write_str(name)
    }
}

impl FromStr for DatasetKind {
    type Err = SegEvalError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "cityscapes" => Ok(Self::Cityscapes),
            "pascalvoc" | "voc" => Ok(Self::PascalVoc),
            "ade20k" | "ade" => Ok(Self::Ade20k),
            "dataset" | "custom" => Ok(Self::Custom),
            _ => Err(SegEvalError::unsupported_dataset(s)),
        }
    }
}

/// Location and preparation settings for opening a dataset
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub root: PathBuf,
    pub mode: String,
    pub num_classes: Option<usize>,
    pub ignore_index: u32,
    pub transforms: TransformPipeline,
}

impl DatasetOptions {
    /// Options for the `val` split under `root` with no transforms
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: "val".to_string(),
            num_classes: None,
            ignore_index: DEFAULT_IGNORE_INDEX,
            transforms: TransformPipeline::default(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    #[must_use]
    pub fn with_num_classes(mut self, num_classes: Option<usize>) -> Self {
        self.num_classes = num_classes;
        self
    }

    #[must_use]
    pub fn with_ignore_index(mut self, ignore_index: u32) -> Self {
        self.ignore_index = ignore_index;
        self
    }

    #[must_use]
    pub fn with_transforms(mut self, transforms: TransformPipeline) -> Self {
        self.transforms = transforms;
        self
    }
}

fn cityscapes_entries(root: &Path, mode: &str) -> Result<Vec<SampleEntry>> {
    const IMAGE_SUFFIX: &str = "_leftImg8bit.png";
    const LABEL_SUFFIX: &str = "_gtFine_labelTrainIds.png";

    let image_root = root.join("leftImg8bit").join(mode);
    let root_str = image_root.to_str().ok_or_else(|| {
        SegEvalError::invalid_config(format!(
            "Dataset path is not valid UTF-8: {}",
            image_root.display()
        ))
    })?;
    let pattern = format!("{}/*/*{IMAGE_SUFFIX}", glob::Pattern::escape(root_str));

    let paths = glob::glob(&pattern)
        .map_err(|e| SegEvalError::invalid_config(format!("Invalid glob pattern: {e}")))?;

    let mut images = Vec::new();
    for path in paths {
        let path = path.map_err(|e| {
            let io = std::io::Error::new(e.error().kind(), e.to_string());
            SegEvalError::file_io_error("scan", e.path(), &io)
        })?;
        images.push(path);
    }
    images.sort();

    images
        .into_iter()
        .map(|image| {
            let city = image
                .parent()
                .and_then(Path::file_name)
                .ok_or_else(|| SegEvalError::processing("Cityscapes image outside a city folder"))?;
            let file_name = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let prefix = file_name.strip_suffix(IMAGE_SUFFIX).unwrap_or(&file_name);
            let label = root
                .join("gtFine")
                .join(mode)
                .join(city)
                .join(format!("{prefix}{LABEL_SUFFIX}"));
            Ok(SampleEntry { image, label })
        })
        .collect()
}

fn voc_entries(root: &Path, mode: &str) -> Result<Vec<SampleEntry>> {
    let nested = root.join("VOC2012");
    let base = if nested.is_dir() { nested } else { root.to_path_buf() };

    let list_file = base
        .join("ImageSets")
        .join("Segmentation")
        .join(format!("{mode}.txt"));
    let content = read_list_file(&list_file)?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|id| SampleEntry {
            image: base.join("JPEGImages").join(format!("{id}.jpg")),
            label: base.join("SegmentationClass").join(format!("{id}.png")),
        })
        .collect())
}

fn ade20k_entries(root: &Path, mode: &str) -> Result<Vec<SampleEntry>> {
    let nested = root.join("ADEChallengeData2016");
    let base = if nested.is_dir() { nested } else { root.to_path_buf() };
    let split = if mode == "train" { "training" } else { "validation" };

    let image_dir = base.join("images").join(split);
    if !image_dir.is_dir() {
        return Err(SegEvalError::invalid_config(format!(
            "ADE20K image directory not found: {}",
            image_dir.display()
        )));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(&image_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            SegEvalError::processing(format!(
                "Failed to scan '{}': {e}",
                image_dir.display()
            ))
        })?;
        let is_jpeg = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"));
        if entry.file_type().is_file() && is_jpeg {
            images.push(entry.into_path());
        }
    }
    images.sort();

    let label_dir = base.join("annotations").join(split);
    Ok(images
        .into_iter()
        .map(|image| {
            let stem = image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let label = label_dir.join(format!("{stem}.png"));
            SampleEntry { image, label }
        })
        .collect())
}

fn list_file_entries(root: &Path, mode: &str) -> Result<Vec<SampleEntry>> {
    let primary = root.join(format!("{mode}.txt"));
    let fallback = root.join(format!("{mode}_list.txt"));
    let list_file = if primary.is_file() || !fallback.is_file() {
        primary
    } else {
        fallback
    };
    let content = read_list_file(&list_file)?;

    let mut entries = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => {},
            [image, label] => entries.push(SampleEntry {
                image: root.join(image),
                label: root.join(label),
            }),
            _ => {
                return Err(SegEvalError::invalid_config(format!(
                    "{}:{}: expected 'image_path label_path', got '{}'",
                    list_file.display(),
                    line_no + 1,
                    line.trim()
                )))
            },
        }
    }
    Ok(entries)
}

fn read_list_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(SegEvalError::invalid_config(format!(
            "List file not found: {}",
            path.display()
        )));
    }
    fs::read_to_string(path).map_err(|e| SegEvalError::file_io_error("read", path, &e))
}

fn check_entries_exist(entries: &[SampleEntry]) -> Result<()> {
    for entry in entries {
        for path in [&entry.image, &entry.label] {
            if !path.is_file() {
                return Err(SegEvalError::invalid_config(format!(
                    "Dataset file not found: {}",
                    path.display()
                )));
            }
        }
    }
    Ok(())
}
