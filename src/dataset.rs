//! Dataset release planning
//!
//! Everything dataset-specific lives here, above the [`Dispatcher`]: the
//! directory layout of a release and the URLs of its numbered patches.

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::types::{BatchReport, DispatchOptions};
use crate::utils::ensure_dir;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::info;

/// Base URL of the Objects365 v2 release
pub const OBJECTS365_BASE_URL: &str =
    "https://dorc.ks3-cn-beijing.ksyun.com/data-set/2020Objects365%E6%95%B0%E6%8D%AE%E9%9B%86";

/// Workers used for patch downloads
const PATCH_WORKERS: usize = 8;

/// A numbered run of patch archives
///
/// ```
/// use dataset_dl::dataset::PatchSeries;
///
/// let series = PatchSeries::new("http://example.test/val/", "images/v2/patch{}.tar.gz", 16..18);
/// assert_eq!(
///     series.urls(),
///     vec![
///         "http://example.test/val/images/v2/patch16.tar.gz",
///         "http://example.test/val/images/v2/patch17.tar.gz",
///     ]
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchSeries {
    /// Prefix every URL starts with
    pub base_url: String,
    /// Path relative to `base_url`; `{}` is replaced by the patch number
    pub template: String,
    /// Patch numbers, end exclusive
    pub range: Range<u32>,
}

impl PatchSeries {
    /// Create a series
    pub fn new(base_url: impl Into<String>, template: impl Into<String>, range: Range<u32>) -> Self {
        Self {
            base_url: base_url.into(),
            template: template.into(),
            range,
        }
    }

    /// Number of patches
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// True for an empty range
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Expand into URLs in patch order
    pub fn urls(&self) -> Vec<String> {
        self.range
            .clone()
            .map(|i| format!("{}{}", self.base_url, self.template.replace("{}", &i.to_string())))
            .collect()
    }
}

/// `root/<kind>/<split>` directory tree of a dataset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    kinds: Vec<String>,
    splits: Vec<String>,
}

impl Layout {
    /// Create every `root/<kind>/<split>` directory
    ///
    /// Directories that already exist are left alone.
    pub fn create(root: impl Into<PathBuf>, kinds: &[&str], splits: &[&str]) -> Result<Self> {
        let layout = Self {
            root: root.into(),
            kinds: kinds.iter().map(|k| k.to_string()).collect(),
            splits: splits.iter().map(|s| s.to_string()).collect(),
        };
        for dir in layout.dirs() {
            ensure_dir(&dir)?;
        }
        Ok(layout)
    }

    /// Dataset root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one kind and split, e.g. `images/train`
    pub fn dir(&self, kind: &str, split: &str) -> PathBuf {
        self.root.join(kind).join(split)
    }

    /// Every leaf directory of the layout
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.kinds
            .iter()
            .flat_map(|kind| self.splits.iter().map(move |split| self.dir(kind, split)))
            .collect()
    }
}

/// One dispatch call of a plan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Split this job belongs to, for logging
    pub split: String,
    /// Sources handed to the dispatcher
    pub sources: Vec<String>,
    /// Where they land
    pub destination: PathBuf,
    /// How they are fetched
    pub options: DispatchOptions,
}

/// A dataset download: its layout and the jobs to run, in order
#[derive(Clone, Debug)]
pub struct Plan {
    /// Directory tree created for the dataset
    pub layout: Layout,
    /// Jobs, run one after another
    pub jobs: Vec<Job>,
}

impl Plan {
    /// Run every job through `dispatcher` and merge the reports
    ///
    /// The retry ceiling comes from the dispatcher's configuration.
    pub async fn run(&self, dispatcher: &Dispatcher) -> Result<BatchReport> {
        let retry_limit = dispatcher.default_options().retry_limit;
        let mut report = BatchReport::default();
        let mut current_split: Option<&str> = None;

        for job in &self.jobs {
            if current_split != Some(job.split.as_str()) {
                let patches: usize = self
                    .jobs
                    .iter()
                    .filter(|j| j.split == job.split)
                    .map(|j| j.sources.len())
                    .sum();
                info!(split = %job.split, patches, "Processing {} in {} patches ...", job.split, patches);
                current_split = Some(job.split.as_str());
            }

            let options = DispatchOptions {
                retry_limit,
                ..job.options.clone()
            };
            report.merge(
                dispatcher
                    .dispatch(job.sources.clone(), &job.destination, &options)
                    .await?,
            );
        }
        Ok(report)
    }
}

/// Plan for the Objects365 v2 release under `root`
///
/// Creates `images/{train,val}` and `labels/{train,val}`. Annotations go to
/// `root`, image patches to `images/<split>`; nothing is deleted after
/// extraction.
pub fn objects365(root: impl Into<PathBuf>) -> Result<Plan> {
    let layout = Layout::create(root, &["images", "labels"], &["train", "val"])?;
    let root = layout.root().to_path_buf();

    let single = DispatchOptions {
        delete_after: false,
        ..Default::default()
    };
    let patches = DispatchOptions {
        delete_after: false,
        workers: PATCH_WORKERS,
        ..Default::default()
    };
    let job = |split: &str, sources: Vec<String>, destination: PathBuf, options: &DispatchOptions| Job {
        split: split.to_string(),
        sources,
        destination,
        options: options.clone(),
    };

    let train = format!("{}/train/", OBJECTS365_BASE_URL);
    let val = format!("{}/val/", OBJECTS365_BASE_URL);

    let jobs = vec![
        job(
            "train",
            vec![format!("{}zhiyuan_objv2_train.tar.gz", train)],
            root.clone(),
            &single,
        ),
        job(
            "train",
            PatchSeries::new(&train, "patch{}.tar.gz", 0..51).urls(),
            layout.dir("images", "train"),
            &patches,
        ),
        job(
            "val",
            vec![format!("{}zhiyuan_objv2_val.json", val)],
            root,
            &single,
        ),
        job(
            "val",
            PatchSeries::new(&val, "images/v1/patch{}.tar.gz", 0..16).urls(),
            layout.dir("images", "val"),
            &patches,
        ),
        job(
            "val",
            PatchSeries::new(&val, "images/v2/patch{}.tar.gz", 16..44).urls(),
            layout.dir("images", "val"),
            &patches,
        ),
    ];

    Ok(Plan { layout, jobs })
}
