//! Portal backup
//!
//! A backup copies every layer the portal catalog knows about, and that
//! still exists in the live database, into a fresh GeoPackage archive,
//! together with each layer's default style:
//!
//! 1. resolve (or allocate) a writable destination directory
//! 2. open the live source read-only
//! 3. select catalog layers present in the source
//! 4. export them into `backup_<timestamp>.gpkg`
//! 5. write the style table into the archive
//!
//! [`BackupOrchestrator::run`] never returns an error. Every failure is
//! logged and reported as [`BackupOutcome::Failed`] naming the stage it
//! happened in. Destination failures create no file. A failure after the
//! archive was created leaves it on disk; its path is in the failure so
//! the caller can discard it.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog;
use crate::config::Config;
use crate::copier;
use crate::driver::{AccessMode, DriverRegistry};
use crate::error::{Error, Result};
use crate::portal::{CatalogEntry, PortalCatalog, StyleRef};
use crate::source::SourceHandle;
use crate::styles::{self, StyleRecord};

/// Timestamp format of archive file names
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y_%m_%d-%H_%M_%S";

/// Step of a backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStage {
    ResolveDestination,
    OpenSource,
    SelectLayers,
    CopyLayers,
    WriteStyles,
    Finalize,
}

impl fmt::Display for BackupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackupStage::ResolveDestination => "resolve destination",
            BackupStage::OpenSource => "open source",
            BackupStage::SelectLayers => "select layers",
            BackupStage::CopyLayers => "copy layers",
            BackupStage::WriteStyles => "write styles",
            BackupStage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// A completed backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub archive_path: PathBuf,
    /// Layers copied into the archive, in catalog order
    pub layers: Vec<String>,
    /// Registered layers missing from the live source
    pub skipped: Vec<String>,
    pub styles_written: usize,
}

/// Why a backup did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupFailure {
    pub stage: BackupStage,
    pub reason: String,
    /// Archive left behind by a failure after it was created
    pub archive_path: Option<PathBuf>,
}

impl fmt::Display for BackupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backup failed at {}: {}", self.stage, self.reason)
    }
}

/// Result of a backup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackupOutcome {
    Completed(BackupReport),
    /// No registered layer exists in the live source; nothing was written
    NothingToBackUp { skipped: Vec<String> },
    Failed(BackupFailure),
}

impl BackupOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, BackupOutcome::Completed(_))
    }

    /// Path of the finished archive, only for completed runs
    pub fn archive_path(&self) -> Option<&Path> {
        match self {
            BackupOutcome::Completed(report) => Some(report.archive_path.as_path()),
            _ => None,
        }
    }
}

/// A layer chosen for backup with what its style row needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedLayer {
    pub table_name: String,
    pub geometry_attribute: String,
    pub style: Option<StyleRef>,
}

/// Layers to back up and registered layers that were skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub layers: Vec<SelectedLayer>,
    pub skipped: Vec<String>,
}

impl Selection {
    pub fn table_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.table_name.clone()).collect()
    }
}

/// Runs backups of one live source
#[derive(Clone)]
pub struct BackupOrchestrator {
    registry: DriverRegistry,
    location: String,
    downloads_dir: PathBuf,
}

impl BackupOrchestrator {
    /// `location` is the live source, usually a connection descriptor
    pub fn new(
        registry: DriverRegistry,
        location: impl Into<String>,
        downloads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            location: location.into(),
            downloads_dir: downloads_dir.into(),
        }
    }

    /// Back up the configured datastore into the configured downloads dir
    pub fn from_config(registry: DriverRegistry, config: &Config) -> Self {
        Self::new(
            registry,
            config.connection_descriptor(None, None).to_string(),
            config.downloads_dir.clone(),
        )
    }

    /// Back up every registered layer present in the live source
    ///
    /// Without `destination` a new directory is allocated under the
    /// downloads dir.
    pub fn run(&self, catalog: &dyn PortalCatalog, destination: Option<&Path>) -> BackupOutcome {
        self.run_at(catalog, destination, Local::now())
    }

    /// Same as [`run`](Self::run) with an explicit archive timestamp
    pub fn run_at(
        &self,
        catalog: &dyn PortalCatalog,
        destination: Option<&Path>,
        now: DateTime<Local>,
    ) -> BackupOutcome {
        match self.execute(catalog, destination, now) {
            Ok(outcome) => outcome,
            Err(failure) => {
                error!(
                    stage = %failure.stage,
                    reason = %failure.reason,
                    archive = ?failure.archive_path,
                    "Backup failed"
                );
                BackupOutcome::Failed(failure)
            }
        }
    }

    fn execute(
        &self,
        catalog: &dyn PortalCatalog,
        destination: Option<&Path>,
        now: DateTime<Local>,
    ) -> std::result::Result<BackupOutcome, BackupFailure> {
        let directory = match destination {
            Some(path) => {
                ensure_writable_dir(path).map_err(fail(BackupStage::ResolveDestination, None))?;
                path.to_path_buf()
            }
            None => get_new_dir(&self.downloads_dir)
                .map_err(fail(BackupStage::ResolveDestination, None))?,
        };
        debug!(destination = %directory.display(), "Resolved backup destination");

        let live = SourceHandle::open(&self.registry, &self.location, AccessMode::ReadOnly)
            .map_err(fail(BackupStage::OpenSource, None))?;

        let entries = catalog
            .registered_layers()
            .map_err(fail(BackupStage::SelectLayers, None))?;
        let selection =
            select_layers(&live, &entries).map_err(fail(BackupStage::SelectLayers, None))?;

        if selection.layers.is_empty() {
            info!(
                skipped = selection.skipped.len(),
                "No registered layer exists in the live source, nothing to back up"
            );
            return Ok(BackupOutcome::NothingToBackUp {
                skipped: selection.skipped,
            });
        }

        let archive_path = directory.join(archive_name(now));
        if archive_path.exists() {
            return Err(BackupFailure {
                stage: BackupStage::CopyLayers,
                reason: format!("archive '{}' already exists", archive_path.display()),
                archive_path: None,
            });
        }

        let names = selection.table_names();
        let archive_path = copier::export_layers(&self.registry, &live, &archive_path, Some(names.as_slice()))
            .map_err(|e| {
                let left_behind = archive_path.exists().then_some(archive_path.as_path());
                fail(BackupStage::CopyLayers, left_behind)(e)
            })?;
        drop(live);

        let location = archive_path.to_string_lossy().into_owned();
        let mut archive = SourceHandle::open(&self.registry, &location, AccessMode::Update)
            .map_err(fail(BackupStage::WriteStyles, Some(archive_path.as_path())))?;
        let styles_written = write_styles(&mut archive, &selection.layers)
            .map_err(fail(BackupStage::WriteStyles, Some(archive_path.as_path())))?;
        archive
            .close()
            .map_err(fail(BackupStage::Finalize, Some(archive_path.as_path())))?;

        info!(
            archive = %archive_path.display(),
            layers = names.len(),
            skipped = selection.skipped.len(),
            styles = styles_written,
            "Backup completed"
        );
        Ok(BackupOutcome::Completed(BackupReport {
            archive_path,
            layers: names,
            skipped: selection.skipped,
            styles_written,
        }))
    }
}

fn fail(stage: BackupStage, archive: Option<&Path>) -> impl FnOnce(Error) -> BackupFailure + '_ {
    move |e| BackupFailure {
        stage,
        reason: e.to_string(),
        archive_path: archive.map(Path::to_path_buf),
    }
}

/// Intersect catalog entries with the layers present in `source`
///
/// Entries are matched on their table name. Registered layers missing from
/// the source are skipped with a warning; duplicate table names are kept
/// once. The geometry attribute comes from the catalog, falling back to
/// the live layer's.
pub fn select_layers(source: &SourceHandle, entries: &[CatalogEntry]) -> Result<Selection> {
    let mut selection = Selection::default();
    let mut seen = HashSet::new();

    for entry in entries {
        let table_name = entry.table_name();
        if !seen.insert(table_name.to_string()) {
            continue;
        }

        let layer = match catalog::get_layer(source, table_name)? {
            Some(layer) => layer,
            None => {
                warn!(
                    layer = %entry.alternate,
                    source = source.display_location(),
                    "Registered layer is missing from the live source, skipping"
                );
                selection.skipped.push(table_name.to_string());
                continue;
            }
        };

        let geometry_attribute = entry
            .geometry_attribute
            .clone()
            .or_else(|| layer.geometry_attribute().map(str::to_string))
            .unwrap_or_default();

        selection.layers.push(SelectedLayer {
            table_name: table_name.to_string(),
            geometry_attribute,
            style: entry.default_style.clone(),
        });
    }

    Ok(selection)
}

/// Create the style table and add one default row per styled layer
fn write_styles(archive: &mut SourceHandle, layers: &[SelectedLayer]) -> Result<usize> {
    styles::create_table(archive)?;

    let mut records = Vec::new();
    for layer in layers {
        match &layer.style {
            Some(StyleRef {
                name,
                body: Some(body),
            }) => records.push(
                StyleRecord::new(&layer.table_name, &layer.geometry_attribute, name, body)
                    .as_default(),
            ),
            _ => warn!(layer = %layer.table_name, "No style body available, skipping style row"),
        }
    }

    styles::add_styles(archive, &records)
}

/// `backup_<timestamp>.gpkg`
pub fn archive_name(now: DateTime<Local>) -> String {
    format!("backup_{}.gpkg", now.format(ARCHIVE_TIMESTAMP_FORMAT))
}

/// Allocate a fresh uniquely named directory under `base`
pub fn get_new_dir(base: &Path) -> Result<PathBuf> {
    let dir = base.join(Uuid::new_v4().to_string());
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Fail unless `path` is an existing directory that accepts new files
///
/// Writability is checked by creating and removing a marker file, so
/// nothing is left behind either way.
fn ensure_writable_dir(path: &Path) -> Result<()> {
    let aborted = |reason: &str| Error::BackupAborted {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if !path.is_dir() {
        return Err(aborted("is not a directory"));
    }

    let marker = path.join(format!(".layervault-write-check-{}", Uuid::new_v4()));
    match File::create(&marker) {
        Ok(_) => {
            fs::remove_file(&marker)?;
            Ok(())
        }
        Err(_) => Err(aborted("is not writable")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MemoryDriver, MemoryStore};
    use crate::models::{Feature, FieldType, GeometryType, LayerDefinition};
    use crate::portal::StaticCatalog;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    const LIVE: &str = "PG: host=localhost port=5432 dbname=gis active_schema=public user=geo password=pw";

    fn registry() -> DriverRegistry {
        DriverRegistry::default().with_driver(Arc::new(live_driver()))
    }

    fn live_driver() -> MemoryDriver {
        let driver = MemoryDriver::new();
        driver.insert(
            LIVE,
            MemoryStore::new()
                .with_layer(
                    LayerDefinition::new("roads")
                        .with_field("name", FieldType::String, 50)
                        .with_geometry("geom", GeometryType::LineString),
                    vec![Feature::new(vec!["A1".into()]).with_fid(1)],
                )
                .with_layer(
                    LayerDefinition::new("parcels")
                        .with_field("owner", FieldType::String, 0)
                        .with_geometry("the_geom", GeometryType::Polygon),
                    Vec::new(),
                ),
        );
        driver
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name(now()), "backup_2024_01_02-03_04_05.gpkg");
    }

    #[test]
    fn test_get_new_dir_is_unique() {
        let temp_dir = TempDir::new().unwrap();
        let a = get_new_dir(temp_dir.path()).unwrap();
        let b = get_new_dir(temp_dir.path()).unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
    }

    #[test]
    fn test_select_layers_skips_absent_and_duplicates() {
        let registry = registry();
        let live = SourceHandle::open(&registry, LIVE, AccessMode::ReadOnly).unwrap();
        let entries = vec![
            CatalogEntry::new("geonode:roads").with_style(StyleRef::new("roads", "<sld/>")),
            CatalogEntry::new("geonode:lakes"),
            CatalogEntry::new("other:roads"),
            CatalogEntry::new("geonode:parcels").with_geometry_attribute("shape"),
        ];

        let selection = select_layers(&live, &entries).unwrap();
        assert_eq!(selection.table_names(), vec!["roads", "parcels"]);
        assert_eq!(selection.skipped, vec!["lakes"]);
        assert_eq!(selection.layers[0].geometry_attribute, "geom");
        assert_eq!(selection.layers[1].geometry_attribute, "shape");
    }

    #[test]
    fn test_run_completes() {
        let temp_dir = TempDir::new().unwrap();
        let orchestrator = BackupOrchestrator::new(registry(), LIVE, temp_dir.path());
        let catalog = StaticCatalog::new(vec![
            CatalogEntry::new("geonode:roads").with_style(StyleRef::new("roads", "<sld/>")),
            CatalogEntry::new("geonode:parcels"),
        ]);

        let outcome = orchestrator.run_at(&catalog, Some(temp_dir.path()), now());
        let report = match outcome {
            BackupOutcome::Completed(report) => report,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(
            report.archive_path,
            temp_dir.path().join("backup_2024_01_02-03_04_05.gpkg")
        );
        assert_eq!(report.layers, vec!["roads", "parcels"]);
        assert_eq!(report.styles_written, 1);
    }

    #[test]
    fn test_run_allocates_directory_under_downloads() {
        let temp_dir = TempDir::new().unwrap();
        let downloads = temp_dir.path().join("downloads");
        let orchestrator = BackupOrchestrator::new(registry(), LIVE, &downloads);
        let catalog = StaticCatalog::new(vec![CatalogEntry::new("geonode:roads")]);

        let outcome = orchestrator.run(&catalog, None);
        let path = outcome.archive_path().unwrap();
        assert!(path.starts_with(&downloads));
        assert!(path.exists());
    }

    #[test]
    fn test_run_nothing_to_back_up() {
        let temp_dir = TempDir::new().unwrap();
        let orchestrator = BackupOrchestrator::new(registry(), LIVE, temp_dir.path());
        let catalog = StaticCatalog::new(vec![CatalogEntry::new("geonode:lakes")]);

        let outcome = orchestrator.run_at(&catalog, Some(temp_dir.path()), now());
        assert_eq!(
            outcome,
            BackupOutcome::NothingToBackUp {
                skipped: vec!["lakes".to_string()]
            }
        );
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_run_destination_not_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        let orchestrator = BackupOrchestrator::new(registry(), LIVE, temp_dir.path());
        let catalog = StaticCatalog::new(vec![CatalogEntry::new("geonode:roads")]);

        match orchestrator.run_at(&catalog, Some(&missing), now()) {
            BackupOutcome::Failed(failure) => {
                assert_eq!(failure.stage, BackupStage::ResolveDestination);
                assert!(failure.archive_path.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!missing.exists());
    }

    #[test]
    fn test_run_open_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let orchestrator =
            BackupOrchestrator::new(DriverRegistry::default(), LIVE, temp_dir.path());
        let catalog = StaticCatalog::new(vec![CatalogEntry::new("geonode:roads")]);

        match orchestrator.run_at(&catalog, Some(temp_dir.path()), now()) {
            BackupOutcome::Failed(failure) => {
                assert_eq!(failure.stage, BackupStage::OpenSource);
                assert!(!failure.reason.contains("password=pw"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_run_existing_archive_is_not_reused() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(archive_name(now())), b"old").unwrap();
        let orchestrator = BackupOrchestrator::new(registry(), LIVE, temp_dir.path());
        let catalog = StaticCatalog::new(vec![CatalogEntry::new("geonode:roads")]);

        match orchestrator.run_at(&catalog, Some(temp_dir.path()), now()) {
            BackupOutcome::Failed(failure) => assert_eq!(failure.stage, BackupStage::CopyLayers),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fs::read(temp_dir.path().join(archive_name(now()))).unwrap(), b"old");
    }

    #[test]
    fn test_run_archive_never_created_has_no_path() {
        let temp_dir = TempDir::new().unwrap();
        // No GeoPackage driver, so the archive cannot be created
        let registry = DriverRegistry::empty().with_driver(Arc::new(live_driver()));
        let orchestrator = BackupOrchestrator::new(registry, LIVE, temp_dir.path());
        let catalog = StaticCatalog::new(vec![CatalogEntry::new("geonode:roads")]);

        match orchestrator.run_at(&catalog, Some(temp_dir.path()), now()) {
            BackupOutcome::Failed(failure) => {
                assert_eq!(failure.stage, BackupStage::CopyLayers);
                assert!(failure.archive_path.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_read_only_destination() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // root ignores directory permissions
        if File::create(locked.join("check")).is_ok() {
            fs::remove_file(locked.join("check")).unwrap();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let orchestrator = BackupOrchestrator::new(registry(), LIVE, temp_dir.path());
        let catalog = StaticCatalog::new(vec![CatalogEntry::new("geonode:roads")]);
        let outcome = orchestrator.run_at(&catalog, Some(&locked), now());

        let entries = fs::read_dir(&locked).unwrap().count();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        match outcome {
            BackupOutcome::Failed(failure) => {
                assert_eq!(failure.stage, BackupStage::ResolveDestination);
                assert!(failure.reason.contains("not writable"));
                assert!(failure.archive_path.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(entries, 0);
    }

    #[test]
    fn test_outcome_serializes_with_status() {
        let outcome = BackupOutcome::NothingToBackUp {
            skipped: vec!["lakes".to_string()],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "nothing_to_back_up");
    }
}
