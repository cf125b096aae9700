//! Binary snapshot importers (spec §2 component E, §4.4).
//!
//! Downloads the per-epoch `spectrum`/`universe` archives from the
//! configured storage mirror, parses their fixed-width records, and bulk
//! -inserts the result into `qec-store`. An auto-import driver worker scans
//! the last 10 completed epochs every 5 minutes and imports whatever isn't
//! marked imported yet.

mod auto_import;
mod download;
mod error;
mod spectrum;
mod universe;

pub use auto_import::{spawn_snapshot_importers, AutoImportWorker};
pub use download::{download_archive_entry, ArchiveKind};
pub use error::SnapshotError;
pub use spectrum::import_spectrum;
pub use universe::import_universe;
