use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::report::{Phase, RenameRecord, RunReport};
use crate::table::{MoveTable, RelinkOptions};
use crate::walk::TreeVisitor;

/// First pass: renames `<dir>/<old_stem>.<ext>` to `<dir>/<new_stem>.<ext>`
/// in every directory whose name matches a table entry.
pub(crate) struct Renamer<'a, G> {
    table: &'a MoveTable,
    options: &'a RelinkOptions,
    path_callback: &'a G,
    report: &'a mut RunReport,
}

impl<'a, G> Renamer<'a, G>
where
    G: Fn(&Path, &Path, &str) -> Result<bool>,
{
    pub(crate) fn new(
        table: &'a MoveTable,
        options: &'a RelinkOptions,
        path_callback: &'a G,
        report: &'a mut RunReport,
    ) -> Self {
        Self {
            table,
            options,
            path_callback,
            report,
        }
    }

    fn rename_in(&mut self, dir: &Path, name: &str) -> Result<()> {
        let (table, options) = (self.table, self.options);
        for entry in table.iter() {
            if !entry.matches_directory(name, options.directory_match) {
                continue;
            }
            debug!("Directory {:?} matches move entry {}", dir, entry);

            for ext in options.extensions.iter() {
                let old_path = dir.join(entry.old_file_name(ext));
                let new_path = dir.join(entry.new_file_name(ext));
                self.rename_one(&old_path, &new_path)?;
            }
        }
        Ok(())
    }

    fn rename_one(&mut self, old_path: &Path, new_path: &Path) -> Result<()> {
        let old_exists = match old_path.try_exists() {
            Ok(exists) => exists,
            Err(e) => {
                self.report.record_error(old_path, Phase::Rename, format!("cannot stat: {}", e));
                return Ok(());
            }
        };
        let new_exists = match new_path.try_exists() {
            Ok(exists) => exists,
            Err(e) => {
                self.report.record_error(new_path, Phase::Rename, format!("cannot stat: {}", e));
                return Ok(());
            }
        };

        match (old_exists, new_exists) {
            (false, false) => Ok(()),
            (false, true) => {
                info!("Already migrated: {:?}", new_path);
                self.report.already_migrated += 1;
                self.report.renames.push(RenameRecord::AlreadyMigrated {
                    path: new_path.to_path_buf(),
                });
                Ok(())
            }
            (true, true) => {
                self.report.record_error(
                    old_path,
                    Phase::Rename,
                    format!("refusing to overwrite existing {:?}", new_path),
                );
                Ok(())
            }
            (true, false) => {
                if !(self.path_callback)(old_path, new_path, "File")? {
                    debug!("Rename declined: {:?}", old_path);
                    self.report.declined += 1;
                    return Ok(());
                }

                if self.options.dry_run {
                    info!("Would rename file: {:?} -> {:?}", old_path, new_path);
                } else if let Err(e) = fs::rename(old_path, new_path) {
                    self.report.record_error(old_path, Phase::Rename, format!("rename failed: {}", e));
                    return Ok(());
                } else {
                    info!("Renamed file: {:?} -> {:?}", old_path, new_path);
                }

                self.report.renamed += 1;
                self.report.renames.push(RenameRecord::Renamed {
                    from: old_path.to_path_buf(),
                    to: new_path.to_path_buf(),
                });
                Ok(())
            }
        }
    }
}

impl<G> TreeVisitor for Renamer<'_, G>
where
    G: Fn(&Path, &Path, &str) -> Result<bool>,
{
    fn visit_dir(&mut self, dir: &Path) -> Result<()> {
        self.report.directories_scanned += 1;

        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            return Ok(());
        };
        self.rename_in(dir, name)
    }

    fn visit_file(&mut self, _file: &Path) -> Result<()> {
        Ok(())
    }

    fn walk_error(&mut self, path: &Path, message: String) {
        self.report.record_error(path, Phase::Walk, message);
    }
}
