//! File-level operations behind the command line.
//!
//! Both operations load a file, transform it in memory and write it back
//! only when something changed, so an up-to-date file keeps its bytes and
//! its modification time.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::arm64x::setup_arm64x;
use crate::clone_cp::{CloneRequest, PlatformCloner};
use crate::error::{Error, Result};
use crate::sln::Solution;
use crate::vcxproj::Vcxproj;

/// Add ARM64EC configurations to the `.vcxproj` at `path`.
///
/// Returns whether the file was rewritten.  Nothing is written when any
/// step fails.
pub fn fixup_project(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    info!(path = %path.display(), "processing project file");

    let mut project = Vcxproj::from_file(path)?;
    let changed = setup_arm64x(&mut project)?;
    if changed {
        project.save(path)?;
        info!(path = %path.display(), "project file updated");
    } else {
        info!(path = %path.display(), "project file already up to date");
    }
    Ok(changed)
}

/// Options for [`clone_configuration`].
#[derive(Debug, Clone)]
pub struct CloneConfiguration {
    pub solution: PathBuf,
    pub request: CloneRequest,
    /// Also run [`fixup_project`] on every selected `.vcxproj`.
    pub update_project_files: bool,
}

/// Clone configuration mappings inside a solution and, optionally, fix up
/// the selected projects' `.vcxproj` files.
///
/// A project file that fails is logged and skipped; the remaining projects
/// are still processed and the solution is still saved.  The failures are
/// then reported together as [`Error::Batch`].
///
/// Returns whether the solution file was rewritten.
pub fn clone_configuration(options: &CloneConfiguration) -> Result<bool> {
    let path = &options.solution;
    info!(path = %path.display(), "processing solution file");

    let mut solution = Solution::from_file(path)?;
    let projects = options.request.selected_projects(&solution);
    if projects.is_empty() {
        info!("no project matches {:?}", options.request.filter);
    }

    let mut cloner = PlatformCloner::new(&options.request);
    let mut failed = Vec::new();

    for project in &projects {
        let inserted = cloner.clone_project(&mut solution, project);
        info!(project = %project.name, inserted, "processed project");

        if !options.update_project_files {
            continue;
        }
        let file = project_file_path(solution.directory(), &project.file);
        if !is_vcxproj(&file) {
            continue;
        }
        if let Err(error) = fixup_project(&file) {
            warn!(project = %project.name, path = %file.display(), %error, "project file failed");
            failed.push(file);
        }
    }

    let changed = cloner.inserted() > 0;
    if changed {
        solution.save(path)?;
        info!(path = %path.display(), lines = cloner.inserted(), "solution file updated");
    } else {
        info!(path = %path.display(), "solution file already up to date");
    }

    if failed.is_empty() {
        Ok(changed)
    } else {
        Err(Error::Batch { failed })
    }
}

/// Resolve a solution-relative project path.  Solutions always use `\`,
/// so both separators are honoured on every host.
fn project_file_path(directory: Option<&Path>, relative: &str) -> PathBuf {
    let mut path = directory.map(Path::to_path_buf).unwrap_or_default();
    for part in relative.split(['\\', '/']).filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path
}

fn is_vcxproj(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("vcxproj"))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
