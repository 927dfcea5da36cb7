//! Clone a platform's configuration mappings inside a solution file.
//!
//! For every selected project, each project-level mapping of the source
//! platform
//!
//! ```text
//! {86DB31C6-…}.Debug|ARM64.ActiveCfg = Debug|ARM64
//! {86DB31C6-…}.Debug|ARM64.Build.0 = Debug|ARM64
//! ```
//!
//! gets a twin for the target platform inserted right below it, and the
//! solution-level entry `Debug|ARM64 = Debug|ARM64` gets a
//! `Debug|ARM64EC = Debug|ARM64EC` twin.  Lines that already exist are never
//! inserted again.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::sln::{ConfigMapping, Solution, SolutionProject};

const MAPPING_KINDS: [&str; 2] = ["ActiveCfg", "Build.0"];

// ═══════════════════════════════════════════════════════════════════════════════
//  Request
// ═══════════════════════════════════════════════════════════════════════════════

/// Which projects a clone request applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectFilter {
    /// `*`
    All,
    /// Exact project names.
    Names(Vec<String>),
}

impl ProjectFilter {
    /// Parse a comma-separated list of names.  A `*` anywhere in the list
    /// selects every project.
    pub fn parse(list: &str) -> Self {
        let names: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect();
        if names.iter().any(|n| n == "*") {
            Self::All
        } else {
            Self::Names(names)
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Names(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Parameters for [`clone_platform`].
#[derive(Debug, Clone)]
pub struct CloneRequest {
    pub filter: ProjectFilter,
    /// Platform to copy from, e.g. `ARM64`.
    pub copy_from: String,
    /// Platform to copy to, e.g. `ARM64EC`.
    pub copy_to: String,
}

impl CloneRequest {
    pub fn new(filter: ProjectFilter, copy_from: impl Into<String>, copy_to: impl Into<String>) -> Self {
        Self { filter, copy_from: copy_from.into(), copy_to: copy_to.into() }
    }

    /// Projects of `solution` selected by the filter, in declaration order.
    pub fn selected_projects(&self, solution: &Solution) -> Vec<SolutionProject> {
        solution
            .projects()
            .iter()
            .filter(|p| self.filter.matches(&p.name))
            .cloned()
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Mapping helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Replace the platform field (`Debug|ARM64` → `Debug|ARM64EC`) of a mapping
/// value.  `None` when the value has no `|`.
fn replace_platform(value: &str, platform: &str) -> Option<String> {
    let mut fields: Vec<&str> = value.split('|').collect();
    if fields.len() < 2 {
        return None;
    }
    fields[1] = platform;
    Some(fields.join("|"))
}

/// The `Debug|ARM64` part of `{KEY}.Debug|ARM64.ActiveCfg`.
fn config_platform<'k>(key: &'k str, project_key: &str) -> Option<&'k str> {
    let rest = key.strip_prefix(project_key)?.strip_prefix('.')?;
    MAPPING_KINDS
        .iter()
        .find_map(|kind| rest.strip_suffix(kind)?.strip_suffix('.'))
}

fn is_source_mapping(mapping: &ConfigMapping, project_key: &str, copy_from: &str) -> bool {
    mapping.key.starts_with(project_key)
        && MAPPING_KINDS
            .iter()
            .any(|kind| mapping.key.ends_with(&format!("|{copy_from}.{kind}")))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  PlatformCloner
// ═══════════════════════════════════════════════════════════════════════════════

/// Stateful patcher for one solution; remembers what it already inserted
/// so that several projects sharing a solution-level configuration add it
/// only once.
#[derive(Debug)]
pub struct PlatformCloner<'r> {
    request: &'r CloneRequest,
    added_project_keys: HashSet<String>,
    added_solution_entries: HashSet<String>,
    inserted: usize,
}

impl<'r> PlatformCloner<'r> {
    pub fn new(request: &'r CloneRequest) -> Self {
        Self {
            request,
            added_project_keys: HashSet::new(),
            added_solution_entries: HashSet::new(),
            inserted: 0,
        }
    }

    /// Total number of lines inserted so far.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Insert the target-platform mappings for one project.  Returns the
    /// number of lines inserted for it.
    pub fn clone_project(&mut self, solution: &mut Solution, project: &SolutionProject) -> usize {
        let CloneRequest { copy_from, copy_to, .. } = self.request;
        let before = self.inserted;

        let sources: Vec<ConfigMapping> = solution
            .project_mappings()
            .iter()
            .filter(|m| is_source_mapping(m, &project.key, copy_from))
            .cloned()
            .collect();

        for mapping in sources {
            let new_key = mapping.key.replace(&format!("|{copy_from}."), &format!("|{copy_to}."));
            let Some(new_value) = replace_platform(&mapping.value, copy_to) else {
                warn!(key = %mapping.key, value = %mapping.value, "mapping value has no platform, skipped");
                continue;
            };

            let exists = solution.project_mappings().iter().any(|m| m.key == new_key);
            if !exists && self.added_project_keys.insert(new_key.clone()) {
                let line = format!("\t\t{new_key} = {new_value}");
                if solution.insert_after(mapping.line, line).is_some() {
                    debug!(project = %project.name, "added {new_key} = {new_value}");
                    self.inserted += 1;
                }
            }

            let Some(cp) = config_platform(&mapping.key, &project.key) else {
                continue;
            };
            let anchor = solution
                .solution_mappings()
                .iter()
                .find(|m| m.key == cp && m.value == cp)
                .map(|m| m.line);
            let Some(anchor) = anchor else {
                continue;
            };
            let exists = solution
                .solution_mappings()
                .iter()
                .any(|m| m.key == new_value && m.value == new_value);
            if !exists && self.added_solution_entries.insert(new_value.clone()) {
                let line = format!("\t\t{new_value} = {new_value}");
                if solution.insert_after(anchor, line).is_some() {
                    debug!("added solution configuration {new_value}");
                    self.inserted += 1;
                }
            }
        }

        self.inserted - before
    }
}

/// Result of [`clone_platform`].
#[derive(Debug, Clone, Default)]
pub struct CloneOutcome {
    /// Number of lines inserted into the solution.
    pub inserted: usize,
    /// Projects the filter selected.
    pub projects: Vec<SolutionProject>,
}

impl CloneOutcome {
    pub fn changed(&self) -> bool {
        self.inserted > 0
    }
}

/// Clone `copy_from` mappings to `copy_to` for every selected project.
/// Project files are not touched; see [`crate::commands::clone_configuration`].
pub fn clone_platform(solution: &mut Solution, request: &CloneRequest) -> CloneOutcome {
    let projects = request.selected_projects(solution);
    let mut cloner = PlatformCloner::new(request);
    for project in &projects {
        cloner.clone_project(solution, project);
    }
    CloneOutcome { inserted: cloner.inserted(), projects }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
