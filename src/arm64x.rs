//! Add ARM64EC configurations to a CMake-generated `.vcxproj` so that it
//! builds an ARM64X binary.
//!
//! Every ARM64 piece of the project gets an ARM64EC twin:
//!
//! 1. `<ProjectConfiguration Include="Debug|ARM64">` declarations
//! 2. `<PropertyGroup Label="Configuration">` groups
//! 3. `<BuildAsX>true</BuildAsX>` in each ARM64EC configuration group
//! 4. `OutDir`, `IntDir`, `TargetName` and `TargetExt` properties, with the
//!    two directories split per platform
//! 5. `<ItemDefinitionGroup>` blocks
//! 6. `/machine:ARM64` → `/machine:ARM64X` in ARM64EC `Lib` / `Link`
//!    additional options
//! 7. `$(Configuration)\x.obj` → `$(Configuration)\$(Platform)\x.obj` object
//!    paths
//! 8. `<CustomBuild>` step elements
//!
//! Each step reparses the project and sees the results of the previous
//! ones.  A step never adds a twin that already exists, so running
//! [`setup_arm64x`] on its own output changes nothing.

use roxmltree::Node;
use tracing::debug;

use crate::condition::{self, ConfigPlatform};
use crate::error::{Error, Result};
use crate::vcxproj::{
    self, ElementCopy, Edits, Vcxproj, child, children, is_element, root_grandchildren, text,
};

const ARM64: &str = "ARM64";
const ARM64EC: &str = "ARM64EC";
const ARM64_GUARD: &str = "|ARM64'";
const ARM64EC_GUARD: &str = "|ARM64EC'";

/// Property forcing an ARM64EC configuration to link as ARM64X.
const BUILD_AS_X: &str = "BuildAsX";
const TRUE: &str = "true";

/// `OutDir` / `IntDir` value that already separates platforms.
const PLATFORM_NEUTRAL_DIR: &str = r"$(Platform)\$(Configuration)\$(ProjectName)\";

// ═══════════════════════════════════════════════════════════════════════════════
//  Entry point
// ═══════════════════════════════════════════════════════════════════════════════

/// Run every step on `project`.  Returns whether the source changed.
///
/// On error the project may be partially edited in memory; callers must not
/// save it.
pub fn setup_arm64x(project: &mut Vcxproj) -> Result<bool> {
    let steps: [(&str, fn(&mut Vcxproj) -> Result<bool>); 8] = [
        ("project configurations", clone_project_configurations),
        ("configuration property groups", clone_configuration_groups),
        ("BuildAsX", ensure_build_as_x),
        ("output properties", clone_scalar_properties),
        ("item definition groups", clone_item_definition_groups),
        ("machine options", retarget_machine_options),
        ("object paths", split_object_paths),
        ("custom build steps", clone_custom_build_steps),
    ];

    let mut changed = false;
    for (name, step) in steps {
        if step(project)? {
            debug!(step = name, "project updated");
            changed = true;
        }
    }
    Ok(changed)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Shared cloning
// ═══════════════════════════════════════════════════════════════════════════════

/// The ARM64EC form of an ARM64 guard, if `condition` is one.
fn arm64ec_condition(condition: &str) -> Option<String> {
    condition
        .contains(ARM64_GUARD)
        .then(|| condition.replace(ARM64_GUARD, ARM64EC_GUARD))
}

fn has_condition(scope: &[Node], condition: &str) -> bool {
    scope.iter().any(|n| n.attribute("Condition") == Some(condition))
}

/// For each ARM64-guarded element of `scope` without an ARM64EC twin in
/// `scope`, insert a copy guarded for ARM64EC right after it.
fn clone_guarded(src: &str, scope: &[Node], edits: &mut Edits) {
    for &node in scope {
        let Some(target) = node.attribute("Condition").and_then(arm64ec_condition) else {
            continue;
        };
        if has_condition(scope, &target) {
            continue;
        }
        let copy = ElementCopy::of(src, node)
            .set_attribute(node, "Condition", &target)
            .into_string();
        edits.push(vcxproj::insert_after(src, node, &copy));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  1. ProjectConfiguration
// ═══════════════════════════════════════════════════════════════════════════════

fn clone_project_configurations(project: &mut Vcxproj) -> Result<bool> {
    let edits = {
        let doc = project.document()?;
        let src = project.source();
        let configurations = root_grandchildren(&doc, "ItemGroup", "ProjectConfiguration");
        let mut edits = Edits::default();

        for &configuration in &configurations {
            let include = configuration.attribute("Include").unwrap_or("");
            let Some(name) = include.strip_suffix("|ARM64") else {
                continue;
            };
            let target = format!("{name}|{ARM64EC}");
            if configurations.iter().any(|c| c.attribute("Include") == Some(target.as_str())) {
                continue;
            }
            let platform = child(configuration, "Platform").ok_or_else(|| {
                Error::structure(format!(
                    "<ProjectConfiguration Include=\"{include}\"> has no <Platform>"
                ))
            })?;
            let copy = ElementCopy::of(src, configuration)
                .set_attribute(configuration, "Include", &target)
                .set_text(platform, ARM64EC)
                .into_string();
            edits.push(vcxproj::insert_after(src, configuration, &copy));
        }
        edits
    };
    Ok(project.apply(edits))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  2. PropertyGroup Label="Configuration"
// ═══════════════════════════════════════════════════════════════════════════════

fn clone_configuration_groups(project: &mut Vcxproj) -> Result<bool> {
    let edits = {
        let doc = project.document()?;
        let groups: Vec<Node> = children(doc.root_element(), "PropertyGroup")
            .filter(|g| g.attribute("Label") == Some("Configuration"))
            .collect();
        let mut edits = Edits::default();
        clone_guarded(project.source(), &groups, &mut edits);
        edits
    };
    Ok(project.apply(edits))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  3. BuildAsX
// ═══════════════════════════════════════════════════════════════════════════════

fn arm64ec_configurations(project: &Vcxproj) -> Result<Vec<ConfigPlatform>> {
    let doc = project.document()?;
    Ok(root_grandchildren(&doc, "ItemGroup", "ProjectConfiguration")
        .into_iter()
        .filter_map(|c| c.attribute("Include"))
        .filter(|include| include.ends_with(&format!("|{ARM64EC}")))
        .filter_map(ConfigPlatform::parse)
        .collect())
}

/// Leave exactly one `<BuildAsX>true</BuildAsX>` across the property groups
/// guarded for each ARM64EC configuration.
fn ensure_build_as_x(project: &mut Vcxproj) -> Result<bool> {
    let mut changed = false;

    for target in arm64ec_configurations(project)? {
        let edits = {
            let doc = project.document()?;
            let src = project.source();
            let groups: Vec<Node> = children(doc.root_element(), "PropertyGroup")
                .filter(|g| g.attribute("Condition").is_some_and(|c| condition::guards(c, &target)))
                .collect();
            let flags: Vec<Node> = groups
                .iter()
                .flat_map(|&g| children(g, BUILD_AS_X))
                .collect();

            let mut edits = Edits::default();
            match flags.split_first() {
                Some((&primary, extras)) => {
                    for &extra in extras {
                        edits.push(vcxproj::remove(src, extra));
                    }
                    if text(&primary) != TRUE {
                        edits.push(vcxproj::set_text(src, primary, TRUE));
                    }
                }
                None => {
                    let group = groups.first().ok_or_else(|| {
                        Error::structure(format!("no <PropertyGroup> is conditioned on '{target}'"))
                    })?;
                    let flag = format!("<{BUILD_AS_X}>{TRUE}</{BUILD_AS_X}>");
                    edits.push(vcxproj::append_child(src, *group, &flag));
                }
            }
            edits
        };
        changed |= project.apply(edits);
    }

    Ok(changed)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  4. OutDir / IntDir / TargetName / TargetExt
// ═══════════════════════════════════════════════════════════════════════════════

/// `(ARM64 value, ARM64EC value)` for a property being cloned.
type ValueSplit = fn(&str) -> (String, String);

const SCALAR_PROPERTIES: [(&str, ValueSplit); 4] = [
    ("OutDir", split_out_dir),
    ("IntDir", split_int_dir),
    ("TargetName", keep_value),
    ("TargetExt", keep_value),
];

/// Append a directory segment the way `Path.Combine(dir, segment) + "\"`
/// would on Windows.
fn join_segment(dir: &str, segment: &str) -> String {
    let mut out = dir.to_string();
    if !out.is_empty() && !out.ends_with(['\\', '/']) {
        out.push('\\');
    }
    out.push_str(segment);
    out.push('\\');
    out
}

/// ARM64 output moves into an `ARM64` subdirectory; ARM64EC keeps the
/// original directory, which is where the final ARM64X binary lands.
fn split_out_dir(value: &str) -> (String, String) {
    if value == PLATFORM_NEUTRAL_DIR {
        (value.to_string(), value.to_string())
    } else {
        (join_segment(value, ARM64), value.to_string())
    }
}

fn split_int_dir(value: &str) -> (String, String) {
    if value == PLATFORM_NEUTRAL_DIR {
        (value.to_string(), value.to_string())
    } else {
        (join_segment(value, ARM64), join_segment(value, ARM64EC))
    }
}

fn keep_value(value: &str) -> (String, String) {
    (value.to_string(), value.to_string())
}

fn clone_scalar_properties(project: &mut Vcxproj) -> Result<bool> {
    let edits = {
        let doc = project.document()?;
        let src = project.source();
        let mut edits = Edits::default();

        for (name, split) in SCALAR_PROPERTIES {
            let properties = root_grandchildren(&doc, "PropertyGroup", name);
            for &property in &properties {
                let Some(target) = property.attribute("Condition").and_then(arm64ec_condition)
                else {
                    continue;
                };
                if has_condition(&properties, &target) {
                    continue;
                }
                let value = text(&property);
                let (arm64_value, arm64ec_value) = split(value);
                let copy = ElementCopy::of(src, property)
                    .set_attribute(property, "Condition", &target)
                    .set_text(property, &arm64ec_value)
                    .into_string();
                if arm64_value != value {
                    edits.push(vcxproj::set_text(src, property, &arm64_value));
                }
                edits.push(vcxproj::insert_after(src, property, &copy));
            }
        }
        edits
    };
    Ok(project.apply(edits))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  5. ItemDefinitionGroup
// ═══════════════════════════════════════════════════════════════════════════════

fn clone_item_definition_groups(project: &mut Vcxproj) -> Result<bool> {
    let edits = {
        let doc = project.document()?;
        let groups: Vec<Node> = children(doc.root_element(), "ItemDefinitionGroup").collect();
        let mut edits = Edits::default();
        clone_guarded(project.source(), &groups, &mut edits);
        edits
    };
    Ok(project.apply(edits))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  6. /machine:ARM64 → /machine:ARM64X
// ═══════════════════════════════════════════════════════════════════════════════

/// Replace whole whitespace-delimited tokens equal to `from`, keeping all
/// whitespace as it was.
fn replace_option(options: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(options.len() + to.len());
    let mut rest = options;
    while !rest.is_empty() {
        let token_start = rest.len() - rest.trim_start().len();
        out.push_str(&rest[..token_start]);
        rest = &rest[token_start..];
        let token_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..token_end];
        out.push_str(if token == from { to } else { token });
        rest = &rest[token_end..];
    }
    out
}

fn retarget_machine_options(project: &mut Vcxproj) -> Result<bool> {
    let edits = {
        let doc = project.document()?;
        let src = project.source();
        let mut edits = Edits::default();

        let groups = children(doc.root_element(), "ItemDefinitionGroup")
            .filter(|g| g.attribute("Condition").is_some_and(|c| c.contains(ARM64EC_GUARD)));
        for group in groups {
            for tool in ["Lib", "Link"] {
                let Some(options) = child(group, tool).and_then(|t| child(t, "AdditionalOptions"))
                else {
                    continue;
                };
                let value = text(&options);
                let retargeted = replace_option(value, "/machine:ARM64", "/machine:ARM64X");
                if retargeted != value {
                    edits.push(vcxproj::set_text(src, options, &retargeted));
                }
            }
        }
        edits
    };
    Ok(project.apply(edits))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  7. Object paths
// ═══════════════════════════════════════════════════════════════════════════════

/// `…\$(Configuration)\name.obj` → `…\$(Configuration)\$(Platform)\name.obj`.
fn platform_object_path(include: &str) -> Option<String> {
    if !include.to_ascii_lowercase().ends_with(".obj") {
        return None;
    }
    let mut parts: Vec<&str> = include.split(['/', '\\']).collect();
    let file = parts.len().checked_sub(1)?;
    if file == 0 || parts[file - 1] != "$(Configuration)" {
        return None;
    }
    parts.insert(file, "$(Platform)");
    Some(parts.join("\\"))
}

fn split_object_paths(project: &mut Vcxproj) -> Result<bool> {
    let edits = {
        let doc = project.document()?;
        let src = project.source();
        let mut edits = Edits::default();
        for object in root_grandchildren(&doc, "ItemGroup", "Object") {
            let include = object.attribute("Include").unwrap_or("");
            if let Some(path) = platform_object_path(include) {
                edits.push(vcxproj::set_attribute(src, object, "Include", &path));
            }
        }
        edits
    };
    Ok(project.apply(edits))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  8. CustomBuild
// ═══════════════════════════════════════════════════════════════════════════════

fn clone_custom_build_steps(project: &mut Vcxproj) -> Result<bool> {
    let edits = {
        let doc = project.document()?;
        let src = project.source();
        let mut edits = Edits::default();

        for custom_build in root_grandchildren(&doc, "ItemGroup", "CustomBuild") {
            let steps: Vec<Node> = custom_build.children().filter(|n| n.is_element()).collect();
            let mut tags: Vec<&str> = steps.iter().map(|n| n.tag_name().name()).collect();
            tags.sort_unstable();
            tags.dedup();
            for tag in tags {
                let scope: Vec<Node> = steps.iter().copied().filter(|n| is_element(n, tag)).collect();
                clone_guarded(src, &scope, &mut edits);
            }
        }
        edits
    };
    Ok(project.apply(edits))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const ZLIB: &str = include_str!("../tests/fixtures/zlib.vcxproj");

    fn project(source: &str) -> Vcxproj {
        Vcxproj::parse(source.as_bytes()).unwrap()
    }

    fn fixed(source: &str) -> String {
        let mut project = project(source);
        assert!(setup_arm64x(&mut project).unwrap());
        project.source().to_string()
    }

    fn wrap(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Project DefaultTargets=\"Build\" xmlns=\"{}\">\n{body}</Project>\n",
            vcxproj::MSBUILD_NS
        )
    }

    const DEBUG_ARM64: &str = "'$(Configuration)|$(Platform)'=='Debug|ARM64'";
    const DEBUG_ARM64EC: &str = "'$(Configuration)|$(Platform)'=='Debug|ARM64EC'";

    fn configuration_only(extra: &str) -> String {
        wrap(&format!(
            "  <ItemGroup Label=\"ProjectConfigurations\">\n\
             \x20   <ProjectConfiguration Include=\"Debug|ARM64\">\n\
             \x20     <Configuration>Debug</Configuration>\n\
             \x20     <Platform>ARM64</Platform>\n\
             \x20   </ProjectConfiguration>\n\
             \x20 </ItemGroup>\n\
             \x20 <PropertyGroup Condition=\"{DEBUG_ARM64}\" Label=\"Configuration\">\n\
             \x20   <ConfigurationType>StaticLibrary</ConfigurationType>\n\
             \x20 </PropertyGroup>\n{extra}"
        ))
    }

    // ── Value rules ──────────────────────────────────────────────────────

    #[test]
    fn out_dir_splits_only_arm64() {
        assert_eq!(
            split_out_dir(r"V:\build\zlib\Debug\"),
            (r"V:\build\zlib\Debug\ARM64\".to_string(), r"V:\build\zlib\Debug\".to_string())
        );
    }

    #[test]
    fn int_dir_splits_both() {
        assert_eq!(
            split_int_dir(r"zlib.dir\Debug\"),
            (r"zlib.dir\Debug\ARM64\".to_string(), r"zlib.dir\Debug\ARM64EC\".to_string())
        );
    }

    #[test]
    fn platform_neutral_dirs_are_kept() {
        let neutral = PLATFORM_NEUTRAL_DIR.to_string();
        assert_eq!(split_out_dir(PLATFORM_NEUTRAL_DIR), (neutral.clone(), neutral.clone()));
        assert_eq!(split_int_dir(PLATFORM_NEUTRAL_DIR), (neutral.clone(), neutral));
    }

    #[test]
    fn join_segment_adds_separator_once() {
        assert_eq!(join_segment(r"out\Debug", "ARM64"), r"out\Debug\ARM64\");
        assert_eq!(join_segment("out/Debug/", "ARM64"), r"out/Debug/ARM64\");
        assert_eq!(join_segment("", "ARM64"), r"ARM64\");
    }

    #[test]
    fn replace_option_matches_whole_tokens() {
        assert_eq!(
            replace_option("%(AdditionalOptions) /machine:ARM64", "/machine:ARM64", "/machine:ARM64X"),
            "%(AdditionalOptions) /machine:ARM64X"
        );
        assert_eq!(
            replace_option("foo/machine:ARM64bar /machine:ARM64EC", "/machine:ARM64", "/machine:ARM64X"),
            "foo/machine:ARM64bar /machine:ARM64EC"
        );
        assert_eq!(
            replace_option("  /machine:ARM64\t/X  ", "/machine:ARM64", "/machine:ARM64X"),
            "  /machine:ARM64X\t/X  "
        );
    }

    #[test]
    fn object_path_gains_platform() {
        assert_eq!(
            platform_object_path(r"$(Configuration)\zlib.obj").as_deref(),
            Some(r"$(Configuration)\$(Platform)\zlib.obj")
        );
        assert_eq!(
            platform_object_path("V:/build/zlib.dir/$(Configuration)/adler32.OBJ").as_deref(),
            Some(r"V:\build\zlib.dir\$(Configuration)\$(Platform)\adler32.OBJ")
        );
        assert_eq!(platform_object_path(r"Debug\zlib.obj"), None);
        assert_eq!(platform_object_path(r"$(Configuration)\zlib.lib"), None);
        assert_eq!(platform_object_path("zlib.obj"), None);
        assert_eq!(platform_object_path(r"$(Configuration)\$(Platform)\zlib.obj"), None);
    }

    // ── Individual steps ─────────────────────────────────────────────────

    #[test]
    fn configuration_declaration_is_cloned() {
        let out = fixed(&configuration_only(""));
        assert!(out.contains(
            "    </ProjectConfiguration>\n    <ProjectConfiguration Include=\"Debug|ARM64EC\">\n      <Configuration>Debug</Configuration>\n      <Platform>ARM64EC</Platform>\n    </ProjectConfiguration>\n  </ItemGroup>"
        ));
    }

    #[test]
    fn configuration_without_platform_is_structural_error() {
        let source = configuration_only("").replace("      <Platform>ARM64</Platform>\n", "");
        let err = setup_arm64x(&mut project(&source)).unwrap_err();
        assert!(matches!(err, Error::Structure(_)), "{err}");
    }

    #[test]
    fn configuration_group_is_cloned_with_build_as_x() {
        let out = fixed(&configuration_only(""));
        assert!(out.contains(&format!(
            "  <PropertyGroup Condition=\"{DEBUG_ARM64EC}\" Label=\"Configuration\">\n    <ConfigurationType>StaticLibrary</ConfigurationType>\n    <BuildAsX>true</BuildAsX>\n  </PropertyGroup>"
        )));
        // The ARM64 group is untouched.
        assert!(out.contains(&format!(
            "  <PropertyGroup Condition=\"{DEBUG_ARM64}\" Label=\"Configuration\">\n    <ConfigurationType>StaticLibrary</ConfigurationType>\n  </PropertyGroup>"
        )));
    }

    #[test]
    fn duplicate_build_as_x_is_repaired() {
        let source = wrap(&format!(
            "  <ItemGroup>\n    <ProjectConfiguration Include=\"Debug|ARM64EC\">\n      <Platform>ARM64EC</Platform>\n    </ProjectConfiguration>\n  </ItemGroup>\n\
             \x20 <PropertyGroup Condition=\"{DEBUG_ARM64EC}\">\n    <BuildAsX>false</BuildAsX>\n    <BuildAsX>true</BuildAsX>\n  </PropertyGroup>\n\
             \x20 <PropertyGroup Condition=\" '$(Configuration)|$(Platform)' == 'Debug|ARM64EC' \">\n    <BuildAsX>1</BuildAsX>\n  </PropertyGroup>\n"
        ));
        let out = fixed(&source);
        assert_eq!(out.matches("<BuildAsX>").count(), 1);
        assert!(out.contains("    <BuildAsX>true</BuildAsX>\n  </PropertyGroup>"));
        assert!(out.contains("' == 'Debug|ARM64EC' \">\n  </PropertyGroup>"));
    }

    #[test]
    fn missing_arm64ec_group_is_structural_error() {
        let source = wrap(
            "  <ItemGroup>\n    <ProjectConfiguration Include=\"Debug|ARM64EC\">\n      <Platform>ARM64EC</Platform>\n    </ProjectConfiguration>\n  </ItemGroup>\n",
        );
        let err = setup_arm64x(&mut project(&source)).unwrap_err();
        assert!(matches!(err, Error::Structure(_)), "{err}");
    }

    #[test]
    fn scalar_properties_follow_their_rules() {
        let source = configuration_only(&format!(
            "  <PropertyGroup>\n\
             \x20   <OutDir Condition=\"{DEBUG_ARM64}\">V:\\build\\zlib\\Debug\\</OutDir>\n\
             \x20   <IntDir Condition=\"{DEBUG_ARM64}\">zlib.dir\\Debug\\</IntDir>\n\
             \x20   <TargetName Condition=\"{DEBUG_ARM64}\">zlibd</TargetName>\n\
             \x20   <TargetExt Condition=\"{DEBUG_ARM64}\">.lib</TargetExt>\n\
             \x20 </PropertyGroup>\n"
        ));
        let out = fixed(&source);
        for expected in [
            format!("<OutDir Condition=\"{DEBUG_ARM64}\">V:\\build\\zlib\\Debug\\ARM64\\</OutDir>\n    <OutDir Condition=\"{DEBUG_ARM64EC}\">V:\\build\\zlib\\Debug\\</OutDir>"),
            format!("<IntDir Condition=\"{DEBUG_ARM64}\">zlib.dir\\Debug\\ARM64\\</IntDir>\n    <IntDir Condition=\"{DEBUG_ARM64EC}\">zlib.dir\\Debug\\ARM64EC\\</IntDir>"),
            format!("<TargetName Condition=\"{DEBUG_ARM64}\">zlibd</TargetName>\n    <TargetName Condition=\"{DEBUG_ARM64EC}\">zlibd</TargetName>"),
            format!("<TargetExt Condition=\"{DEBUG_ARM64}\">.lib</TargetExt>\n    <TargetExt Condition=\"{DEBUG_ARM64EC}\">.lib</TargetExt>"),
        ] {
            assert!(out.contains(&expected), "missing {expected}\n{out}");
        }
    }

    #[test]
    fn existing_arm64ec_property_leaves_arm64_alone() {
        let source = configuration_only(&format!(
            "  <PropertyGroup>\n\
             \x20   <OutDir Condition=\"{DEBUG_ARM64}\">out\\</OutDir>\n\
             \x20   <OutDir Condition=\"{DEBUG_ARM64EC}\">custom\\</OutDir>\n\
             \x20 </PropertyGroup>\n"
        ));
        let out = fixed(&source);
        assert!(out.contains(&format!("<OutDir Condition=\"{DEBUG_ARM64}\">out\\</OutDir>")));
        assert_eq!(out.matches("<OutDir ").count(), 2);
    }

    #[test]
    fn machine_option_is_retargeted_in_cloned_groups() {
        let source = configuration_only(&format!(
            "  <ItemDefinitionGroup Condition=\"{DEBUG_ARM64}\">\n\
             \x20   <Lib>\n      <AdditionalOptions>%(AdditionalOptions) /machine:ARM64</AdditionalOptions>\n    </Lib>\n\
             \x20   <Link>\n      <AdditionalOptions>/machine:ARM64 foo/machine:ARM64bar</AdditionalOptions>\n    </Link>\n\
             \x20 </ItemDefinitionGroup>\n"
        ));
        let out = fixed(&source);
        let (arm64, arm64ec) = out
            .split_once(&format!("<ItemDefinitionGroup Condition=\"{DEBUG_ARM64EC}\">"))
            .unwrap();
        assert!(arm64.contains("%(AdditionalOptions) /machine:ARM64</AdditionalOptions>"));
        assert!(arm64ec.contains("%(AdditionalOptions) /machine:ARM64X</AdditionalOptions>"));
        assert!(arm64ec.contains("<AdditionalOptions>/machine:ARM64X foo/machine:ARM64bar</AdditionalOptions>"));
    }

    #[test]
    fn custom_build_steps_are_cloned_per_tag() {
        let source = configuration_only(&format!(
            "  <ItemGroup>\n    <CustomBuild Include=\"CMakeLists.txt\">\n\
             \x20     <Message Condition=\"{DEBUG_ARM64}\">Building Custom Rule</Message>\n\
             \x20     <Command Condition=\"{DEBUG_ARM64}\">cmake</Command>\n\
             \x20     <Command Condition=\"{DEBUG_ARM64EC}\">cmake -DX</Command>\n\
             \x20   </CustomBuild>\n  </ItemGroup>\n"
        ));
        let out = fixed(&source);
        assert!(out.contains(&format!(
            "<Message Condition=\"{DEBUG_ARM64}\">Building Custom Rule</Message>\n      <Message Condition=\"{DEBUG_ARM64EC}\">Building Custom Rule</Message>"
        )));
        assert_eq!(out.matches("<Command ").count(), 2);
    }

    // ── Whole project ────────────────────────────────────────────────────

    #[test]
    fn zlib_fixture_gets_every_arm64ec_twin() {
        let out = fixed(ZLIB);
        let fixed_project = project(&out);
        let doc = fixed_project.document().unwrap();

        let configurations = root_grandchildren(&doc, "ItemGroup", "ProjectConfiguration");
        for config in configurations.iter().filter(|c| c.attribute("Include").is_some_and(|i| i.ends_with("|ARM64"))) {
            let include = format!("{}EC", config.attribute("Include").unwrap());
            let twins: Vec<_> = configurations
                .iter()
                .filter(|c| c.attribute("Include") == Some(include.as_str()))
                .collect();
            assert_eq!(twins.len(), 1, "{include}");
            assert_eq!(child(*twins[0], "Platform").and_then(|p| p.text()), Some(ARM64EC));
        }

        for target in arm64ec_configurations(&fixed_project).unwrap() {
            let flags: Vec<_> = children(doc.root_element(), "PropertyGroup")
                .filter(|g| g.attribute("Condition").is_some_and(|c| condition::guards(c, &target)))
                .flat_map(|g| children(g, BUILD_AS_X))
                .collect();
            assert_eq!(flags.len(), 1, "{target}");
            assert_eq!(text(&flags[0]), TRUE);
        }

        for group in children(doc.root_element(), "ItemDefinitionGroup")
            .filter(|g| g.attribute("Condition").is_some_and(|c| c.contains(ARM64EC_GUARD)))
        {
            for options in group.descendants().filter(|n| is_element(n, "AdditionalOptions")) {
                assert!(!text(&options).split_whitespace().any(|t| t == "/machine:ARM64"));
            }
        }

        assert!(out.contains(r#"<Object Include="V:\build\zlib\zlib.dir\$(Configuration)\$(Platform)\adler32.obj" />"#));
    }

    #[test]
    fn second_run_changes_nothing() {
        let once = fixed(ZLIB);
        let mut again = project(&once);
        assert!(!setup_arm64x(&mut again).unwrap());
        assert_eq!(again.source(), once);
    }

    #[test]
    fn untouched_lines_are_preserved() {
        let out = fixed(ZLIB);
        for line in ZLIB.lines().filter(|l| !l.contains("ARM64") && !l.contains("<Object ")) {
            assert!(out.contains(line), "lost line: {line}");
        }
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n"));
        assert_eq!(out.matches('\n').count(), out.matches("\r\n").count());
    }

    #[test]
    fn project_without_arm64_is_unchanged() {
        let source = ZLIB.replace("ARM64", "x64").replace(r"$(Configuration)\", r"Debug\");
        let mut project = project(&source);
        assert!(!setup_arm64x(&mut project).unwrap());
        assert_eq!(project.source(), source);
    }
}
