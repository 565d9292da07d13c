//! End-to-end pack runs against an in-memory project.
//!
//! Each test builds a small source tree in a temp directory, describes a
//! project referencing it, and runs the whole pack:
//! - Sequences shared by several nodes are copied once and relinked everywhere
//! - Relative links inside and outside the delivery directory
//! - Missing resources are reported, not copied
//! - Package directories are write-once across runs
//! - A failed copy keeps the original reference
//! - Sequences go through the bulk copy command, failures are collected
//! - Reusable nodes are packed and converted to groups

use std::path::Path;

use rusty_pack::{
    Anatomy, HostNode, MemoryHost, PackReport, PackRun, PackSettings, ParameterValue,
    ResourceKind,
};
use rusty_pack_common::to_posix_path;
use tempfile::TempDir;

const PROFILE: &str = r#"{
    "job": {
        "job_name_default": "Pack_v001",
        "job_root": "__ROOT__/out"
    },
    "nuke_scripts": {
        "source": {
            "copy": true,
            "path": "{job[root]}/{job[name]}/{script_name}_source.nk"
        },
        "package": {
            "copy": true,
            "path": "{job[name]}/nuke/{script_name}_package.nk",
            "relative": true
        },
        "target": {
            "copy": true,
            "path": "{job[name]}/nuke/{script_name}.nk",
            "path_relink": "__RELINK__",
            "relative": true
        }
    },
    "categories": {
        "plates": {
            "path": {
                "root_template": "{job}/{folder[name]}/{category}",
                "root_template_relink": "/vendor/{folder[name]}/{category}"
            },
            "filters": [
                {"source": "File Name", "search": ".*\\.(\\w{2,4})$", "check": ["exr"], "token_name": "extension"}
            ]
        }
    },
    "gizmos": {
        "root_template": "{job}/{folder[name]}/gizmos",
        "root_template_relink": "/vendor/{folder[name]}/gizmos",
        "to_groups": true
    }
}"#;

/// Write a file below `root`, creating directories.
fn write(root: &str, relative: &str, data: &[u8]) -> String {
    let path: String = format!("{}/{}", root, relative);
    std::fs::create_dir_all(Path::new(&path).parent().unwrap()).unwrap();
    std::fs::write(&path, data).unwrap();
    path
}

fn settings(root: &str, relink: &str) -> PackSettings {
    let json: String = PROFILE
        .replace("__ROOT__", root)
        .replace("__RELINK__", relink);
    PackSettings::from_json_str(&json).unwrap()
}

fn anatomy() -> Anatomy {
    Anatomy::new().with_token("folder[name]", "sh010")
}

/// Source tree with a three-frame plate and a project referencing it twice
/// plus one missing sequence.
fn plate_project(root: &str) -> MemoryHost {
    for frame in 1001..=1003 {
        write(
            root,
            &format!("src/plates/plate.{}.exr", frame),
            format!("frame {}", frame).as_bytes(),
        );
    }
    let plate: String = format!("{}/src/plates/plate.%04d.exr", root);
    let ghost: String = format!("{}/src/missing/ghost.%04d.exr", root);

    MemoryHost::new()
        .with_project_path(format!("{}/src/comp_v003.nk", root))
        .with_node(
            HostNode::new("Read1", "Read")
                .with_file("file", &plate)
                .with_output("Merge1"),
        )
        .with_node(
            HostNode::new("Read2", "Read")
                .with_file("file", &plate)
                .with_output("Merge1"),
        )
        .with_node(
            HostNode::new("Read3", "Read")
                .with_file("file", &ghost)
                .with_output("Merge1"),
        )
}

fn saved_file(host: &MemoryHost, save: usize, node: &str) -> String {
    let saved = &host.saved_projects()[save];
    let node: &HostNode = saved.nodes.iter().find(|n| n.name == node).unwrap();
    match node.parameter("file") {
        Some(ParameterValue::File { path }) => path.clone(),
        other => panic!("unexpected parameter {:?}", other),
    }
}

#[test]
fn test_shared_sequence_copied_once_and_relinked_everywhere() {
    let dir: TempDir = TempDir::new().unwrap();
    let root: String = to_posix_path(dir.path());
    let mut host: MemoryHost = plate_project(&root);

    let run: PackRun = PackRun::new(
        settings(&root, "/vendor/{folder[name]}/nuke/{script_name}.nk"),
        anatomy(),
    )
    .unwrap();
    let report_path: String = run.report_path();
    let report: PackReport = run.execute(&mut host, None).unwrap();

    // One copy of the plate.
    let plates: String = format!("{}/out/Pack_v001/sh010/plates", root);
    assert_eq!(report.copied.len(), 1);
    assert_eq!(report.copied[0].file_count, 3);
    assert_eq!(report.copied[0].destination, plates);
    for frame in 1001..=1003 {
        assert!(Path::new(&format!("{}/plate.{}.exr", plates, frame)).is_file());
    }
    assert!(report.errors.is_empty());

    // One row for the plate, one for the missing sequence.
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0].node_name, "Read1");
    assert_eq!(report.rows[0].file_count, 3);
    assert_eq!(report.missing_rows().count(), 1);

    // Source, package and target projects.
    let kinds: Vec<&str> = report.scripts.iter().map(|s| s.kind.as_str()).collect();
    assert_eq!(kinds, vec!["source", "package", "target"]);
    assert_eq!(
        report.scripts[2].path,
        format!("{}/out/Pack_v001/nuke/comp_v003.nk", root)
    );
    assert!(Path::new(&report.scripts[2].path).is_file());

    // Both readers point to the same destination in every relinked project.
    let package_link: &str = "[file dirname [file dirname [value root.name]]]/sh010/plates/plate.%04d.exr";
    let target_link: &str = "[file dirname [file dirname [value root.name]]]/plates/plate.%04d.exr";
    assert_eq!(report.relinked.len(), 4);
    assert_eq!(saved_file(&host, 1, "Read1"), package_link);
    assert_eq!(saved_file(&host, 1, "Read2"), package_link);
    assert_eq!(saved_file(&host, 2, "Read1"), target_link);
    assert_eq!(saved_file(&host, 2, "Read2"), target_link);

    // The source copy and the live project keep their references.
    let original: String = format!("{}/src/plates/plate.%04d.exr", root);
    assert_eq!(saved_file(&host, 0, "Read1"), original);
    assert_eq!(
        host.node("Read2").unwrap().parameter("file"),
        Some(&ParameterValue::File { path: original })
    );
    assert_eq!(
        saved_file(&host, 2, "Read3"),
        format!("{}/src/missing/ghost.%04d.exr", root)
    );

    // The manifest on disk matches the returned report.
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(
        report_path,
        format!("{}/out/Pack_v001/Pack_v001_report.json", root)
    );
    assert_eq!(written["rows"].as_array().unwrap().len(), 2);
    assert_eq!(written["scripts"].as_array().unwrap().len(), 3);
}

#[test]
fn test_relative_link_inside_delivery_is_plain() {
    let dir: TempDir = TempDir::new().unwrap();
    let root: String = to_posix_path(dir.path());
    let mut host: MemoryHost = plate_project(&root);

    let run: PackRun = PackRun::new(
        settings(&root, "/vendor/{folder[name]}/{script_name}.nk"),
        anatomy(),
    )
    .unwrap();
    run.execute(&mut host, None).unwrap();

    assert_eq!(saved_file(&host, 2, "Read1"), "plates/plate.%04d.exr");
}

#[test]
fn test_second_run_does_not_overwrite() {
    let dir: TempDir = TempDir::new().unwrap();
    let root: String = to_posix_path(dir.path());
    let relink: &str = "/vendor/{folder[name]}/nuke/{script_name}.nk";

    let mut host: MemoryHost = plate_project(&root);
    PackRun::new(settings(&root, relink), anatomy())
        .unwrap()
        .execute(&mut host, None)
        .unwrap();

    let mut host: MemoryHost = plate_project(&root);
    let report: PackReport = PackRun::new(settings(&root, relink), anatomy())
        .unwrap()
        .execute(&mut host, None)
        .unwrap();

    assert!(report.copied.is_empty());
    assert_eq!(report.errors.len(), 3);
    assert!(report.errors[0].message.contains("already exists"));
}

#[test]
fn test_reusable_node_packed_and_converted() {
    let dir: TempDir = TempDir::new().unwrap();
    let root: String = to_posix_path(dir.path());
    let definition: String = write(&root, "plugins/MyGlow.gizmo", b"Gizmo {}");

    let mut glow: HostNode = HostNode::new("MyGlow1", "MyGlow").with_output("Merge1");
    glow.reusable = true;
    let mut host: MemoryHost = MemoryHost::new()
        .with_project_path(format!("{}/src/comp_v003.nk", root))
        .with_node(glow);
    host.plugin_paths = vec![format!("{}/plugins", root)];

    let run: PackRun = PackRun::new(
        settings(&root, "/vendor/{folder[name]}/nuke/{script_name}.nk"),
        anatomy(),
    )
    .unwrap();
    let report: PackReport = run.execute(&mut host, None).unwrap();

    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].kind, ResourceKind::ReusableNode);
    assert_eq!(report.rows[0].original_path, "MyGlow.gizmo");
    assert!(Path::new(&format!("{}/out/Pack_v001/sh010/gizmos/MyGlow.gizmo", root)).is_file());
    assert!(Path::new(&definition).is_file());

    let saved = host.saved_projects();
    assert_eq!(saved[0].nodes[0].class, "MyGlow");
    assert_eq!(saved[1].nodes[0].class, "Group");
    assert_eq!(saved[2].nodes[0].class, "Group");
}

#[test]
fn test_failed_copy_keeps_original_reference() {
    let dir: TempDir = TempDir::new().unwrap();
    let root: String = to_posix_path(dir.path());
    let first: String = write(&root, "src1/bg.exr", b"bg01");
    let second: String = write(&root, "src2/bg.exr", b"bg02bg02");
    let mut host: MemoryHost = MemoryHost::new()
        .with_project_path(format!("{}/src/comp_v003.nk", root))
        .with_node(
            HostNode::new("Read1", "Read")
                .with_file("file", &first)
                .with_output("Merge1"),
        )
        .with_node(
            HostNode::new("Read2", "Read")
                .with_file("file", &second)
                .with_output("Merge1"),
        );

    let run: PackRun = PackRun::new(
        settings(&root, "/vendor/{folder[name]}/nuke/{script_name}.nk"),
        anatomy(),
    )
    .unwrap();
    let report: PackReport = run.execute(&mut host, None).unwrap();

    // Both files want the same destination; the second one is refused.
    let destination: String = format!("{}/out/Pack_v001/sh010/plates/bg.exr", root);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].source.ends_with("/src2/bg.exr"));
    assert_eq!(std::fs::read(&destination).unwrap(), b"bg01");

    // Only Read1 is relinked, in the package and the target project.
    assert_eq!(report.relinked.len(), 2);
    assert!(report.relinked.iter().all(|r| r.node == "Read1"));
    assert_eq!(
        saved_file(&host, 2, "Read1"),
        "[file dirname [file dirname [value root.name]]]/plates/bg.exr"
    );
    assert_eq!(saved_file(&host, 1, "Read2"), second);
    assert_eq!(saved_file(&host, 2, "Read2"), second);
    assert_eq!(
        report
            .warnings
            .iter()
            .filter(|w| w.starts_with("Read2:"))
            .count(),
        1
    );
}

/// Two two-frame sequences in their own directories.
#[cfg(unix)]
fn sequence_project(root: &str) -> MemoryHost {
    let mut host: MemoryHost =
        MemoryHost::new().with_project_path(format!("{}/src/comp_v003.nk", root));
    for name in ["a", "b"] {
        for frame in 1001..=1002 {
            write(
                root,
                &format!("src/{}/{}.{}.exr", name, name, frame),
                format!("{} {}", name, frame).as_bytes(),
            );
        }
        host = host.with_node(
            HostNode::new(format!("Read_{}", name), "Read")
                .with_file("file", format!("{}/src/{}/{}.%04d.exr", root, name, name))
                .with_output("Merge1"),
        );
    }
    host
}

#[cfg(unix)]
fn bulk_settings(root: &str, command: &[&str]) -> PackSettings {
    let mut settings: PackSettings =
        settings(root, "/vendor/{folder[name]}/nuke/{script_name}.nk");
    settings.copy.bulk_command = command.iter().map(|s| s.to_string()).collect();
    settings
}

#[cfg(unix)]
#[test]
fn test_bulk_copy_failures_are_collected() {
    let dir: TempDir = TempDir::new().unwrap();
    let root: String = to_posix_path(dir.path());
    let mut host: MemoryHost = sequence_project(&root);

    let settings: PackSettings =
        bulk_settings(&root, &["sh", "-c", "echo out; echo err >&2; exit 3"]);
    let report: PackReport = PackRun::new(settings, anatomy())
        .unwrap()
        .execute(&mut host, None)
        .unwrap();

    assert!(report.copied.is_empty());
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].source.ends_with("/src/a/a.????.exr"));
    assert!(report.errors[1].source.ends_with("/src/b/b.????.exr"));
    for issue in &report.errors {
        assert_eq!(issue.return_code, Some(3));
        assert_eq!(issue.stdout, "out\n");
        assert_eq!(issue.stderr, "err\n");
    }

    // Nothing was delivered, so nothing is relinked.
    assert!(report.relinked.is_empty());
    assert_eq!(
        saved_file(&host, 2, "Read_a"),
        format!("{}/src/a/a.%04d.exr", root)
    );
}

#[cfg(unix)]
#[test]
fn test_bulk_copy_command_copies_sequences() {
    let dir: TempDir = TempDir::new().unwrap();
    let root: String = to_posix_path(dir.path());
    let mut host: MemoryHost = sequence_project(&root);

    let settings: PackSettings = bulk_settings(
        &root,
        &["sh", "-c", "cp \"$0\"/* \"$1\"/", "{source_dir}", "{target_dir}"],
    );
    let report: PackReport = PackRun::new(settings, anatomy())
        .unwrap()
        .execute(&mut host, None)
        .unwrap();

    assert!(report.errors.is_empty());
    assert_eq!(report.copied.len(), 2);
    assert!(report.copied.iter().all(|c| c.bulk && c.file_count == 2));
    assert_eq!(report.copied[0].bytes, 12);

    let plates: String = format!("{}/out/Pack_v001/sh010/plates", root);
    for name in ["a.1001.exr", "a.1002.exr", "b.1001.exr", "b.1002.exr"] {
        assert!(Path::new(&format!("{}/{}", plates, name)).is_file());
    }
    assert_eq!(
        saved_file(&host, 2, "Read_b"),
        "[file dirname [file dirname [value root.name]]]/plates/b.%04d.exr"
    );
}
