//! Install and deploy scenarios run against a temporary home and cache

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use stowage_core::cache::PackageInfo;
use stowage_core::deploy::copy_dir_recursive;
use stowage_core::install::{InstallOutcome, InstallRequest, InstallSource, Installer};
use stowage_core::reference::PackageRef;
use stowage_core::Error;
use tempfile::TempDir;

struct TestEnv {
    _temp: TempDir,
    root: Utf8PathBuf,
    installer: Installer,
}

/// A package to store in the cache
struct Package<'a> {
    reference: &'a str,
    settings: &'a [(&'a str, &'a str)],
    options: &'a [(&'a str, &'a str)],
    files: &'a [(&'a str, &'a str)],
    requires: &'a [&'a str],
    build_modules: &'a [&'a str],
}

impl<'a> Package<'a> {
    fn new(reference: &'a str) -> Self {
        Self {
            reference,
            settings: &[],
            options: &[],
            files: &[],
            requires: &[],
            build_modules: &[],
        }
    }
}

impl TestEnv {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path())
            .unwrap()
            .canonicalize_utf8()
            .unwrap();
        let home = root.join("home");
        fs::create_dir_all(&home).unwrap();
        fs::write(
            home.join("global.toml"),
            r#"
[deploy]
jobs = 2

[profile.settings]
build_type = "Release"
arch = "x86_64"
"#,
        )
        .unwrap();

        let installer = Installer::from_home(&home).unwrap();
        Self {
            _temp: temp,
            root,
            installer,
        }
    }

    fn add_package(&self, package: Package<'_>) {
        let reference: PackageRef = package.reference.parse().unwrap();
        let source = self.root.join("sources").join(format!(
            "{}-{}-{}",
            reference.name,
            reference.version,
            package.settings.iter().map(|(_, v)| *v).collect::<Vec<_>>().join("-")
        ));
        if source.exists() {
            fs::remove_dir_all(&source).unwrap();
        }
        fs::create_dir_all(&source).unwrap();
        for (path, content) in package.files {
            write(&source.join(path), content);
        }

        let mut info = PackageInfo::new(reference);
        for (key, value) in package.settings {
            info.settings.set(*key, *value);
        }
        for (key, value) in package.options {
            info.options.set(*key, *value);
        }
        info.requires = package.requires.iter().map(|r| r.parse().unwrap()).collect();
        info.cpp_info.build_modules = package.build_modules.iter().map(|m| m.to_string()).collect();
        self.installer.cache().add_package(info, &source).unwrap();
    }

    fn deployers_folder(&self) -> Utf8PathBuf {
        self.installer.cache().deployers_folder()
    }

    fn requires(&self, refs: &[&str]) -> InstallRequest {
        let refs = refs.iter().map(|r| r.parse().unwrap()).collect();
        InstallRequest::new(InstallSource::Requires(refs), self.root.join("project"))
    }

    fn recipe(&self, path: &str) -> InstallRequest {
        InstallRequest::new(
            InstallSource::Recipe(Utf8PathBuf::from(path)),
            self.root.join("project"),
        )
    }

    fn project(&self) -> Utf8PathBuf {
        self.root.join("project")
    }

    fn install(&self, request: &InstallRequest) -> InstallOutcome {
        match self.installer.install(request) {
            Ok(outcome) => outcome,
            Err(e) => panic!("install failed: {:?}", e),
        }
    }
}

fn write(path: &Utf8Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Expand the folder expression of `set(<var> "<expr>")` for a file in `file_folder`
fn cmake_folder(data: &str, var: &str, file_folder: &Utf8Path) -> Utf8PathBuf {
    let prefix = format!("set({} \"", var);
    let line = data
        .lines()
        .find(|l| l.starts_with(&prefix))
        .unwrap_or_else(|| panic!("{} not found in:\n{}", var, data));
    let expr = line[prefix.len()..].trim_end_matches("\")");
    Utf8PathBuf::from(expr.replace("${CMAKE_CURRENT_LIST_DIR}", file_folder.as_str()))
}

/// Copy `from` to a new location and delete the original
fn relocate(from: &Utf8Path, to: &Utf8Path) {
    copy_dir_recursive(from, to).unwrap();
    fs::remove_dir_all(from).unwrap();
}

fn hello_and_tool(env: &TestEnv) {
    env.add_package(Package {
        settings: &[("build_type", "Release"), ("arch", "x86_64")],
        options: &[("shared", "True")],
        files: &[
            ("include/hello.h", "void hello();"),
            ("lib/libhello.so", "elf"),
        ],
        ..Package::new("hello/0.1")
    });
    env.add_package(Package {
        files: &[("build/my_tools.cmake", "set(MY_TOOL_VARIABLE \"Hello world!\")")],
        build_modules: &["build/my_tools.cmake"],
        ..Package::new("tool/1.0")
    });
}

#[cfg(unix)]
#[test]
fn test_install_custom_deployer_is_relocatable() {
    let env = TestEnv::new();
    hello_and_tool(&env);

    let project = env.project();
    write(
        &project.join("stowfile.toml"),
        "requires = [\"hello/0.1\", \"tool/1.0\"]\n",
    );
    write(
        &project.join("deploy.sh"),
        r#"
tab="$(printf '\t')"
while IFS="$tab" read -r id name version context direct folder; do
    rm -rf "$STOWAGE_OUTPUT_FOLDER/$name"
    cp -R "$folder" "$STOWAGE_OUTPUT_FOLDER/$name"
    printf '%s\t%s\n' "$id" "$name" >> "$STOWAGE_DEPLOY_ASSIGNMENTS"
done < "$STOWAGE_DEPENDENCIES"
"#,
    );

    let mut request = env.recipe(".");
    request.options = strings(&["*:shared=True"]);
    request.deployers = strings(&["deploy.sh"]);
    request.output_folder = Some(Utf8PathBuf::from("mydeploy"));
    request.generators = strings(&["CMakeDeps"]);
    let outcome = env.install(&request);
    assert_eq!(outcome.report.assignments.len(), 2);

    // Nothing refers to the cache anymore
    env.installer.cache().remove("*").unwrap();
    assert!(env.installer.cache().references().unwrap().is_empty());

    let data = fs::read_to_string(project.join("mydeploy/hello-release-x86_64-data.cmake")).unwrap();
    assert!(data.contains(r#"set(hello_PACKAGE_FOLDER_RELEASE "${CMAKE_CURRENT_LIST_DIR}/hello")"#));
    assert!(data.contains(r#"set(hello_INCLUDE_DIRS_RELEASE "${hello_PACKAGE_FOLDER_RELEASE}/include")"#));
    assert!(data.contains(r#"set(hello_LIB_DIRS_RELEASE "${hello_PACKAGE_FOLDER_RELEASE}/lib")"#));
    let tool = fs::read_to_string(project.join("mydeploy/tool-release-x86_64-data.cmake")).unwrap();
    assert!(tool.contains(
        r#"set(tool_BUILD_MODULES_PATHS_RELEASE "${tool_PACKAGE_FOLDER_RELEASE}/build/my_tools.cmake")"#
    ));

    // The whole tree can move and still resolve
    let relocated = env.root.join("relocated");
    relocate(&project, &relocated);
    let generators = relocated.join("mydeploy");
    let data = fs::read_to_string(generators.join("hello-release-x86_64-data.cmake")).unwrap();
    let hello = cmake_folder(&data, "hello_PACKAGE_FOLDER_RELEASE", &generators);
    assert!(hello.join("include/hello.h").is_file());
    let tool = fs::read_to_string(generators.join("tool-release-x86_64-data.cmake")).unwrap();
    let tool = cmake_folder(&tool, "tool_PACKAGE_FOLDER_RELEASE", &generators);
    assert!(tool.join("build/my_tools.cmake").is_file());
}

#[test]
fn test_install_full_deploy_with_cmake_layout() {
    let env = TestEnv::new();
    hello_and_tool(&env);

    let project = env.project();
    write(
        &project.join("stowfile.toml"),
        r#"
requires = ["hello/0.1", "tool/1.0"]
generators = ["CMakeDeps"]
layout = "cmake"
"#,
    );

    let mut request = env.recipe(".");
    request.options = strings(&["*:shared=True"]);
    request.deployers = strings(&["full_deploy.sh"]);
    let outcome = env.install(&request);
    assert_eq!(outcome.generators_folder, project.join("build/Release/generators"));
    env.installer.cache().remove("*").unwrap();

    let data = fs::read_to_string(
        project.join("build/Release/generators/hello-release-x86_64-data.cmake"),
    )
    .unwrap();
    assert!(data.contains(
        r#"set(hello_PACKAGE_FOLDER_RELEASE "${CMAKE_CURRENT_LIST_DIR}/../../../full_deploy/host/hello/0.1/Release/x86_64")"#
    ));
    assert!(data.contains(r#"set(hello_INCLUDE_DIRS_RELEASE "${hello_PACKAGE_FOLDER_RELEASE}/include")"#));
    assert!(data.contains(r#"set(hello_LIB_DIRS_RELEASE "${hello_PACKAGE_FOLDER_RELEASE}/lib")"#));
    // tool has no settings, so its folder has no configuration segments
    assert!(project.join("full_deploy/host/tool/1.0/build/my_tools.cmake").is_file());

    let relocated = env.root.join("relocated");
    relocate(&project, &relocated);
    let generators = relocated.join("build/Release/generators");
    let data = fs::read_to_string(generators.join("hello-release-x86_64-data.cmake")).unwrap();
    let hello = cmake_folder(&data, "hello_PACKAGE_FOLDER_RELEASE", &generators);
    assert_eq!(
        fs::read_to_string(hello.join("include/hello.h")).unwrap(),
        "void hello();"
    );
}

#[cfg(unix)]
#[test]
fn test_copy_files_deployer() {
    let env = TestEnv::new();
    env.add_package(Package {
        files: &[("bin/file.txt", "content!!")],
        ..Package::new("hello/0.1")
    });

    let project = env.project();
    write(&project.join("stowfile.toml"), "requires = [\"hello/0.1\"]\n");
    write(
        &project.join("deploy.sh"),
        r#"
tab="$(printf '\t')"
while IFS="$tab" read -r id name version context direct folder; do
    for f in "$folder"/bin/*; do
        cp "$f" "$1/"
    done
done < "$STOWAGE_DEPENDENCIES"
"#,
    );

    let mut request = env.recipe("stowfile.toml");
    request.deployers = strings(&["deploy.sh"]);
    request.output_folder = Some(Utf8PathBuf::from("mydeploy"));
    let outcome = env.install(&request);

    assert_eq!(
        fs::read_to_string(project.join("mydeploy/file.txt")).unwrap(),
        "content!!"
    );
    assert!(outcome.report.assignments.is_empty());
}

#[cfg(unix)]
#[test]
fn test_multi_deploy_precedence_and_spellings() {
    let env = TestEnv::new();
    let extensions = env.deployers_folder();
    write(&extensions.join("deploy_cache.sh"), "echo 'deploy cache!!'\n");
    // Always shadowed by the local file
    write(&extensions.join("mydeploy.sh"), "CRASH!!!!\nexit 1\n");

    let project = env.project();
    write(&project.join("stowfile.toml"), "");
    write(&project.join("mydeploy.sh"), "echo 'deploy1!!'\n");
    write(&project.join("sub/mydeploy2.sh"), "echo 'sub/deploy2!!'\n");

    for names in [
        ["mydeploy", "sub/mydeploy2", "deploy_cache"],
        ["mydeploy.sh", "sub/mydeploy2.sh", "deploy_cache.sh"],
    ] {
        let mut request = env.recipe(".");
        request.deployers = strings(&names);
        let outcome = env.install(&request);

        assert_eq!(
            outcome.report.messages,
            vec![
                "stowfile.toml: deploy1!!",
                "stowfile.toml: sub/deploy2!!",
                "stowfile.toml: deploy cache!!",
            ]
        );
        assert_eq!(outcome.report.deployers.len(), 3);
    }
}

#[test]
fn test_builtin_full_deploy_configurations_coexist() {
    let env = TestEnv::new();
    env.add_package(Package {
        settings: &[("build_type", "Release"), ("arch", "x86_64")],
        files: &[("include/hello.h", "Release-x86_64")],
        build_modules: &["build/my_tools_host.cmake"],
        ..Package::new("dep/0.1")
    });
    env.add_package(Package {
        settings: &[("build_type", "Debug"), ("arch", "x86")],
        files: &[("include/hello.h", "Debug-x86")],
        build_modules: &["build/my_tools_host.cmake"],
        ..Package::new("dep/0.1")
    });

    let project = env.project();
    write(&project.join("stowfile.toml"), "requires = [\"dep/0.1\"]\n");

    let mut request = env.recipe(".");
    request.deployers = strings(&["full_deploy"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));
    request.generators = strings(&["CMakeDeps"]);
    let outcome = env.install(&request);
    assert!(outcome.report.messages[0].contains("built-in full deployer"));

    request.settings = strings(&["build_type=Debug", "arch=x86"]);
    env.install(&request);

    let output = project.join("output");
    assert_eq!(
        fs::read_to_string(output.join("full_deploy/host/dep/0.1/Release/x86_64/include/hello.h")).unwrap(),
        "Release-x86_64"
    );
    assert_eq!(
        fs::read_to_string(output.join("full_deploy/host/dep/0.1/Debug/x86/include/hello.h")).unwrap(),
        "Debug-x86"
    );

    let release = fs::read_to_string(output.join("dep-release-x86_64-data.cmake")).unwrap();
    assert!(release.contains(r#"set(dep_INCLUDE_DIRS_RELEASE "${dep_PACKAGE_FOLDER_RELEASE}/include")"#));
    assert!(release.contains("${CMAKE_CURRENT_LIST_DIR}/full_deploy/host/dep/0.1/Release/x86_64"));
    assert!(release.contains(
        r#"set(dep_BUILD_MODULES_PATHS_RELEASE "${dep_PACKAGE_FOLDER_RELEASE}/build/my_tools_host.cmake")"#
    ));

    let debug = fs::read_to_string(output.join("dep-debug-x86-data.cmake")).unwrap();
    assert!(debug.contains(r#"set(dep_INCLUDE_DIRS_DEBUG "${dep_PACKAGE_FOLDER_DEBUG}/include")"#));
    assert!(debug.contains("${CMAKE_CURRENT_LIST_DIR}/full_deploy/host/dep/0.1/Debug/x86"));
    assert!(debug.contains(
        r#"set(dep_BUILD_MODULES_PATHS_DEBUG "${dep_PACKAGE_FOLDER_DEBUG}/build/my_tools_host.cmake")"#
    ));
}

#[test]
fn test_deploy_reference_to_output_and_current_folder() {
    let env = TestEnv::new();
    env.add_package(Package {
        files: &[("include/hi.h", "hi")],
        ..Package::new("pkg/1.0")
    });

    let mut request = env.requires(&["pkg/1.0"]);
    request.deployers = strings(&["full_deploy"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));
    let outcome = env.install(&request);
    assert_eq!(outcome.report.messages.len(), 1);
    assert!(outcome.report.messages[0].starts_with("cli: built-in full deployer"));
    assert_eq!(
        fs::read_to_string(env.project().join("output/full_deploy/host/pkg/1.0/include/hi.h")).unwrap(),
        "hi"
    );

    let mut request = env.requires(&["pkg/1.0"]);
    request.base_folder = env.root.join("elsewhere");
    request.deployers = strings(&["full_deploy"]);
    env.install(&request);
    assert_eq!(
        fs::read_to_string(env.root.join("elsewhere/full_deploy/host/pkg/1.0/include/hi.h")).unwrap(),
        "hi"
    );
}

#[test]
fn test_repeated_builtin_in_one_chain() {
    let env = TestEnv::new();
    env.add_package(Package {
        settings: &[("build_type", "Release"), ("arch", "x86_64")],
        files: &[("include/hi.h", "hi")],
        ..Package::new("pkg/1.0")
    });

    let mut request = env.requires(&["pkg/1.0"]);
    request.deployers = strings(&["full_deploy", "full_deploy", "direct_deploy", "direct_deploy.sh"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));
    request.generators = strings(&["cmake_deps"]);
    let outcome = env.install(&request);

    let output = env.project().join("output");
    assert_eq!(
        fs::read_to_string(output.join("full_deploy/host/pkg/1.0/Release/x86_64/include/hi.h")).unwrap(),
        "hi"
    );
    assert_eq!(
        fs::read_to_string(output.join("direct_deploy/pkg/include/hi.h")).unwrap(),
        "hi"
    );
    assert_eq!(outcome.report.deployers.len(), 4);

    let data = fs::read_to_string(output.join("pkg-release-x86_64-data.cmake")).unwrap();
    let folder = cmake_folder(&data, "pkg_PACKAGE_FOLDER_RELEASE", &output);
    assert_eq!(folder, output.join("direct_deploy/pkg"));
}

#[test]
fn test_deploy_overwrites_previous_content() {
    let env = TestEnv::new();
    env.add_package(Package {
        files: &[("include/hi.h", "hi")],
        ..Package::new("pkg/1.0")
    });

    let mut request = env.requires(&["pkg/1.0"]);
    request.deployers = strings(&["full_deploy"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));
    env.install(&request);
    let header = env.project().join("output/full_deploy/host/pkg/1.0/include/hi.h");
    assert_eq!(fs::read_to_string(&header).unwrap(), "hi");

    env.add_package(Package {
        files: &[("include/hi.h", "bye")],
        ..Package::new("pkg/1.0")
    });
    env.install(&request);
    assert_eq!(fs::read_to_string(&header).unwrap(), "bye");
}

#[test]
fn test_deploy_editable_package() {
    let env = TestEnv::new();
    let editable = env.root.join("pkg");
    write(&editable.join("stowfile.toml"), "name = \"pkg\"\nversion = \"1.0\"\n");
    write(&editable.join("src/include/hi.h"), "hi");
    env.installer
        .cache()
        .add_editable(&"pkg/1.0".parse().unwrap(), &editable)
        .unwrap();

    // Deploying from inside the editable folder would copy it into itself
    let mut request = env.requires(&["pkg/1.0"]);
    request.base_folder = env.root.join("elsewhere");
    request.deployers = strings(&["full_deploy"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));
    let outcome = env.install(&request);

    assert_eq!(
        fs::read_to_string(env.root.join("elsewhere/output/full_deploy/host/pkg/1.0/src/include/hi.h")).unwrap(),
        "hi"
    );
    assert_eq!(outcome.report.assignments.len(), 1);
}

#[test]
fn test_direct_deploy_single_package_and_consumer() {
    let env = TestEnv::new();
    env.add_package(Package {
        files: &[("include/hi.h", "hi")],
        ..Package::new("pkg/1.0")
    });
    write(
        &env.project().join("consumer/stowfile.toml"),
        "requires = [\"pkg/1.0\"]\n",
    );

    let mut request = env.requires(&["pkg/1.0"]);
    request.deployers = strings(&["direct_deploy"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));
    env.install(&request);
    assert_eq!(
        fs::read_to_string(env.project().join("output/direct_deploy/pkg/include/hi.h")).unwrap(),
        "hi"
    );

    let mut request = env.recipe("consumer/stowfile.toml");
    request.deployers = strings(&["direct_deploy"]);
    request.output_folder = Some(Utf8PathBuf::from("output2"));
    let outcome = env.install(&request);
    assert_eq!(
        fs::read_to_string(env.project().join("output2/direct_deploy/pkg/include/hi.h")).unwrap(),
        "hi"
    );
    assert_eq!(
        outcome.report.messages,
        vec![format!(
            "stowfile.toml: built-in direct deployer to {}/direct_deploy",
            env.project().join("output2")
        )]
    );
}

#[test]
fn test_direct_deploy_skips_transitive_dependencies() {
    let env = TestEnv::new();
    env.add_package(Package {
        files: &[("include/base.h", "base")],
        ..Package::new("base/1.0")
    });
    env.add_package(Package {
        files: &[("include/pkg.h", "pkg")],
        requires: &["base/1.0"],
        ..Package::new("pkg/1.0")
    });

    let mut request = env.requires(&["pkg/1.0"]);
    request.deployers = strings(&["direct_deploy"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));
    request.generators = strings(&["cmake_deps"]);
    let outcome = env.install(&request);

    let output = env.project().join("output");
    assert!(output.join("direct_deploy/pkg/include/pkg.h").is_file());
    assert!(!output.join("direct_deploy/base").exists());

    // base was not deployed, so its data file keeps the cache folder
    let base = fs::read_to_string(output.join("base-release-x86_64-data.cmake")).unwrap();
    assert!(!base.contains("CMAKE_CURRENT_LIST_DIR"));
    let base_id = outcome
        .graph
        .find("base", stowage_core::reference::Context::Host)
        .unwrap();
    let cache_folder = outcome.graph.node(base_id).package_folder().unwrap();
    assert!(base.contains(cache_folder.as_str()));
}

#[cfg(unix)]
#[test]
fn test_later_deployers_observe_earlier_assignments() {
    let env = TestEnv::new();
    env.add_package(Package {
        files: &[("include/hi.h", "hi")],
        ..Package::new("pkg/1.0")
    });

    let project = env.project();
    let record = r#"
tab="$(printf '\t')"
while IFS="$tab" read -r id name version context direct folder; do
    printf '%s\n' "$folder" >> "$STOWAGE_OUTPUT_FOLDER/seen.txt"
done < "$STOWAGE_DEPENDENCIES"
"#;
    write(&project.join("a.sh"), record);
    write(
        &project.join("b.sh"),
        r#"
tab="$(printf '\t')"
while IFS="$tab" read -r id name version context direct folder; do
    rm -rf "moved/$name"
    mkdir -p moved
    cp -R "$folder" "moved/$name"
    printf '%s\tmoved/%s\n' "$id" "$name" >> "$STOWAGE_DEPLOY_ASSIGNMENTS"
done < "$STOWAGE_DEPENDENCIES"
"#,
    );
    write(&project.join("c.sh"), record);

    let mut request = env.requires(&["pkg/1.0"]);
    request.deployers = strings(&["a", "b", "c"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));
    let outcome = env.install(&request);

    let output = project.join("output");
    let seen = fs::read_to_string(output.join("seen.txt")).unwrap();
    let seen: Vec<&str> = seen.lines().collect();
    assert_eq!(seen.len(), 2);
    let pkg = outcome
        .graph
        .find("pkg", stowage_core::reference::Context::Host)
        .unwrap();
    assert_eq!(seen[0], outcome.graph.node(pkg).package_folder().unwrap().as_str());
    assert_eq!(seen[1], output.join("moved/pkg").as_str());
    assert_eq!(
        outcome.report.assignments.get(pkg).map(|p| p.as_str()),
        Some(output.join("moved/pkg").as_str())
    );
}

#[test]
fn test_unknown_deployer_aborts_before_mutation() {
    let env = TestEnv::new();
    env.add_package(Package {
        files: &[("include/hi.h", "hi")],
        ..Package::new("pkg/1.0")
    });

    let mut request = env.requires(&["pkg/1.0"]);
    request.deployers = strings(&["full_deploy", "does_not_exist"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));

    match env.installer.install(&request) {
        Err(Error::DeployerNotFound { name, searched, .. }) => {
            assert_eq!(name, "does_not_exist");
            assert!(searched.contains(&env.project().join("does_not_exist.sh")));
        }
        other => panic!("expected DeployerNotFound, got {:?}", other.map(|o| o.output_folder)),
    }
    assert!(!env.project().join("output").exists());
}

#[cfg(unix)]
#[test]
fn test_failing_deployer_stops_the_chain() {
    let env = TestEnv::new();
    env.add_package(Package {
        files: &[("include/hi.h", "hi")],
        ..Package::new("pkg/1.0")
    });
    write(&env.project().join("broken.sh"), "echo 'about to fail'\nexit 2\n");

    let mut request = env.requires(&["pkg/1.0"]);
    request.deployers = strings(&["full_deploy", "broken", "direct_deploy"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));

    match env.installer.install(&request) {
        Err(Error::DeployerExecution { name, .. }) => assert_eq!(name, "broken"),
        other => panic!("expected DeployerExecution, got {:?}", other.map(|o| o.output_folder)),
    }
    let output = env.project().join("output");
    // Earlier work stays, later deployers never ran
    assert!(output.join("full_deploy/host/pkg/1.0/include/hi.h").is_file());
    assert!(!output.join("direct_deploy").exists());
}

#[test]
fn test_repeated_install_is_idempotent() {
    let env = TestEnv::new();
    hello_and_tool(&env);

    let mut request = env.requires(&["hello/0.1", "tool/1.0"]);
    request.options = strings(&["*:shared=True"]);
    request.deployers = strings(&["full_deploy"]);
    request.output_folder = Some(Utf8PathBuf::from("output"));
    request.generators = strings(&["cmake_deps", "run_env"]);

    let snapshot = |root: &Utf8Path| -> Vec<(String, String)> {
        let mut files: Vec<(String, String)> = walkdir_files(root);
        files.sort();
        files
    };

    let first = env.install(&request);
    let before = snapshot(&first.output_folder);
    let second = env.install(&request);
    let after = snapshot(&second.output_folder);

    assert_eq!(before, after);
    assert_eq!(first.report.assignments, second.report.assignments);
    assert_eq!(first.generated, second.generated);
}

fn walkdir_files(root: &Utf8Path) -> Vec<(String, String)> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in dir.read_dir_utf8().unwrap() {
            let entry = entry.unwrap();
            let path = entry.path().to_path_buf();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_string();
                files.push((relative, fs::read_to_string(&path).unwrap()));
            }
        }
    }
    files
}
