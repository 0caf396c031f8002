//! Language profile registry.
//!
//! One immutable, data-driven record per supported language: how to name the
//! source file, how to compile it (if at all), how to run it, how to
//! syntax-check it without running it, and which resource ceilings apply.
//! Loaded once at process start and shared read-only across all workers.

use crate::limits::ResourceLimits;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Static per-language execution metadata.
///
/// Command fields are argv templates; `{file}` expands to the source path,
/// `{exe}` to the build artifact path, `{dir}` to the sandbox scratch
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub id: String,
    pub display_name: String,
    pub file_extension: String,

    /// Fixed source file name where the toolchain demands one (`Main.java`).
    /// Defaults to `main.<extension>`.
    #[serde(default)]
    pub source_file_name: Option<String>,

    /// Name of the compile artifact inside the sandbox, when compiled.
    #[serde(default)]
    pub artifact_name: Option<String>,

    #[serde(default)]
    pub compile_command: Option<Vec<String>>,

    pub run_command: Vec<String>,

    /// Syntax-only check invocation; must never execute the submitted code.
    #[serde(default)]
    pub check_command: Option<Vec<String>>,

    /// Extra environment for the toolchain (e.g. GOCACHE inside the jail).
    #[serde(default)]
    pub env: Vec<(String, String)>,

    pub limits: ResourceLimits,
}

impl LanguageProfile {
    /// Source file name inside the sandbox.
    pub fn source_name(&self) -> String {
        self.source_file_name
            .clone()
            .unwrap_or_else(|| format!("main.{}", self.file_extension))
    }

    /// Artifact path component, for compiled languages.
    pub fn artifact(&self) -> String {
        self.artifact_name.clone().unwrap_or_else(|| "main".into())
    }

    /// Render the profile's extra environment against a sandbox directory.
    pub fn render_env(&self, dir: &Path) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), v.replace("{dir}", &dir.to_string_lossy())))
            .collect()
    }

    /// Render an argv template against a sandbox directory.
    pub fn render(&self, template: &[String], dir: &Path) -> Vec<String> {
        let file = dir.join(self.source_name());
        let exe = dir.join(self.artifact());
        template
            .iter()
            .map(|arg| {
                arg.replace("{file}", &file.to_string_lossy())
                    .replace("{exe}", &exe.to_string_lossy())
                    .replace("{dir}", &dir.to_string_lossy())
            })
            .collect()
    }
}

/// Immutable lookup table of language profiles plus id aliases.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<LanguageProfile>>,
    aliases: HashMap<String, String>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry covering the languages the playground ships with.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.insert(LanguageProfile {
            id: "javascript".into(),
            display_name: "JavaScript".into(),
            file_extension: "js".into(),
            source_file_name: None,
            artifact_name: None,
            compile_command: None,
            run_command: argv(&["node", "{file}"]),
            check_command: Some(argv(&["node", "--check", "{file}"])),
            env: Vec::new(),
            limits: ResourceLimits::interpreted(),
        });

        registry.insert(LanguageProfile {
            id: "typescript".into(),
            display_name: "TypeScript".into(),
            file_extension: "ts".into(),
            source_file_name: None,
            artifact_name: Some("main.js".into()),
            compile_command: Some(argv(&[
                "tsc",
                "--target",
                "ES2020",
                "--module",
                "commonjs",
                "--outDir",
                "{dir}",
                "{file}",
            ])),
            run_command: argv(&["node", "{exe}"]),
            check_command: Some(argv(&["tsc", "--noEmit", "{file}"])),
            env: Vec::new(),
            limits: ResourceLimits::interpreted(),
        });

        registry.insert(LanguageProfile {
            id: "python".into(),
            display_name: "Python".into(),
            file_extension: "py".into(),
            source_file_name: None,
            artifact_name: None,
            compile_command: None,
            run_command: argv(&["python3", "{file}"]),
            check_command: Some(argv(&["python3", "-m", "py_compile", "{file}"])),
            env: Vec::new(),
            limits: ResourceLimits::interpreted(),
        });

        registry.insert(LanguageProfile {
            id: "java".into(),
            display_name: "Java".into(),
            file_extension: "java".into(),
            source_file_name: Some("Main.java".into()),
            artifact_name: Some("Main.class".into()),
            compile_command: Some(argv(&["javac", "{file}"])),
            run_command: argv(&["java", "-Xmx256m", "-cp", "{dir}", "Main"]),
            check_command: None,
            env: Vec::new(),
            limits: ResourceLimits::heavy_compiler(),
        });

        registry.insert(LanguageProfile {
            id: "c".into(),
            display_name: "C".into(),
            file_extension: "c".into(),
            source_file_name: None,
            artifact_name: Some("main".into()),
            compile_command: Some(argv(&["gcc", "-O2", "-o", "{exe}", "{file}"])),
            run_command: argv(&["{exe}"]),
            check_command: Some(argv(&["gcc", "-fsyntax-only", "{file}"])),
            env: Vec::new(),
            limits: ResourceLimits::default(),
        });

        registry.insert(LanguageProfile {
            id: "cpp".into(),
            display_name: "C++".into(),
            file_extension: "cpp".into(),
            source_file_name: None,
            artifact_name: Some("main".into()),
            compile_command: Some(argv(&[
                "g++",
                "-std=c++17",
                "-O2",
                "-o",
                "{exe}",
                "{file}",
            ])),
            run_command: argv(&["{exe}"]),
            check_command: Some(argv(&["g++", "-std=c++17", "-fsyntax-only", "{file}"])),
            env: Vec::new(),
            limits: ResourceLimits::default(),
        });

        registry.insert(LanguageProfile {
            id: "go".into(),
            display_name: "Go".into(),
            file_extension: "go".into(),
            source_file_name: None,
            artifact_name: Some("main".into()),
            compile_command: Some(argv(&["go", "build", "-o", "{exe}", "{file}"])),
            run_command: argv(&["{exe}"]),
            check_command: Some(argv(&["gofmt", "-e", "{file}"])),
            env: vec![
                ("GOCACHE".into(), "{dir}/.gocache".into()),
                ("GOPATH".into(), "{dir}/.go".into()),
                ("GO111MODULE".into(), "auto".into()),
            ],
            limits: ResourceLimits::heavy_compiler(),
        });

        registry.insert(LanguageProfile {
            id: "rust".into(),
            display_name: "Rust".into(),
            file_extension: "rs".into(),
            source_file_name: None,
            artifact_name: Some("main".into()),
            compile_command: Some(argv(&["rustc", "-O", "-o", "{exe}", "{file}"])),
            run_command: argv(&["{exe}"]),
            check_command: None,
            env: Vec::new(),
            limits: ResourceLimits::heavy_compiler(),
        });

        registry.insert(LanguageProfile {
            id: "csharp".into(),
            display_name: "C#".into(),
            file_extension: "cs".into(),
            source_file_name: None,
            artifact_name: Some("main.exe".into()),
            compile_command: Some(argv(&["mcs", "-out:{exe}", "{file}"])),
            run_command: argv(&["mono", "{exe}"]),
            check_command: None,
            env: Vec::new(),
            limits: ResourceLimits::heavy_compiler(),
        });

        registry.insert(LanguageProfile {
            id: "ruby".into(),
            display_name: "Ruby".into(),
            file_extension: "rb".into(),
            source_file_name: None,
            artifact_name: None,
            compile_command: None,
            run_command: argv(&["ruby", "{file}"]),
            check_command: Some(argv(&["ruby", "-c", "{file}"])),
            env: Vec::new(),
            limits: ResourceLimits::interpreted(),
        });

        registry.insert(LanguageProfile {
            id: "php".into(),
            display_name: "PHP".into(),
            file_extension: "php".into(),
            source_file_name: None,
            artifact_name: None,
            compile_command: None,
            run_command: argv(&["php", "{file}"]),
            check_command: Some(argv(&["php", "-l", "{file}"])),
            env: Vec::new(),
            limits: ResourceLimits::interpreted(),
        });

        registry.insert(LanguageProfile {
            id: "shell".into(),
            display_name: "Shell".into(),
            file_extension: "sh".into(),
            source_file_name: None,
            artifact_name: None,
            compile_command: None,
            run_command: argv(&["sh", "{file}"]),
            check_command: Some(argv(&["sh", "-n", "{file}"])),
            env: Vec::new(),
            limits: ResourceLimits::interpreted(),
        });

        registry.insert(LanguageProfile {
            id: "perl".into(),
            display_name: "Perl".into(),
            file_extension: "pl".into(),
            source_file_name: None,
            artifact_name: None,
            compile_command: None,
            run_command: argv(&["perl", "{file}"]),
            check_command: Some(argv(&["perl", "-c", "{file}"])),
            env: Vec::new(),
            limits: ResourceLimits::interpreted(),
        });

        registry.insert(LanguageProfile {
            id: "lua".into(),
            display_name: "Lua".into(),
            file_extension: "lua".into(),
            source_file_name: None,
            artifact_name: None,
            compile_command: None,
            run_command: argv(&["lua", "{file}"]),
            check_command: None,
            env: Vec::new(),
            limits: ResourceLimits::interpreted(),
        });

        registry.insert(LanguageProfile {
            id: "kotlin".into(),
            display_name: "Kotlin".into(),
            file_extension: "kt".into(),
            source_file_name: None,
            artifact_name: Some("main.jar".into()),
            compile_command: Some(argv(&[
                "kotlinc",
                "{file}",
                "-include-runtime",
                "-d",
                "{exe}",
            ])),
            run_command: argv(&["java", "-Xmx256m", "-jar", "{exe}"]),
            check_command: None,
            env: Vec::new(),
            limits: ResourceLimits::heavy_compiler(),
        });

        registry.insert(LanguageProfile {
            id: "swift".into(),
            display_name: "Swift".into(),
            file_extension: "swift".into(),
            source_file_name: None,
            artifact_name: Some("main".into()),
            compile_command: Some(argv(&["swiftc", "-O", "-o", "{exe}", "{file}"])),
            run_command: argv(&["{exe}"]),
            check_command: None,
            env: Vec::new(),
            limits: ResourceLimits::heavy_compiler(),
        });

        for (alias, target) in [
            ("js", "javascript"),
            ("node", "javascript"),
            ("nodejs", "javascript"),
            ("ts", "typescript"),
            ("py", "python"),
            ("python3", "python"),
            ("c++", "cpp"),
            ("c#", "csharp"),
            ("cs", "csharp"),
            ("golang", "go"),
            ("bash", "shell"),
            ("sh", "shell"),
        ] {
            registry.alias(alias, target);
        }

        registry
    }

    /// Register a profile. Later inserts with the same id replace earlier
    /// ones, which is how tests and deployments override builtins.
    pub fn insert(&mut self, profile: LanguageProfile) {
        self.profiles.insert(profile.id.clone(), Arc::new(profile));
    }

    pub fn alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    /// Look up a profile by id or alias, case-insensitively.
    pub fn get(&self, id: &str) -> Option<Arc<LanguageProfile>> {
        let key = id.trim().to_ascii_lowercase();
        let key = self.aliases.get(&key).cloned().unwrap_or(key);
        self.profiles.get(&key).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.profiles.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Short wall limit used for check commands; checks are tool invocations and
/// should never run long.
pub const CHECK_TIME_LIMIT: Duration = Duration::from_secs(10);
