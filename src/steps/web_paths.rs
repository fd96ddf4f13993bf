use std::collections::BTreeMap;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use serde_json::Value;

use crate::engine::Task;
use crate::error::StepError;
use crate::utils::{as_overhead, read_json, write_if_changed};

/// Manifest listing the modules loadable from the web worker.
pub const WEB_MANIFEST: &str = "remote/web/package.json";
/// Module table location, relative to the output directory.
pub const WEB_PATHS_OUTPUT: &str = "vs/webPackagePaths.js";

const HEADER: &str = "// Generated by kumitate from remote/web/package.json. Do not edit.\n\n";

#[derive(Deserialize)]
struct WebManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct PackageManifest {
    browser: Option<Value>,
    main: Option<String>,
}

/// Writes the table mapping each web dependency to its loadable entry point
/// into `<out_dir>/vs/webPackagePaths.js`.
pub fn build_web_node_paths(out_dir: impl Into<Utf8PathBuf>) -> Task {
    let out_dir = out_dir.into();

    Task::named("build-web-node-paths", move |ctx| {
        let s = Instant::now();
        let root = &ctx.env.root;

        let table = resolve_web_paths(root)?;
        let path = ctx.env.path(&out_dir).join(WEB_PATHS_OUTPUT);

        if write_if_changed(&path, &render(&table)?)? {
            tracing::info!("wrote {} web package paths {}", table.len(), as_overhead(s));
        }

        Ok(())
    })
}

fn resolve_web_paths(root: &Utf8Path) -> Result<BTreeMap<String, String>, StepError> {
    let manifest: WebManifest = read_json(&root.join(WEB_MANIFEST))?;
    let mut table = BTreeMap::new();

    for name in manifest.dependencies.into_keys() {
        let package = root.join("node_modules").join(&name);
        let entry = entry_point(&package, &name)?;
        table.insert(name, entry);
    }

    Ok(table)
}

/// Entry point of one package, relative to its directory and without the
/// file extension.
fn entry_point(package: &Utf8Path, name: &str) -> Result<String, StepError> {
    let manifest: PackageManifest = read_json(&package.join("package.json"))?;

    // Empty strings count as missing.
    let browser = match manifest.browser {
        Some(Value::String(browser)) if !browser.is_empty() => Some(browser),
        _ => None,
    };
    let main = manifest.main.filter(|main| !main.is_empty());

    let entry = match browser.or(main) {
        Some(entry) => entry,
        None => {
            let fallback = format!("dist/{name}.min.js");
            tracing::warn!("{name} has neither 'browser' nor 'main', assuming {fallback}");
            fallback
        }
    };

    let mut entry = entry
        .strip_prefix("./")
        .or_else(|| entry.strip_prefix('/'))
        .unwrap_or(&entry)
        .to_string();

    if let Some(stem) = entry.strip_suffix(".js").filter(|stem| !stem.ends_with(".min")) {
        let minified = format!("{stem}.min.js");
        if package.join(&minified).is_file() {
            entry = minified;
        }
    }

    Ok(entry.strip_suffix(".js").unwrap_or(&entry).to_string())
}

fn render(table: &BTreeMap<String, String>) -> Result<String, StepError> {
    let json = serde_json::to_string_pretty(table)?;
    Ok(format!("{HEADER}self.webPackagePaths = {json};\n"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::Config;
    use crate::core::Environment;
    use crate::engine::run_task;

    fn fixture() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("remote/web")).unwrap();
        (dir, root)
    }

    fn package(root: &Utf8Path, name: &str, manifest: &str, files: &[&str]) {
        let dir = root.join("node_modules").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), manifest).unwrap();
        for file in files {
            let path = dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
    }

    #[test]
    fn test_entry_point_selection() {
        let (_dir, root) = fixture();
        package(&root, "browser-first", r#"{ "browser": "./lib/web.js", "main": "lib/node.js" }"#, &[]);
        package(&root, "browser-map", r#"{ "browser": { "fs": false }, "main": "/index.js" }"#, &[]);
        package(&root, "prefers-min", r#"{ "main": "out/lib.js" }"#, &["out/lib.min.js"]);
        package(&root, "already-min", r#"{ "main": "out/lib.min.js" }"#, &[]);
        package(&root, "bare", r#"{ "name": "bare" }"#, &[]);
        package(&root, "empty-browser", r#"{ "browser": "", "main": "main.js" }"#, &[]);
        package(&root, "empty-both", r#"{ "browser": "", "main": "" }"#, &[]);

        let entry = |name: &str| entry_point(&root.join("node_modules").join(name), name).unwrap();

        assert_eq!(entry("browser-first"), "lib/web");
        assert_eq!(entry("browser-map"), "index");
        assert_eq!(entry("prefers-min"), "out/lib.min");
        assert_eq!(entry("already-min"), "out/lib.min");
        assert_eq!(entry("bare"), "dist/bare.min");
        assert_eq!(entry("empty-browser"), "main");
        assert_eq!(entry("empty-both"), "dist/empty-both.min");
    }

    #[test]
    fn test_writes_sorted_table() {
        let (_dir, root) = fixture();
        fs::write(
            root.join(WEB_MANIFEST),
            r#"{ "dependencies": { "zlib-web": "1.0.0", "@xterm/xterm": "5.0.0" } }"#,
        )
        .unwrap();
        package(&root, "zlib-web", r#"{ "main": "index.js" }"#, &[]);
        package(&root, "@xterm/xterm", r#"{ "main": "lib/xterm.js" }"#, &[]);

        let env = Environment::new(&root, Config::default());
        let task = build_web_node_paths("out-build");
        run_task(&task, &env).unwrap();

        let out = fs::read_to_string(root.join("out-build").join(WEB_PATHS_OUTPUT)).unwrap();
        assert!(out.starts_with(HEADER));
        assert!(out.ends_with(
            "self.webPackagePaths = {\n  \"@xterm/xterm\": \"lib/xterm\",\n  \"zlib-web\": \"index\"\n};\n"
        ));

        run_task(&task, &env).unwrap();
        let again = fs::read_to_string(root.join("out-build").join(WEB_PATHS_OUTPUT)).unwrap();
        assert_eq!(out, again);
    }

    #[test]
    fn test_missing_inputs_fail() {
        let (_dir, root) = fixture();
        let env = Environment::new(&root, Config::default());
        let task = build_web_node_paths("out-build");

        assert!(run_task(&task, &env).is_err());

        fs::write(root.join(WEB_MANIFEST), r#"{ "dependencies": { "gone": "1.0.0" } }"#).unwrap();
        let err = run_task(&task, &env).unwrap_err();
        let crate::RunError::Failed { source, .. } = err else {
            panic!("expected a task failure");
        };
        assert!(matches!(
            source.downcast_ref::<StepError>(),
            Some(StepError::Config(_))
        ));
    }
}
