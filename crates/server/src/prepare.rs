//! `leasehold prepare`: lay out an application directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

const DIRECTORIES: &[&str] = &[
    "www",
    "www/controllers",
    "www/views",
    "www/public",
    "www/public/js",
    "www/public/css",
    "cron",
];

const EMPTY_FILES: &[&str] = &["www/public/js/app.js", "www/public/css/app.css"];

const ENV_TEMPLATE: &str = "\
# leasehold settings
PORT=3000
HTTP_LOGGING=true
STORE_BACKEND=redis
REDIS_URL=redis://127.0.0.1:6379
CRON_PREFIX=crin
HTTP_CACHING_ENABLED=true
# ENV2RES=APP_NAME,APP_VERSION
";

const HELLOWORLD_VIEW: &str = "\
<!doctype html>
<html>
  <head>
    <title>Hello world</title>
    <link rel=\"stylesheet\" href=\"/css/app.css\">
  </head>
  <body>
    <h1>Hello world</h1>
    <p>Rendered at {{ now }}</p>
    <script src=\"/js/app.js\"></script>
  </body>
</html>
";

const TEMPLATES: &[(&str, &str)] = &[(".env", ENV_TEMPLATE), ("www/views/helloworld.html", HELLOWORLD_VIEW)];

/// Create whatever is missing under `base`. Existing files are never touched.
///
/// Returns the paths that were created.
pub fn prepare(base: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut created = Vec::new();

    for dir in DIRECTORIES {
        let path = base.join(dir);
        if !path.exists() {
            info!("Creating dir {}", dir);
            fs::create_dir_all(&path).with_context(|| format!("creating {}", path.display()))?;
            created.push(path);
        }
    }

    for file in EMPTY_FILES {
        let path = base.join(file);
        if !path.exists() {
            info!("Creating file {}", file);
            fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            created.push(path);
        }
    }

    for (file, contents) in TEMPLATES {
        let path = base.join(file);
        if !path.exists() {
            info!("Writing {}", file);
            fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
            created.push(path);
        }
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_the_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let created = prepare(dir.path()).unwrap();
        assert_eq!(created.len(), DIRECTORIES.len() + EMPTY_FILES.len() + TEMPLATES.len());

        for d in DIRECTORIES {
            assert!(dir.path().join(d).is_dir(), "{} missing", d);
        }
        assert_eq!(fs::read_to_string(dir.path().join("www/public/js/app.js")).unwrap(), "");
        let view = fs::read_to_string(dir.path().join("www/views/helloworld.html")).unwrap();
        assert!(view.contains("{{ now }}"));
        assert!(fs::read_to_string(dir.path().join(".env")).unwrap().contains("PORT=3000"));
    }

    #[test]
    fn is_idempotent_and_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "PORT=8080\n").unwrap();

        let first = prepare(dir.path()).unwrap();
        assert!(!first.contains(&dir.path().join(".env")));
        assert_eq!(fs::read_to_string(dir.path().join(".env")).unwrap(), "PORT=8080\n");

        fs::write(dir.path().join("www/public/css/app.css"), "body{}").unwrap();
        assert!(prepare(dir.path()).unwrap().is_empty());
        assert_eq!(fs::read_to_string(dir.path().join("www/public/css/app.css")).unwrap(), "body{}");
    }
}
