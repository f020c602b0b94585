//! Loads watchlist profiles from a directory of TOML files at startup
//! and on an explicit `reload_profiles` control call.
//!
//! A single malformed file never aborts the load: it is logged and
//! skipped, and loading continues with the remaining files in the
//! directory.

use std::path::Path;

use gatewatch_core::WatchlistProfile;
use tracing::{error, warn};

/// Outcome of one directory scan: the profiles that parsed and validated,
/// plus the names of files that didn't.
#[derive(Debug, Default)]
pub struct ProfileLoadReport {
    pub profiles: Vec<WatchlistProfile>,
    pub rejected: Vec<String>,
}

/// Read every `*.toml` file directly under `dir`, parse it as a
/// [`WatchlistProfile`], and keep only the ones that validate.
///
/// Missing directory is treated as zero profiles rather than an error: a
/// fresh instance with no watchlists configured yet is a valid, if inert,
/// state.
pub fn load_profiles(dir: &Path) -> ProfileLoadReport {
    let mut report = ProfileLoadReport::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "profiles directory unreadable, starting with zero profiles");
            return report;
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    for path in paths {
        let name = path.display().to_string();
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<WatchlistProfile>(&contents) {
                Ok(profile) => match profile.validate() {
                    Ok(()) => report.profiles.push(profile),
                    Err(err) => {
                        error!(file = %name, error = %err, "profile failed validation, skipping");
                        report.rejected.push(name);
                    }
                },
                Err(err) => {
                    error!(file = %name, error = %err, "profile file is not valid TOML, skipping");
                    report.rejected.push(name);
                }
            },
            Err(err) => {
                error!(file = %name, error = %err, "could not read profile file, skipping");
                report.rejected.push(name);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_profile(dir: &Path, name: &str, contents: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_valid_profiles_and_skips_invalid_ones() {
        let tmp = tempfile::tempdir().unwrap();
        write_profile(
            tmp.path(),
            "alpha.toml",
            r#"
                schema_version = 2
                name = "alpha"
                display_name = "Alpha"
                webhook_url = "https://example.com/hook"
            "#,
        );
        write_profile(tmp.path(), "broken.toml", "not valid toml {{{");
        write_profile(
            tmp.path(),
            "wrong_version.toml",
            r#"
                schema_version = 1
                name = "beta"
                display_name = "Beta"
                webhook_url = "https://example.com/hook"
            "#,
        );
        write_profile(tmp.path(), "ignored.txt", "irrelevant");

        let report = load_profiles(tmp.path());
        assert_eq!(report.profiles.len(), 1);
        assert_eq!(report.profiles[0].name, "alpha");
        assert_eq!(report.rejected.len(), 2);
    }

    #[test]
    fn missing_directory_yields_zero_profiles() {
        let report = load_profiles(Path::new("/nonexistent/path/for/gatewatch/tests"));
        assert!(report.profiles.is_empty());
        assert!(report.rejected.is_empty());
    }
}
