//! Rate table files.
//!
//! A rate file is a JSON document listing per-type rates:
//!
//! ```json
//! { "rates": [ { "volume_type": "sbs_5k", "region": "fr-par-1", "rate_per_gib": "0.086" } ] }
//! ```

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;

use super::{CostError, RatePerGib, RateTable};

#[derive(Debug, Deserialize)]
struct RateFile {
    #[serde(default)]
    rates: Vec<RateFileEntry>,
}

#[derive(Debug, Deserialize)]
struct RateFileEntry {
    volume_type: String,
    #[serde(default)]
    region: Option<String>,
    rate_per_gib: String,
}

/// Loads rate entries from `path` into `table`.
///
/// A leading `~/` is expanded to the home directory.
///
/// # Errors
///
/// Returns [`CostError::FileRead`] when the file cannot be read,
/// [`CostError::FileParse`] when it is not valid JSON, and
/// [`CostError::InvalidRate`] when an entry carries a malformed rate.
pub fn load_rate_file(path: &str, table: &mut RateTable) -> Result<(), CostError> {
    let expanded = expand_tilde(path.trim());
    let content = read_to_string_ambient(&expanded).map_err(|message| CostError::FileRead {
        path: expanded.clone(),
        message,
    })?;
    let parsed: RateFile = serde_json::from_str(&content).map_err(|err| CostError::FileParse {
        path: expanded.clone(),
        message: err.to_string(),
    })?;

    for entry in parsed.rates {
        let rate = entry.rate_per_gib.parse::<RatePerGib>()?;
        table.insert(entry.volume_type, entry.region, rate);
    }
    Ok(())
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}
