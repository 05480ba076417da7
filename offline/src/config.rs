//! Runtime configuration for the offline store.
//!
//! Every value has a compiled-in default and can be overridden with an
//! environment variable:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `EXAM_OFFLINE_DATA_DIR` | platform data dir (`directories`), else `./data` |
//! | `EXAM_OFFLINE_TOPIC_CACHE_TTL_SECS` | `3600` |
//! | `EXAM_OFFLINE_NUMERIC_TOLERANCE` | `0.01` |

use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

const DATA_DIR_VAR: &str = "EXAM_OFFLINE_DATA_DIR";
const TTL_VAR: &str = "EXAM_OFFLINE_TOPIC_CACHE_TTL_SECS";
const TOLERANCE_VAR: &str = "EXAM_OFFLINE_NUMERIC_TOLERANCE";

const DEV_DATA_DIR: &str = "./data";
const DATABASE_FILE: &str = "offline.db";
const TOPIC_CACHE_DIR: &str = "topic_cache";

/// Get the data directory for persistence.
///
/// Priority:
/// 1. `EXAM_OFFLINE_DATA_DIR` if set
/// 2. the platform data directory for this application
/// 3. `./data` as fallback
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_VAR) {
        return PathBuf::from(dir);
    }

    if let Some(dirs) = ProjectDirs::from("dev", "exam", "exam-offline") {
        return dirs.data_dir().to_path_buf();
    }

    PathBuf::from(DEV_DATA_DIR)
}

pub fn get_database_path() -> PathBuf {
    database_path_in(&get_data_dir())
}

pub fn get_topic_cache_dir() -> PathBuf {
    topic_cache_dir_in(&get_data_dir())
}

pub fn database_path_in(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(DATABASE_FILE)
}

pub fn topic_cache_dir_in(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(TOPIC_CACHE_DIR)
}

/// Topic cache TTL. Unparsable values fall back to one hour.
pub fn get_topic_cache_ttl() -> Duration {
    parse_ttl(std::env::var(TTL_VAR).ok().as_deref())
}

/// Absolute tolerance for numerical answers. Unparsable or negative values
/// fall back to the default.
pub fn get_numeric_tolerance() -> f64 {
    parse_tolerance(std::env::var(TOLERANCE_VAR).ok().as_deref())
}

fn parse_ttl(raw: Option<&str>) -> Duration {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(crate::topic_cache::DEFAULT_TOPIC_CACHE_TTL)
}

fn parse_tolerance(raw: Option<&str>) -> f64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t >= 0.0)
        .unwrap_or(exam_model::DEFAULT_NUMERIC_TOLERANCE)
}
