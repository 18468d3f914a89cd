use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model file not found: {0}")]
    MissingExplicit(PathBuf),
    #[error("model {0} not found locally and no download URL configured")]
    NotFound(String),
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for one model file.
#[derive(Default)]
pub struct ModelSource<'a> {
    pub name: &'a str,
    pub explicit_path: Option<&'a Path>,
    pub bundled_dir: Option<&'a Path>,
    pub url: Option<&'a str>,
}

/// Resolve a model file, checking local locations before downloading.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. User cache directory (platform-specific)
/// 3. Bundled directory
/// 4. Download from URL to cache, when a URL is configured
pub fn resolve(
    source: &ModelSource<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = source.explicit_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ModelResolveError::MissingExplicit(path.to_path_buf()));
    }

    let cache_dir = model_cache_dir()?;
    resolve_in(source, &cache_dir, progress)
}

fn resolve_in(
    source: &ModelSource<'_>,
    cache_dir: &Path,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(source.name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = source.bundled_dir {
        let bundled_path = dir.join(source.name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(url) = source.url else {
        return Err(ModelResolveError::NotFound(source.name.to_string()));
    };
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Headwatch/models/`
/// - Linux: `$XDG_CACHE_HOME/Headwatch/models/` or `~/.cache/Headwatch/models/`
/// - Windows: `%LOCALAPPDATA%/Headwatch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    // Clean up .part file on any error
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_is_returned_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("face.onnx");
        fs::write(&model, b"onnx").unwrap();

        let source = ModelSource {
            name: "ignored.onnx",
            explicit_path: Some(&model),
            ..Default::default()
        };
        assert_eq!(resolve(&source, None).unwrap(), model);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let source = ModelSource {
            name: "face.onnx",
            explicit_path: Some(Path::new("/nonexistent/face.onnx")),
            ..Default::default()
        };
        assert!(matches!(
            resolve(&source, None),
            Err(ModelResolveError::MissingExplicit(_))
        ));
    }

    #[test]
    fn test_cached_model_wins_over_bundled() {
        let cache = tempfile::tempdir().unwrap();
        let bundled = tempfile::tempdir().unwrap();
        fs::write(cache.path().join("pose.onnx"), b"cached").unwrap();
        fs::write(bundled.path().join("pose.onnx"), b"bundled").unwrap();

        let source = ModelSource {
            name: "pose.onnx",
            bundled_dir: Some(bundled.path()),
            ..Default::default()
        };
        let resolved = resolve_in(&source, cache.path(), None).unwrap();
        assert_eq!(resolved, cache.path().join("pose.onnx"));
    }

    #[test]
    fn test_bundled_model_used_when_cache_empty() {
        let cache = tempfile::tempdir().unwrap();
        let bundled = tempfile::tempdir().unwrap();
        fs::write(bundled.path().join("pose.onnx"), b"bundled").unwrap();

        let source = ModelSource {
            name: "pose.onnx",
            bundled_dir: Some(bundled.path()),
            ..Default::default()
        };
        let resolved = resolve_in(&source, cache.path(), None).unwrap();
        assert_eq!(resolved, bundled.path().join("pose.onnx"));
    }

    #[test]
    fn test_not_found_without_url() {
        let cache = tempfile::tempdir().unwrap();
        let source = ModelSource {
            name: "face.onnx",
            ..Default::default()
        };
        assert!(matches!(
            resolve_in(&source, cache.path(), None),
            Err(ModelResolveError::NotFound(name)) if name == "face.onnx"
        ));
    }

    #[test]
    fn test_model_cache_dir_ends_with_models() {
        if let Ok(dir) = model_cache_dir() {
            assert!(dir.ends_with(Path::new(APP_DIR_NAME).join("models")));
        }
    }
}
