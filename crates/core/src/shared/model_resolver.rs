use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

const APP_DIR: &str = "Mask Watch";
const READ_BUFFER_SIZE: usize = 256 * 1024;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("no cache directory available on this platform")]
    NoCacheDir,
    #[error("model {name} not found (looked in {searched:?}) and no download URL was given")]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("fetching {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ModelResolveError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Called as `(bytes_so_far, content_length)` while a model downloads.
/// `content_length` is 0 when the server does not send one.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Finds `name` locally or fetches it from `url`.
///
/// Looks in the user cache first, then in `bundled_dir`. A download always
/// lands in the cache so later runs find it there.
pub fn resolve(
    name: &str,
    url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_from(&model_cache_dir()?, name, url, bundled_dir, progress)
}

fn resolve_from(
    cache_dir: &Path,
    name: &str,
    url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let searched = candidates(cache_dir, name, bundled_dir);
    if let Some(found) = searched.iter().find(|p| p.is_file()) {
        log::debug!("Using model {}", found.display());
        return Ok(found.clone());
    }

    let Some(url) = url else {
        return Err(ModelResolveError::NotFound {
            name: name.to_string(),
            searched,
        });
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::io(cache_dir))?;
    let target = cache_dir.join(name);
    log::info!("Downloading {name} from {url}");
    fetch(url, &target, progress.as_deref())?;
    Ok(target)
}

fn candidates(cache_dir: &Path, name: &str, bundled_dir: Option<&Path>) -> Vec<PathBuf> {
    std::iter::once(cache_dir)
        .chain(bundled_dir)
        .map(|dir| dir.join(name))
        .collect()
}

/// Where downloaded models are kept.
///
/// macOS uses Application Support, every other platform the user cache dir,
/// each under `Mask Watch/models`.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|dir| dir.join(APP_DIR).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Streams `url` into `<target>.part` and renames it into place once complete.
fn fetch(
    url: &str,
    target: &Path,
    progress: Option<&(dyn Fn(u64, u64) + Send)>,
) -> Result<(), ModelResolveError> {
    let http_err = |source| ModelResolveError::Http {
        url: url.to_string(),
        source,
    };
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(http_err)?;
    let content_length = response.content_length().unwrap_or(0);

    let partial = target.with_extension("part");
    let result = copy_body(&mut response, &partial, content_length, progress);
    if result.is_err() {
        let _ = fs::remove_file(&partial);
        return result;
    }

    fs::rename(&partial, target).map_err(ModelResolveError::io(target))
}

fn copy_body(
    body: &mut impl Read,
    partial: &Path,
    content_length: u64,
    progress: Option<&(dyn Fn(u64, u64) + Send)>,
) -> Result<(), ModelResolveError> {
    let mut out = BufWriter::new(File::create(partial).map_err(ModelResolveError::io(partial))?);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut received = 0u64;

    loop {
        let n = body.read(&mut buf).map_err(ModelResolveError::io(partial))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])
            .map_err(ModelResolveError::io(partial))?;
        received += n as u64;
        if let Some(report) = progress {
            report(received, content_length);
        }
    }

    out.flush().map_err(ModelResolveError::io(partial))
}
