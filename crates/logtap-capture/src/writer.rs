use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CaptureError, Result};

/// Suffix appended to the real name while the capture is in flight.
const TEMP_SUFFIX: &str = ".tmp";

/// Streams captured bytes to a temp file and publishes atomically.
///
/// On creation both the real name and `<real>.tmp` are newly created
/// files: the real name is an empty reservation that keeps a concurrent
/// writer from picking the same pair, and all content goes to the temp
/// file. `finish()` renames the temp file over the reservation, so the
/// real name is only ever observed with complete content. A writer
/// dropped without `finish()` either publishes anyway or removes both
/// files, depending on its `auto_finish` flag.
pub struct AtomicFileWriter {
    real_path: PathBuf,
    temp_path: PathBuf,
    temp: Option<BufWriter<File>>,
    auto_finish: bool,
    finished: bool,
}

impl AtomicFileWriter {
    /// Create a writer for `base`, resolving name collisions.
    ///
    /// `base` is tried first; while either `base` or `base.tmp` already
    /// exists, a `(k)` suffix is inserted before the extension:
    /// `a.txt` → `a(1).txt` → `a(2).txt` …
    pub fn create(base: impl AsRef<Path>, auto_finish: bool) -> Result<Self> {
        let base = base.as_ref();
        let (real_path, temp_path, temp) = reserve_pair(base)?;
        info!(real = ?real_path, temp = ?temp_path, "capture file created");
        Ok(Self {
            real_path,
            temp_path,
            temp: Some(temp),
            auto_finish,
            finished: false,
        })
    }

    /// Append bytes to the in-flight temp file.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let temp = self.temp.as_mut().ok_or(CaptureError::Finished)?;
        temp.write_all(bytes)?;
        Ok(())
    }

    /// Publish the temp file under the real name.
    ///
    /// Idempotent: the first call closes both streams, syncs the temp
    /// file, and renames it over the reservation; later calls are
    /// no-ops.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if let Some(mut temp) = self.temp.take() {
            temp.flush()?;
            temp.get_ref().sync_all()?;
        }
        std::fs::rename(&self.temp_path, &self.real_path).map_err(|e| CaptureError::Publish {
            path: self.real_path.clone(),
            source: e,
        })?;
        self.finished = true;
        info!(path = ?self.real_path, "capture file published");
        Ok(())
    }

    /// The name the finished file will be visible under.
    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    /// The in-flight temp file name.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// True once `finish()` has succeeded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for AtomicFileWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.auto_finish {
            if let Err(err) = self.finish() {
                warn!(%err, path = ?self.real_path, "auto-finish failed on drop");
            }
        } else {
            // Close the stream before unlinking.
            self.temp = None;
            let _ = std::fs::remove_file(&self.temp_path);
            let _ = std::fs::remove_file(&self.real_path);
            debug!(real = ?self.real_path, "abandoned capture removed");
        }
    }
}

fn reserve_pair(base: &Path) -> Result<(PathBuf, PathBuf, BufWriter<File>)> {
    let (stem, ext) = split_base(base);
    for k in 0..u32::MAX {
        let real_path = candidate(base, &stem, &ext, k);
        // create_new makes the existence check and the reservation one
        // atomic step; losing a race reads as AlreadyExists.
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&real_path)
        {
            Ok(reservation) => drop(reservation),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(CaptureError::Create {
                    path: real_path,
                    source: err,
                })
            }
        }

        let mut temp_name = real_path.clone().into_os_string();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(file) => return Ok((real_path, temp_path, BufWriter::new(file))),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                // Stale temp from an interrupted run; release the
                // reservation and try the next suffix.
                let _ = std::fs::remove_file(&real_path);
            }
            Err(err) => {
                let _ = std::fs::remove_file(&real_path);
                return Err(CaptureError::Create {
                    path: temp_path,
                    source: err,
                });
            }
        }
    }
    Err(CaptureError::Create {
        path: base.to_path_buf(),
        source: std::io::Error::new(ErrorKind::AlreadyExists, "no free capture file name"),
    })
}

/// Split a base file name into stem and extension at the last `.`;
/// no dot means an empty extension.
fn split_base(base: &Path) -> (String, String) {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.rfind('.') {
        Some(idx) if idx > 0 => (name[..idx].to_string(), name[idx..].to_string()),
        _ => (name, String::new()),
    }
}

fn candidate(base: &Path, stem: &str, ext: &str, k: u32) -> PathBuf {
    let name = if k == 0 {
        format!("{stem}{ext}")
    } else {
        format!("{stem}({k}){ext}")
    };
    base.with_file_name(name)
}
