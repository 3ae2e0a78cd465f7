//! Zip archive of the staging tree.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::PackageError;
use crate::util::fs::last_component;

/// Compress `dir` into `zip_path`.
///
/// Entries are rooted at the directory's own name (`Hopsan-2.8.0-win64/bin/...`)
/// with forward slashes, as a user unpacking the archive expects. Returns the
/// number of files written.
pub fn zip_directory(dir: &Path, zip_path: &Path) -> Result<usize, PackageError> {
  info!(dir = %dir.display(), zip = %zip_path.display(), "compressing directory");

  let base = last_component(dir)
    .map(|n| n.to_string_lossy().into_owned())
    .ok_or_else(|| PackageError::NotADirectory(dir.to_path_buf()))?;
  if !dir.is_dir() {
    return Err(PackageError::NotADirectory(dir.to_path_buf()));
  }

  let file = File::create(zip_path).map_err(|e| PackageError::Io {
    path: zip_path.to_path_buf(),
    source: e,
  })?;
  let mut zip = ZipWriter::new(BufWriter::new(file));
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

  let mut files = 0;
  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(|e| PackageError::Walk {
      path: dir.to_path_buf(),
      source: e,
    })?;

    let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
    let mut name = base.clone();
    for component in relative.components() {
      name.push('/');
      name.push_str(&component.as_os_str().to_string_lossy());
    }

    if entry.file_type().is_dir() {
      zip.add_directory(name, options)?;
      continue;
    }

    debug!(entry = %name, "adding to archive");
    zip.start_file(name, options)?;
    let mut src = File::open(entry.path()).map_err(|e| PackageError::Io {
      path: entry.path().to_path_buf(),
      source: e,
    })?;
    io::copy(&mut src, &mut zip).map_err(|e| PackageError::Io {
      path: entry.path().to_path_buf(),
      source: e,
    })?;
    files += 1;
  }

  zip.finish()?;
  Ok(files)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write;
  use std::io::Read;
  use tempfile::TempDir;
  use zip::ZipArchive;

  #[test]
  fn entries_are_rooted_at_directory_name() {
    let temp = TempDir::new().unwrap();
    let staging = temp.path().join("Hopsan-2.8.0-win64");
    write(&staging, "bin/HopsanGUI.exe", "gui");
    write(&staging, "Models/Example Models/pump.hmf", "model");
    let zip_path = temp.path().join("out.zip");

    let files = zip_directory(&staging, &zip_path).unwrap();
    assert_eq!(files, 2);

    let mut archive = ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
    let names: Vec<String> = archive.file_names().map(String::from).collect();
    assert!(names.contains(&"Hopsan-2.8.0-win64/bin/HopsanGUI.exe".to_string()));
    assert!(names.contains(&"Hopsan-2.8.0-win64/Models/Example Models/pump.hmf".to_string()));
    assert!(names.iter().all(|n| !n.contains('\\')));

    let mut content = String::new();
    archive
      .by_name("Hopsan-2.8.0-win64/bin/HopsanGUI.exe")
      .unwrap()
      .read_to_string(&mut content)
      .unwrap();
    assert_eq!(content, "gui");
  }

  #[test]
  fn missing_directory_is_rejected() {
    let temp = TempDir::new().unwrap();
    let result = zip_directory(&temp.path().join("nope"), &temp.path().join("out.zip"));
    assert!(matches!(result, Err(PackageError::NotADirectory(_))));
  }
}
