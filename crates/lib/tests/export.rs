//! End-to-end exports from throwaway repositories.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use relbuild_lib::vcs::Exporter;
use tempfile::TempDir;
use walkdir::WalkDir;

fn git(dir: &Path, args: &[&str]) {
  let output = Command::new("git")
    .args(["-c", "user.name=relbuild", "-c", "user.email=relbuild@example.com"])
    .args(["-c", "init.defaultBranch=main", "-c", "core.autocrlf=false"])
    .args(args)
    .current_dir(dir)
    .output()
    .unwrap();
  assert!(
    output.status.success(),
    "git {:?} failed: {}",
    args,
    String::from_utf8_lossy(&output.stderr)
  );
}

fn write(dir: &Path, relative: &str, content: &str) {
  let path = dir.join(relative);
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, content).unwrap();
}

fn commit_all(dir: &Path) {
  git(dir, &["init", "-q"]);
  git(dir, &["add", "-A"]);
  git(dir, &["commit", "-q", "-m", "initial"]);
}

/// Relative path to content for every file below `dir`.
fn snapshot(dir: &Path) -> BTreeMap<String, String> {
  WalkDir::new(dir)
    .into_iter()
    .map(|e| e.unwrap())
    .filter(|e| e.file_type().is_file())
    .map(|e| {
      let relative = e.path().strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/");
      (relative, std::fs::read_to_string(e.path()).unwrap())
    })
    .collect()
}

/// Repository with a top-level file, a plain directory, and a directory
/// holding a nested repository.
fn fixture(root: &Path) {
  let nested = root.join("Dependencies").join("katex");
  write(&nested, "katex.js", "render();\n");
  write(&nested, "fonts/main.woff", "font");
  commit_all(&nested);
  write(&nested, "build.log", "untracked in nested");

  write(root, "Copying.txt", "license\n");
  write(root, "Models/Example.hmf", "<model/>\n");
  write(root, "Models/Sub/Other.hmf", "<other/>\n");
  write(root, "Dependencies/readme.txt", "deps\n");
  write(root, ".gitignore", "*.tmp\n");
  commit_all(root);

  write(root, "Models/untracked.hmf", "not committed");
  write(root, "Models/cache.tmp", "ignored");
}

async fn export_release_set(repo: &Path, dest: &Path) {
  let exporter = Exporter::default();
  for src in ["Copying.txt", "Models", "Dependencies"] {
    exporter.export(src, dest, Some(repo)).await.unwrap();
  }
}

#[tokio::test]
async fn exports_file_directory_and_nested_repository() {
  let temp = TempDir::new().unwrap();
  let repo = temp.path().join("hopsan");
  let dest = temp.path().join("dest");
  std::fs::create_dir_all(&dest).unwrap();
  fixture(&repo);

  export_release_set(&repo, &dest).await;

  let top: Vec<String> = std::fs::read_dir(&dest)
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect::<std::collections::BTreeSet<_>>()
    .into_iter()
    .collect();
  assert_eq!(top, ["Copying.txt", "Dependencies", "Models"]);

  let files = snapshot(&dest);
  let expected: BTreeMap<String, String> = [
    ("Copying.txt", "license\n"),
    ("Dependencies/katex/fonts/main.woff", "font"),
    ("Dependencies/katex/katex.js", "render();\n"),
    ("Dependencies/readme.txt", "deps\n"),
    ("Models/Example.hmf", "<model/>\n"),
    ("Models/Sub/Other.hmf", "<other/>\n"),
  ]
  .into_iter()
  .map(|(k, v)| (k.to_string(), v.to_string()))
  .collect();
  assert_eq!(files, expected);
}

#[tokio::test]
async fn path_inside_nested_repository_mirrors_layout() {
  let temp = TempDir::new().unwrap();
  let repo = temp.path().join("hopsan");
  let dest = temp.path().join("dest");
  std::fs::create_dir_all(&dest).unwrap();
  fixture(&repo);

  let report = Exporter::default()
    .export("Dependencies/katex/fonts", &dest, Some(&repo))
    .await
    .unwrap();

  assert_eq!(report.archives, 1);
  assert_eq!(report.target, dest.join("fonts"));
  assert_eq!(std::fs::read_to_string(dest.join("fonts").join("main.woff")).unwrap(), "font");
}

#[tokio::test]
async fn exporting_twice_gives_identical_trees() {
  let temp = TempDir::new().unwrap();
  let repo = temp.path().join("hopsan");
  let first = temp.path().join("first");
  let second = temp.path().join("second");
  std::fs::create_dir_all(&first).unwrap();
  std::fs::create_dir_all(&second).unwrap();
  fixture(&repo);

  export_release_set(&repo, &first).await;
  export_release_set(&repo, &second).await;

  assert_eq!(snapshot(&first), snapshot(&second));
}

#[tokio::test]
async fn missing_source_is_an_error() {
  let temp = TempDir::new().unwrap();
  let repo = temp.path().join("hopsan");
  fixture(&repo);

  let result = Exporter::default().export("NoSuchDir", temp.path(), Some(&repo)).await;
  assert!(result.is_err());
}
