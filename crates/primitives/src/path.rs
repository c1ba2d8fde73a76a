use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether file identity ignores case on the host platform.
const CASE_INSENSITIVE: bool = cfg!(any(windows, target_os = "macos"));

/// File path with a normalized comparison key.
///
/// Separators are normalized to `/` and, on case-insensitive platforms, the key
/// is lowercased. Equality, ordering and hashing use the key; [`FilePath::as_str`]
/// keeps the spelling the path was created with.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FilePath {
	display: String,
	key: String,
}

impl FilePath {
	/// Creates a normalized file path.
	pub fn new(path: impl AsRef<str>) -> Self {
		let display = path.as_ref().replace('\\', "/");
		let key = if CASE_INSENSITIVE { display.to_lowercase() } else { display.clone() };
		Self { display, key }
	}

	/// Creates a file path from a filesystem path.
	pub fn from_path(path: &Path) -> Self {
		Self::new(path.to_string_lossy())
	}

	/// Returns the path as originally spelled (with `/` separators).
	pub fn as_str(&self) -> &str {
		&self.display
	}

	/// Returns the comparison key.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Returns the path as a filesystem path.
	pub fn to_path_buf(&self) -> PathBuf {
		PathBuf::from(&self.display)
	}
}

impl PartialEq for FilePath {
	fn eq(&self, other: &Self) -> bool {
		self.key == other.key
	}
}

impl Eq for FilePath {}

impl PartialOrd for FilePath {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for FilePath {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.key.cmp(&other.key)
	}
}

impl Hash for FilePath {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key.hash(state);
	}
}

impl fmt::Debug for FilePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "FilePath({:?})", self.display)
	}
}

impl fmt::Display for FilePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.display)
	}
}

impl From<&str> for FilePath {
	fn from(path: &str) -> Self {
		Self::new(path)
	}
}

impl From<String> for FilePath {
	fn from(path: String) -> Self {
		Self::new(path)
	}
}

impl From<FilePath> for String {
	fn from(path: FilePath) -> Self {
		path.display
	}
}

/// Identity of an owning project (its project file path).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectKey(FilePath);

impl ProjectKey {
	/// Creates a project key from its project file path.
	pub fn new(project_file: impl AsRef<str>) -> Self {
		Self(FilePath::new(project_file))
	}

	/// Returns the project file path.
	pub fn path(&self) -> &FilePath {
		&self.0
	}
}

impl fmt::Display for ProjectKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl From<&str> for ProjectKey {
	fn from(project_file: &str) -> Self {
		Self::new(project_file)
	}
}

/// Identity of a logical document: owning project plus file path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey {
	/// Owning project.
	pub project: ProjectKey,
	/// Document file path.
	pub path: FilePath,
}

impl DocumentKey {
	/// Creates a document key.
	pub fn new(project: impl Into<ProjectKey>, path: impl Into<FilePath>) -> Self {
		Self {
			project: project.into(),
			path: path.into(),
		}
	}
}

impl fmt::Display for DocumentKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} [{}]", self.path, self.project)
	}
}

/// Converts an LSP URI to a file path.
///
/// Returns `None` if the URI is not a `file://` URI.
pub fn path_from_uri(uri: &lsp_types::Uri) -> Option<FilePath> {
	let url = url::Url::from_str(uri.as_str()).ok()?;
	let path = url.to_file_path().ok()?;
	Some(FilePath::from_path(&path))
}

/// Converts an absolute file path to an LSP URI.
pub fn uri_from_path(path: &FilePath) -> Option<lsp_types::Uri> {
	let url = url::Url::from_file_path(path.to_path_buf()).ok()?;
	lsp_types::Uri::from_str(url.as_str()).ok()
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	#[test]
	fn separators_are_normalized() {
		let a = FilePath::new(r"C:\proj\Pages\Index.razor");
		assert_eq!(a.as_str(), "C:/proj/Pages/Index.razor");
		assert_eq!(a, FilePath::new("C:/proj/Pages/Index.razor"));
	}

	#[test]
	fn case_sensitivity_follows_platform() {
		let upper = FilePath::new("/proj/Index.razor");
		let lower = FilePath::new("/proj/index.razor");
		assert_eq!(upper == lower, CASE_INSENSITIVE);
		assert_eq!(upper.as_str(), "/proj/Index.razor");
	}

	#[test]
	fn document_keys_distinguish_projects() {
		let mut keys = HashSet::new();
		keys.insert(DocumentKey::new("/a/a.csproj", "/shared/x.razor"));
		keys.insert(DocumentKey::new("/b/b.csproj", "/shared/x.razor"));
		keys.insert(DocumentKey::new("/a/a.csproj", "/shared/x.razor"));
		assert_eq!(keys.len(), 2);
	}

	#[cfg(unix)]
	#[test]
	fn uri_round_trip() {
		let uri: lsp_types::Uri = "file:///proj/Pages/Index.razor".parse().unwrap();
		let path = path_from_uri(&uri).unwrap();
		assert_eq!(path.as_str(), "/proj/Pages/Index.razor");
		assert_eq!(uri_from_path(&path).unwrap().as_str(), uri.as_str());
	}

	#[test]
	fn non_file_uri_has_no_path() {
		let uri: lsp_types::Uri = "untitled:Untitled-1".parse().unwrap();
		assert!(path_from_uri(&uri).is_none());
	}
}
