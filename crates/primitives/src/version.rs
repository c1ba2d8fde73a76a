use std::fmt;

use serde::{Deserialize, Serialize};

/// Version stamp assigned by the editing host on every edit of a logical document.
///
/// Ordering is the freshness order: a larger version is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostVersion(i32);

impl HostVersion {
	/// Version of a document that has not been edited yet.
	pub const INITIAL: Self = Self(0);

	/// Wraps a raw host version.
	pub const fn new(version: i32) -> Self {
		Self(version)
	}

	/// Returns the raw version number.
	pub const fn get(self) -> i32 {
		self.0
	}

	/// Returns the version following this one.
	#[must_use]
	pub const fn next(self) -> Self {
		Self(self.0.wrapping_add(1))
	}
}

impl From<i32> for HostVersion {
	fn from(version: i32) -> Self {
		Self(version)
	}
}

impl fmt::Display for HostVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "v{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn versions_order_by_freshness() {
		let v4 = HostVersion::new(4);
		let v5 = v4.next();

		assert!(v5 > v4);
		assert_eq!(v5.get(), 5);
		assert_eq!(v5.to_string(), "v5");
	}

	#[test]
	fn serializes_as_bare_integer() {
		let json = serde_json::to_string(&HostVersion::new(7)).unwrap();
		assert_eq!(json, "7");
		let back: HostVersion = serde_json::from_str("7").unwrap();
		assert_eq!(back, HostVersion::new(7));
	}
}
