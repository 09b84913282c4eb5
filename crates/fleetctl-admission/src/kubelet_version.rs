//! Minimal `major.minor.patch` parsing and comparison for kubelet versions
//! (spec.md 4.J: "kubelet-version against a configured semver constraint").
//! fleetctl only ever compares kubelet releases against each other, never
//! arbitrary semver (pre-release tags, build metadata), so a small
//! dedicated parser stands in for a full semver implementation.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KubeletVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug, thiserror::Error)]
#[error("{0:?} is not a valid major.minor.patch kubelet version")]
pub struct ParseKubeletVersionError(String);

impl std::str::FromStr for KubeletVersion {
    type Err = ParseKubeletVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('v').unwrap_or(s);
        let mut parts = trimmed.split('.');
        let (Some(major), Some(minor)) = (parts.next(), parts.next()) else {
            return Err(ParseKubeletVersionError(s.to_string()));
        };
        let patch = parts.next().unwrap_or("0");
        if parts.next().is_some() {
            return Err(ParseKubeletVersionError(s.to_string()));
        }
        let parse = |v: &str| v.parse::<u32>().map_err(|_| ParseKubeletVersionError(s.to_string()));
        Ok(KubeletVersion {
            major: parse(major)?,
            minor: parse(minor)?,
            patch: parse(patch)?,
        })
    }
}

/// An inclusive `[min, max]` range a configured deployment restricts
/// kubelet versions to.
#[derive(Debug, Clone, Copy)]
pub struct KubeletVersionConstraint {
    pub min: KubeletVersion,
    pub max: KubeletVersion,
}

impl KubeletVersionConstraint {
    pub fn is_satisfied_by(&self, version: KubeletVersion) -> bool {
        matches!(version.cmp(&self.min), Ordering::Greater | Ordering::Equal)
            && matches!(version.cmp(&self.max), Ordering::Less | Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_component_version() {
        let v: KubeletVersion = "1.28.3".parse().unwrap();
        assert_eq!(v, KubeletVersion { major: 1, minor: 28, patch: 3 });
    }

    #[test]
    fn defaults_missing_patch_to_zero() {
        let v: KubeletVersion = "1.24".parse().unwrap();
        assert_eq!(v.patch, 0);
    }

    #[test]
    fn strips_leading_v() {
        let v: KubeletVersion = "v1.24.0".parse().unwrap();
        assert_eq!(v.major, 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-a-version".parse::<KubeletVersion>().is_err());
    }

    #[test]
    fn ordering_compares_components_in_order() {
        let older: KubeletVersion = "1.23.9".parse().unwrap();
        let newer: KubeletVersion = "1.24.0".parse().unwrap();
        assert!(older < newer);
    }

    #[test]
    fn constraint_rejects_versions_outside_the_range() {
        let constraint = KubeletVersionConstraint {
            min: "1.24.0".parse().unwrap(),
            max: "1.30.0".parse().unwrap(),
        };
        assert!(!constraint.is_satisfied_by("1.23.9".parse().unwrap()));
        assert!(constraint.is_satisfied_by("1.28.0".parse().unwrap()));
        assert!(!constraint.is_satisfied_by("1.31.0".parse().unwrap()));
    }
}
