//! Target version resolution

use semver::Version;
use tracing::debug;

use crate::errors::AgentError;
use crate::http::api::DeviceApi;

/// Parse a backend version string.
///
/// Accepts an OS name prefix (`balenaOS 2.3.0`), a leading `v`, and versions
/// missing components or carrying a dotted suffix (`2.3`, `2.88.4.prod`).
pub fn parse_version(raw: &str) -> Option<Version> {
    let token = raw.split_whitespace().last()?;
    let token = token.strip_prefix('v').unwrap_or(token);

    if let Ok(version) = Version::parse(token) {
        return Some(version);
    }

    let core_end = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(token.len());
    let mut parts = token[..core_end]
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().ok());

    let major = parts.next()??;
    let minor = parts.next().unwrap_or(Some(0))?;
    let patch = parts.next().unwrap_or(Some(0))?;
    Some(Version::new(major, minor, patch))
}

/// Whether `candidate` is strictly newer than `current`.
///
/// Unparseable versions never compare as newer.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (parse_version(candidate), parse_version(current)) {
        (Some(candidate), Some(current)) => candidate > current,
        _ => false,
    }
}

/// Whether a device at `current` has reached `target`
pub fn has_reached(current: &str, target: &str) -> bool {
    match (parse_version(current), parse_version(target)) {
        (Some(current), Some(target)) => current >= target,
        _ => false,
    }
}

/// Pick the version to update to.
///
/// Without a pinned version this is the backend's recommendation. With one,
/// it is the first supported version containing the pinned string, which
/// tolerates variant suffixes such as `+rev1`. `Ok(None)` means there is
/// nothing to update to.
pub async fn resolve_target<A>(
    api: &A,
    device_type: &str,
    current_version: &str,
    pinned_version: Option<&str>,
) -> Result<Option<String>, AgentError>
where
    A: DeviceApi + ?Sized,
{
    let supported = api
        .get_supported_os_update_versions(device_type, current_version)
        .await?;

    let pinned = pinned_version.map(str::trim).filter(|v| !v.is_empty());
    let target = match pinned {
        None => supported.recommended,
        Some(pinned) => supported
            .versions
            .into_iter()
            .find(|version| version.contains(pinned)),
    };

    debug!(
        "Resolved target {:?} for {} at {} (pinned: {:?})",
        target, device_type, current_version, pinned
    );
    Ok(target)
}
