//! Host OS release API client

use openapi_client::models::{ODataResponse, ReleaseRecord};
use tracing::debug;

use crate::errors::AgentError;
use crate::hup::version::parse_version;
use crate::http::client::HttpClient;
use crate::http::devices::odata_escape;
use crate::models::device::SupportedOsVersions;

impl HttpClient {
    /// Fetch published host OS releases for a device type and keep the ones
    /// a device at `current_version` can update to
    pub async fn fetch_supported_os_update_versions(
        &self,
        device_type: &str,
        current_version: &str,
    ) -> Result<SupportedOsVersions, AgentError> {
        let filter = format!(
            "status eq 'success' and is_invalidated eq false and \
             belongs_to__application/any(a:a/is_host eq true and \
             a/is_for__device_type/any(dt:dt/slug eq '{}'))",
            odata_escape(device_type)
        );
        let url = self.api_url(
            "/v6/release",
            &[("$select", "raw_version,is_final"), ("$filter", filter.as_str())],
        )?;

        let response: ODataResponse<ReleaseRecord> = self.get(url).await?;
        debug!(
            "{} host OS releases published for {}",
            response.d.len(),
            device_type
        );

        let available = response
            .d
            .into_iter()
            .filter(|release| release.is_final.unwrap_or(true))
            .map(|release| release.raw_version);

        Ok(supported_update_versions(current_version, available))
    }
}

/// Versions strictly newer than `current`, newest first.
///
/// The recommendation is the newest version without a pre-release tag.
pub fn supported_update_versions<I>(current: &str, available: I) -> SupportedOsVersions
where
    I: IntoIterator<Item = String>,
{
    let current_parsed = parse_version(current);

    let mut candidates: Vec<(semver::Version, String)> = available
        .into_iter()
        .filter_map(|raw| parse_version(&raw).map(|parsed| (parsed, raw)))
        .filter(|(parsed, _)| match &current_parsed {
            Some(current) => parsed > current,
            None => false,
        })
        .collect();

    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    candidates.dedup_by(|a, b| a.0 == b.0);

    let recommended = candidates
        .iter()
        .find(|(parsed, _)| parsed.pre.is_empty())
        .map(|(_, raw)| raw.clone());

    SupportedOsVersions {
        recommended,
        versions: candidates.into_iter().map(|(_, raw)| raw).collect(),
        current: current.to_string(),
    }
}
