//! Validation rules for project configuration values.

use super::ConfigError;

pub const PROJECT_NAME_LEN: std::ops::RangeInclusive<usize> = 4..=16;
pub const BUCKET_NAME_LEN: std::ops::RangeInclusive<usize> = 4..=36;
pub const LINK_EXPIRY_HOURS: std::ops::RangeInclusive<u32> = 1..=7 * 24;

/// Regions accepted for the storage bucket.
pub const REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ap-east-1",
    "ap-south-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "me-south-1",
    "sa-east-1",
    "us-gov-west-1",
    "us-gov-east-1",
    "cn-north-1",
    "cn-northwest-1",
];

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn lowercase_letters(
    field: &'static str,
    value: &str,
    len: std::ops::RangeInclusive<usize>,
) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(invalid(field, "cannot be empty"));
    }
    if !len.contains(&value.len()) {
        return Err(invalid(
            field,
            format!(
                "must be between {} and {} characters long, got {}",
                len.start(),
                len.end(),
                value.len()
            ),
        ));
    }
    if let Some(c) = value.chars().find(|c| !c.is_ascii_lowercase()) {
        return Err(invalid(
            field,
            format!("must only contain lowercase letters, got '{c}'"),
        ));
    }
    Ok(())
}

pub fn project_name(name: &str) -> Result<(), ConfigError> {
    lowercase_letters("name", name, PROJECT_NAME_LEN)
}

pub fn bucket_name(bucket: &str) -> Result<(), ConfigError> {
    lowercase_letters("storage.bucket", bucket, BUCKET_NAME_LEN)
}

pub fn region(region: &str) -> Result<(), ConfigError> {
    if REGIONS.contains(&region) {
        Ok(())
    } else {
        Err(invalid("storage.region", format!("unknown region '{region}'")))
    }
}

pub fn link_expiry_hours(hours: u32) -> Result<(), ConfigError> {
    if LINK_EXPIRY_HOURS.contains(&hours) {
        Ok(())
    } else {
        Err(invalid(
            "storage.link_expiry_hours",
            format!(
                "must be between {} and {} hours, got {hours}",
                LINK_EXPIRY_HOURS.start(),
                LINK_EXPIRY_HOURS.end()
            ),
        ))
    }
}

/// `host[:port]`, no scheme.
pub fn storage_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    const FIELD: &str = "storage.endpoint";
    if endpoint.trim().is_empty() {
        return Err(invalid(FIELD, "cannot be empty"));
    }
    if endpoint.contains("://") {
        return Err(invalid(FIELD, "must not contain a scheme"));
    }
    match reqwest::Url::parse(&format!("http://{endpoint}")) {
        Ok(url) if url.host_str().is_some() && url.path() == "/" => Ok(()),
        _ => Err(invalid(FIELD, format!("'{endpoint}' is not a host[:port]"))),
    }
}

/// Absolute `http` or `https` URL.
pub fn shortener_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    const FIELD: &str = "shortener.endpoint";
    if endpoint.trim().is_empty() {
        return Err(invalid(FIELD, "cannot be empty"));
    }
    let url = reqwest::Url::parse(endpoint).map_err(|e| invalid(FIELD, e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        "http" | "https" => Err(invalid(FIELD, "missing host")),
        other => Err(invalid(FIELD, format!("unsupported scheme '{other}'"))),
    }
}
