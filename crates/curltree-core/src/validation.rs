use crate::{
    CreateProfileRequest, LinkInput, UpdateProfileRequest, MAX_BIO_CHARS, MAX_FULL_NAME_CHARS,
    MAX_HANDLE_CHARS, MAX_LINK_NAME_CHARS, MAX_URL_CHARS,
};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation error on field '{field}': {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn handle_regex() -> &'static Regex {
    static HANDLE: OnceLock<Regex> = OnceLock::new();
    HANDLE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"))
}

fn fingerprint_regex() -> &'static Regex {
    static FINGERPRINT: OnceLock<Regex> = OnceLock::new();
    FINGERPRINT
        .get_or_init(|| Regex::new(r"^[a-z0-9@.-]+:[0-9a-f]{64}$").expect("valid regex"))
}

pub fn sanitize_input(input: &str) -> String {
    input.replace(['\0', '\r'], "").trim().to_string()
}

/// Pattern-only handle check: allowed characters, length bound, and no
/// leading or trailing `-`/`_`.
pub fn handle_is_well_formed(handle: &str) -> bool {
    if handle.is_empty() || handle.chars().count() > MAX_HANDLE_CHARS {
        return false;
    }
    if !handle_regex().is_match(handle) {
        return false;
    }
    let edge = |c: char| c == '-' || c == '_';
    !handle.starts_with(edge) && !handle.ends_with(edge)
}

pub fn validate_full_name(full_name: &str) -> Result<(), String> {
    if full_name.trim().is_empty() {
        return Err("full name cannot be empty".to_string());
    }
    if full_name.chars().count() > MAX_FULL_NAME_CHARS {
        return Err(format!(
            "full name cannot be longer than {MAX_FULL_NAME_CHARS} characters"
        ));
    }
    Ok(())
}

pub fn validate_handle(handle: &str) -> Result<(), String> {
    if handle.is_empty() {
        return Err("handle cannot be empty".to_string());
    }
    if handle.chars().count() > MAX_HANDLE_CHARS {
        return Err(format!(
            "handle cannot be longer than {MAX_HANDLE_CHARS} characters"
        ));
    }
    if !handle_regex().is_match(handle) {
        return Err("handle can only contain letters, numbers, hyphens, and underscores".to_string());
    }
    if !handle_is_well_formed(handle) {
        return Err("handle cannot start or end with hyphens or underscores".to_string());
    }
    Ok(())
}

pub fn validate_bio(bio: &str) -> Result<(), String> {
    if bio.chars().count() > MAX_BIO_CHARS {
        return Err(format!("bio cannot be longer than {MAX_BIO_CHARS} characters"));
    }
    Ok(())
}

pub fn validate_link_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("link name cannot be empty".to_string());
    }
    if name.chars().count() > MAX_LINK_NAME_CHARS {
        return Err(format!(
            "link name cannot be longer than {MAX_LINK_NAME_CHARS} characters"
        ));
    }
    Ok(())
}

pub fn validate_url(raw: &str) -> Result<(), String> {
    if raw.is_empty() {
        return Err("URL cannot be empty".to_string());
    }
    if raw.chars().count() > MAX_URL_CHARS {
        return Err(format!("URL cannot be longer than {MAX_URL_CHARS} characters"));
    }
    let parsed = url::Url::parse(raw).map_err(|err| format!("invalid URL format: {err}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err("URL must start with http:// or https://".to_string());
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err("URL must have a valid host".to_string()),
    }
}

pub fn validate_fingerprint(fingerprint: &str) -> Result<(), String> {
    if fingerprint.is_empty() {
        return Err("fingerprint cannot be empty".to_string());
    }
    if !fingerprint_regex().is_match(fingerprint) {
        return Err("fingerprint must be <algorithm>:<sha256 hex>".to_string());
    }
    Ok(())
}

fn check(field: &str, result: Result<(), String>) -> Result<(), ValidationError> {
    result.map_err(|message| ValidationError::new(field, message))
}

fn sanitize_links(links: &mut [LinkInput]) {
    for link in links.iter_mut() {
        link.name = sanitize_input(&link.name);
        link.url = sanitize_input(&link.url);
    }
}

fn validate_links(links: &[LinkInput]) -> Result<(), ValidationError> {
    for (index, link) in links.iter().enumerate() {
        check(&format!("links[{index}].name"), validate_link_name(&link.name))?;
        check(&format!("links[{index}].url"), validate_url(&link.url))?;
    }
    Ok(())
}

impl CreateProfileRequest {
    pub fn sanitize_and_validate(&mut self) -> Result<(), ValidationError> {
        self.fingerprint = sanitize_input(&self.fingerprint);
        self.full_name = sanitize_input(&self.full_name);
        self.handle = sanitize_input(&self.handle);
        self.bio = sanitize_input(&self.bio);
        sanitize_links(&mut self.links);

        check("fingerprint", validate_fingerprint(&self.fingerprint))?;
        check("full_name", validate_full_name(&self.full_name))?;
        check("handle", validate_handle(&self.handle))?;
        check("bio", validate_bio(&self.bio))?;
        validate_links(&self.links)
    }
}

impl UpdateProfileRequest {
    pub fn sanitize_and_validate(&mut self) -> Result<(), ValidationError> {
        self.full_name = sanitize_input(&self.full_name);
        self.handle = sanitize_input(&self.handle);
        self.bio = sanitize_input(&self.bio);
        sanitize_links(&mut self.links);

        check("full_name", validate_full_name(&self.full_name))?;
        check("handle", validate_handle(&self.handle))?;
        check("bio", validate_bio(&self.bio))?;
        validate_links(&self.links)
    }
}
