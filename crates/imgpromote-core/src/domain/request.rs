//! Promotion requests, image references and strategies.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Tag grammar accepted by OCI registries.
fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("valid tag regex"))
}

/// Lowercase repository path, e.g. `team/service`.
fn repository_pattern() -> &'static Regex {
    static REPO: OnceLock<Regex> = OnceLock::new();
    REPO.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*$")
            .expect("valid repository regex")
    })
}

/// A fully qualified image reference: `{registry}/{repository}:{tag}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(registry: &str, repository: &str, tag: &str) -> Self {
        Self {
            registry: registry.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// One image to promote from `source_tag` to `destination_tag`.
///
/// Fields are private so a request cannot change after the driver builds it.
/// Construction never fails; [`PromotionRequest::validate`] runs inside the
/// promoter so that bad input still yields a recorded result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRequest {
    image: String,
    source_tag: String,
    destination_tag: String,
    registry: String,
    dry_run: bool,
}

impl PromotionRequest {
    pub fn new(
        image: impl Into<String>,
        source_tag: impl Into<String>,
        destination_tag: impl Into<String>,
        registry: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            image: image.into(),
            source_tag: source_tag.into(),
            destination_tag: destination_tag.into(),
            registry: registry.into(),
            dry_run,
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }

    pub fn destination_tag(&self) -> &str {
        &self.destination_tag
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Check every field and resolve the source and destination references.
    pub fn validate(&self) -> Result<(ImageRef, ImageRef), ValidationError> {
        let registry = non_empty("registry", self.registry.trim().trim_end_matches('/'))?;
        if registry.chars().any(char::is_whitespace) {
            return Err(ValidationError::Malformed {
                field: "registry",
                value: registry.to_string(),
                reason: "must not contain whitespace",
            });
        }

        let image = non_empty("image", &self.image)?;
        if !repository_pattern().is_match(image) {
            return Err(ValidationError::Malformed {
                field: "image",
                value: image.to_string(),
                reason: "must be a lowercase repository path",
            });
        }

        let source = check_tag("source tag", &self.source_tag)?;
        let destination = check_tag("destination tag", &self.destination_tag)?;

        Ok((
            ImageRef::new(registry, image, source),
            ImageRef::new(registry, image, destination),
        ))
    }
}

fn non_empty<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Empty { field })
    } else {
        Ok(trimmed)
    }
}

fn check_tag<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let tag = non_empty(field, value)?;
    if tag_pattern().is_match(tag) {
        Ok(tag)
    } else {
        Err(ValidationError::Malformed {
            field,
            value: tag.to_string(),
            reason: "tags are up to 128 of [A-Za-z0-9_.-] and cannot start with '.' or '-'",
        })
    }
}

/// How source and destination tags are chosen for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromotionStrategy {
    /// `latest` -> `stable`.
    LatestPromote,
    /// Caller supplies both tags.
    CustomTags,
}

impl PromotionStrategy {
    pub const LATEST_TAG: &'static str = "latest";
    pub const STABLE_TAG: &'static str = "stable";

    /// Resolve the `(source, destination)` tag pair for this strategy.
    ///
    /// Custom tags are trimmed but not checked here; an empty tag is carried
    /// into each request and reported as a validation failure per image.
    pub fn resolve_tags(&self, source: Option<&str>, destination: Option<&str>) -> (String, String) {
        match self {
            PromotionStrategy::LatestPromote => {
                (Self::LATEST_TAG.to_string(), Self::STABLE_TAG.to_string())
            }
            PromotionStrategy::CustomTags => (
                source.unwrap_or_default().trim().to_string(),
                destination.unwrap_or_default().trim().to_string(),
            ),
        }
    }

    /// Build one request per image using the resolved tags.
    pub fn requests<I, S>(
        &self,
        images: I,
        source: Option<&str>,
        destination: Option<&str>,
        registry: &str,
        dry_run: bool,
    ) -> Vec<PromotionRequest>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (src, dst) = self.resolve_tags(source, destination);
        images
            .into_iter()
            .map(|image| {
                PromotionRequest::new(image.as_ref().trim(), &src, &dst, registry, dry_run)
            })
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionStrategy::LatestPromote => "latest-promote",
            PromotionStrategy::CustomTags => "custom-tags",
        }
    }
}

impl fmt::Display for PromotionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromotionStrategy {
    type Err = String;

    /// Accepts the kebab-case names and the legacy `LATEST_PROMOTE` /
    /// `CUSTOM_TAGS` spellings used by older job definitions.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "latest-promote" => Ok(PromotionStrategy::LatestPromote),
            "custom-tags" => Ok(PromotionStrategy::CustomTags),
            other => Err(format!(
                "unknown strategy '{}', expected latest-promote or custom-tags",
                other
            )),
        }
    }
}
