//! Public URLs for stored derivatives.

use crate::config::PhotoConfig;
use crate::derivatives::ScaleLevel;
use crate::imaging::ImageType;
use crate::store::ResourceId;

/// Turns stored identities into URLs.
pub trait UrlResolver: Sync {
    /// `.../photo/<resource>-<scale>.<ext>`
    fn photo_url(&self, resource_id: &ResourceId, scale: ScaleLevel, image_type: ImageType)
    -> String;

    /// HTML page showing the photo in its owner's album.
    fn page_url(&self, nickname: &str, resource_id: &ResourceId) -> String;

    /// Placeholder avatar of the given edge length.
    fn default_avatar_url(&self, size: u32) -> String;
}

/// Resolves everything under one site base URL.
#[derive(Debug, Clone)]
pub struct BaseUrlResolver {
    base: String,
}

impl BaseUrlResolver {
    /// Trailing slashes on `base` are dropped.
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Resolver for `[urls] base_url`.
    pub fn from_config(config: &PhotoConfig) -> Self {
        Self::new(config.urls.base_url.trim())
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl UrlResolver for BaseUrlResolver {
    fn photo_url(
        &self,
        resource_id: &ResourceId,
        scale: ScaleLevel,
        image_type: ImageType,
    ) -> String {
        format!(
            "{}/photo/{resource_id}-{}.{}",
            self.base,
            scale.0,
            image_type.extension()
        )
    }

    fn page_url(&self, nickname: &str, resource_id: &ResourceId) -> String {
        format!("{}/photos/{nickname}/image/{resource_id}", self.base)
    }

    fn default_avatar_url(&self, size: u32) -> String {
        format!("{}/images/person-{size}.jpg", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_url_layout() {
        let urls = BaseUrlResolver::new("https://example.net/");
        let rid = ResourceId::from("f00d");
        assert_eq!(
            urls.photo_url(&rid, ScaleLevel::MEDIUM, ImageType::Png),
            "https://example.net/photo/f00d-1.png"
        );
        assert_eq!(
            urls.photo_url(&rid, ScaleLevel::AVATAR_SMALL, ImageType::Jpeg),
            "https://example.net/photo/f00d-6.jpg"
        );
    }

    #[test]
    fn from_config_uses_base_url() {
        let config = crate::config::parse_config(
            "[urls]\nbase_url = \"https://social.example/\"\n",
        )
        .unwrap();
        let urls = BaseUrlResolver::from_config(&config);
        assert_eq!(urls.base(), "https://social.example");
        assert_eq!(
            urls.default_avatar_url(48),
            "https://social.example/images/person-48.jpg"
        );

        let defaults = BaseUrlResolver::from_config(&PhotoConfig::default());
        assert_eq!(defaults.base(), "http://localhost");
    }

    #[test]
    fn page_and_default_avatar() {
        let urls = BaseUrlResolver::new("https://example.net");
        assert_eq!(
            urls.page_url("alice", &ResourceId::from("f00d")),
            "https://example.net/photos/alice/image/f00d"
        );
        assert_eq!(
            urls.default_avatar_url(80),
            "https://example.net/images/person-80.jpg"
        );
    }
}
