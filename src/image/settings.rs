//! Image model catalog and generation settings

use serde::{Deserialize, Serialize};

/// Model selected for a fresh session
pub const DEFAULT_IMAGE_MODEL: &str = "Flux-1 Schnell";

/// Style applied when a request does not name one
pub const DEFAULT_STYLE: &str = "photorealistic";

pub const MIN_STEPS: u32 = 10;
pub const MAX_STEPS: u32 = 50;
pub const DEFAULT_STEPS: u32 = 20;

const DEFAULT_SIZE: &str = "1024x1024";

/// Image model definition
#[derive(Debug, Clone, Copy)]
pub struct ImageModelDef {
    pub name: &'static str,
    pub id: &'static str,
}

/// All image models, in display order
pub fn all_image_models() -> &'static [ImageModelDef] {
    &[
        ImageModelDef {
            name: "Stable Diffusion XL Base",
            id: "@cf/stabilityai/stable-diffusion-xl-base-1.0",
        },
        ImageModelDef {
            name: "Stable Diffusion XL Lightning",
            id: "@cf/bytedance/stable-diffusion-xl-lightning",
        },
        ImageModelDef {
            name: "Flux-1 Schnell",
            id: "@cf/black-forest-labs/flux-1-schnell",
        },
        ImageModelDef {
            name: "Phoenix-1.0",
            id: "@cf/leonardo/phoenix-1.0",
        },
        ImageModelDef {
            name: "Lucid-Origin",
            id: "@cf/leonardo/lucid-origin",
        },
        ImageModelDef {
            name: "Dreamshaper-8-LCM",
            id: "@cf/lykon/dreamshaper-8-lcm",
        },
    ]
}

pub fn image_model_id(name: &str) -> Option<&'static str> {
    all_image_models()
        .iter()
        .find(|m| m.name == name)
        .map(|m| m.id)
}

#[derive(Debug, Clone, Copy)]
pub struct ImageStyleDef {
    pub name: &'static str,
    pub label: &'static str,
}

pub fn all_image_styles() -> &'static [ImageStyleDef] {
    &[
        ImageStyleDef {
            name: "photorealistic",
            label: "Photorealistic",
        },
        ImageStyleDef {
            name: "anime",
            label: "Anime",
        },
        ImageStyleDef {
            name: "digital-art",
            label: "Digital Art",
        },
        ImageStyleDef {
            name: "oil-painting",
            label: "Oil Painting",
        },
        ImageStyleDef {
            name: "watercolor",
            label: "Watercolor",
        },
        ImageStyleDef {
            name: "sketch",
            label: "Sketch",
        },
    ]
}

#[derive(Debug, Clone, Copy)]
pub struct ImageSizeDef {
    /// `"{width}x{height}"`
    pub value: &'static str,
    pub label: &'static str,
}

pub fn all_image_sizes() -> &'static [ImageSizeDef] {
    &[
        ImageSizeDef {
            value: "1024x1024",
            label: "Square",
        },
        ImageSizeDef {
            value: "1024x768",
            label: "Landscape",
        },
        ImageSizeDef {
            value: "768x1024",
            label: "Portrait",
        },
    ]
}

/// Output dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    /// Parse `"{width}x{height}"`
    pub fn parse(value: &str) -> Option<Self> {
        let (width, height) = value.split_once('x')?;
        Some(Self {
            width: width.trim().parse().ok()?,
            height: height.trim().parse().ok()?,
        })
    }
}

/// User-adjustable generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSettings {
    model: String,
    style: String,
    size: String,
    steps: u32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_IMAGE_MODEL.to_string(),
            style: DEFAULT_STYLE.to_string(),
            size: DEFAULT_SIZE.to_string(),
            steps: DEFAULT_STEPS,
        }
    }
}

impl ImageSettings {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::parse(&self.size).unwrap_or(ImageSize {
            width: 1024,
            height: 1024,
        })
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Returns false for names outside the catalog
    pub fn set_model(&mut self, name: &str) -> bool {
        if image_model_id(name).is_none() {
            return false;
        }
        self.model = name.to_string();
        true
    }

    pub fn set_style(&mut self, name: &str) -> bool {
        if !all_image_styles().iter().any(|s| s.name == name) {
            return false;
        }
        self.style = name.to_string();
        true
    }

    pub fn set_size(&mut self, value: &str) -> bool {
        if !all_image_sizes().iter().any(|s| s.value == value) {
            return false;
        }
        self.size = value.to_string();
        true
    }

    /// Clamped to `MIN_STEPS..=MAX_STEPS`
    pub fn set_steps(&mut self, steps: u32) {
        self.steps = steps.clamp(MIN_STEPS, MAX_STEPS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ImageSettings::default();
        assert_eq!(settings.model(), "Flux-1 Schnell");
        assert_eq!(settings.style(), "photorealistic");
        assert_eq!(
            settings.size(),
            ImageSize {
                width: 1024,
                height: 1024
            }
        );
        assert_eq!(settings.steps(), 20);
        assert!(image_model_id(settings.model()).is_some());
    }

    #[test]
    fn test_setters_validate() {
        let mut settings = ImageSettings::default();
        assert!(settings.set_size("768x1024"));
        assert_eq!(settings.size().width, 768);
        assert!(!settings.set_size("10x10"));
        assert!(settings.set_style("watercolor"));
        assert!(!settings.set_style("cubism"));
        assert_eq!(settings.style(), "watercolor");
        assert!(!settings.set_model("Midjourney"));
        assert!(settings.set_model("Lucid-Origin"));
    }

    #[test]
    fn test_steps_clamped() {
        let mut settings = ImageSettings::default();
        settings.set_steps(3);
        assert_eq!(settings.steps(), MIN_STEPS);
        settings.set_steps(500);
        assert_eq!(settings.steps(), MAX_STEPS);
        settings.set_steps(33);
        assert_eq!(settings.steps(), 33);
    }

    #[test]
    fn test_size_parse() {
        assert_eq!(
            ImageSize::parse("1024x768"),
            Some(ImageSize {
                width: 1024,
                height: 768
            })
        );
        assert_eq!(ImageSize::parse("square"), None);
    }
}
