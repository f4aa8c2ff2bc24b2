//! Image generation
//!
//! Text-to-image requests against Workers AI, the user-adjustable settings
//! that shape them, and the history of generated images.

mod client;
mod settings;
mod workflow;

pub use client::{CloudflareImageClient, ImageClient, ImageRequest, ImageResponse};
pub use settings::{
    all_image_models, all_image_sizes, all_image_styles, image_model_id, ImageModelDef,
    ImageSettings, ImageSize, ImageSizeDef, ImageStyleDef, DEFAULT_IMAGE_MODEL, DEFAULT_STEPS,
    DEFAULT_STYLE, MAX_STEPS, MIN_STEPS,
};
pub use workflow::{decode_image_response, GeneratedImage, ImageGenerator, DATA_URI_PREFIX};
