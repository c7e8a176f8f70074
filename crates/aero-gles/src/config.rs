use crate::staging::DEFAULT_STAGING_CAPACITY;

/// Tunables for a [`crate::GlContext`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Size in bytes of the dynamic vertex ring every draw is streamed through.
    pub staging_capacity: usize,
    /// Reported as `GL_MAX_TEXTURE_SIZE`; larger `tex_image_2d` uploads are ignored.
    pub max_texture_size: u32,
    /// Colour attachments bound at once for a framebuffer object.
    pub max_color_attachments: usize,
    /// Log every native creation at `debug` level.
    pub validation: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            staging_capacity: DEFAULT_STAGING_CAPACITY,
            max_texture_size: 4096,
            max_color_attachments: 8,
            validation: false,
        }
    }
}
