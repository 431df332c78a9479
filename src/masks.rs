//! Mask input handling.
//!
//! Mask annotations reach the upload payload in one of two wire shapes:
//! a hosted instance URI plus an RGB color, or inline PNG bytes. Which
//! one the encoder emits is decided by the configured [`MaskMethod`];
//! 2-D array inputs are rasterized to the PNG shape through the
//! [`MaskRasterizer`] collaborator (image codecs themselves are outside
//! this crate).

use serde::{Deserialize, Serialize};

use crate::error::FlatlabelError;

/// How mask annotation values are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaskMethod {
    /// Values carry a hosted mask URL and a color triple.
    #[default]
    Url,
    /// Values carry a binary 2-D array, rasterized to PNG on encode.
    Array,
    /// Values already carry a PNG payload.
    Png,
}

impl MaskMethod {
    pub fn token(&self) -> &'static str {
        match self {
            MaskMethod::Url => "url",
            MaskMethod::Array => "array",
            MaskMethod::Png => "png",
        }
    }
}

/// A mask value as it appears in a tabular cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskSource {
    Url {
        instance_uri: String,
        color_rgb: [u8; 3],
    },
    /// Row-major binary mask, one `Vec<u8>` per row.
    Array(Vec<Vec<u8>>),
    /// Pre-rendered PNG payload string.
    Png(String),
}

impl MaskSource {
    fn kind(&self) -> &'static str {
        match self {
            MaskSource::Url { .. } => "url",
            MaskSource::Array(_) => "array",
            MaskSource::Png(_) => "png",
        }
    }
}

/// A mask narrowed to one of the two wire shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedMask {
    Url {
        instance_uri: String,
        color_rgb: [u8; 3],
    },
    Png(String),
}

/// Renders a binary 2-D mask array into the PNG payload string the
/// upload API accepts. Implemented by an image-codec collaborator.
pub trait MaskRasterizer {
    fn rasterize(&self, rows: &[Vec<u8>]) -> Result<String, FlatlabelError>;
}

/// Narrows a mask source to a wire shape under the configured method.
///
/// The source must agree with the method; a url-method encoder handed an
/// array source is a configuration error, not something to coerce.
pub fn resolve_mask(
    source: &MaskSource,
    method: MaskMethod,
    rasterizer: Option<&dyn MaskRasterizer>,
) -> Result<ResolvedMask, FlatlabelError> {
    match (method, source) {
        (MaskMethod::Url, MaskSource::Url { instance_uri, color_rgb }) => Ok(ResolvedMask::Url {
            instance_uri: instance_uri.clone(),
            color_rgb: *color_rgb,
        }),
        (MaskMethod::Png, MaskSource::Png(png)) => Ok(ResolvedMask::Png(png.clone())),
        (MaskMethod::Array, MaskSource::Array(rows)) => {
            let rasterizer = rasterizer.ok_or(FlatlabelError::MissingRasterizer)?;
            Ok(ResolvedMask::Png(rasterizer.rasterize(rows)?))
        }
        (method, source) => Err(FlatlabelError::MaskMethodMismatch {
            method: method.token(),
            found: source.kind(),
        }),
    }
}
