//! The domain boundary: pattern types and the calibration algorithm trait.

use std::fmt;

use cvbridge_types::{Mat, Point2f, Point3f, Size, TaskError};
use image::GrayImage;

/// Calibration board layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternType {
    /// Black and white squares; corners are the inner square corners.
    Chessboard,
    /// Symmetric grid of circles.
    CirclesGrid,
    /// Grid of circles with every other row shifted by half a pitch.
    AsymmetricCirclesGrid,
}

impl PatternType {
    /// Host labels, in the order call sites accept them.
    pub const LABELS: &'static [(&'static str, PatternType)] = &[
        ("CHESSBOARD", PatternType::Chessboard),
        ("CIRCLES_GRID", PatternType::CirclesGrid),
        ("ACIRCLES_GRID", PatternType::AsymmetricCirclesGrid),
    ];

    /// The host label for this pattern.
    pub fn label(self) -> &'static str {
        match self {
            Self::Chessboard => "CHESSBOARD",
            Self::CirclesGrid => "CIRCLES_GRID",
            Self::AsymmetricCirclesGrid => "ACIRCLES_GRID",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Estimated camera intrinsics.
#[derive(Debug, Clone, PartialEq)]
pub struct Intrinsics {
    /// 3x3 camera matrix.
    pub camera_matrix: Mat,
    /// Distortion coefficients, one row.
    pub dist_coeffs: Mat,
}

/// Pattern detection and intrinsic estimation.
///
/// Implementations run on native worker threads, possibly several calls at
/// once, and must never block on the host runtime.
pub trait CalibrationAlgorithm: Send + Sync {
    /// Locate the board's corners in `image`, row-major. `None` when the
    /// full pattern is not visible.
    fn detect_corners(
        &self,
        image: &GrayImage,
        board_size: Size,
        pattern: PatternType,
    ) -> Option<Vec<Point2f>>;

    /// Estimate intrinsics from per-view corner lists. `None` when the
    /// estimate does not converge.
    fn calibrate(
        &self,
        image_points: &[Vec<Point2f>],
        image_size: Size,
        board_size: Size,
        pattern: PatternType,
    ) -> Option<Intrinsics>;
}

/// Ideal object-space points of a board with unit pitch `square`, in the
/// same row-major order detection reports corners.
pub fn board_points(board_size: Size, pattern: PatternType, square: f32) -> Vec<Point3f> {
    let mut points = Vec::with_capacity(board_size.area());
    for i in 0..board_size.height.max(0) {
        for j in 0..board_size.width.max(0) {
            let (row, col) = (i as f32, j as f32);
            let x = match pattern {
                PatternType::AsymmetricCirclesGrid => (2 * j + i % 2) as f32 * square,
                PatternType::Chessboard | PatternType::CirclesGrid => col * square,
            };
            points.push(Point3f::new(x, row * square, 0.0));
        }
    }
    points
}

/// Decode an encoded image (any format the `image` features enable) to
/// 8-bit grayscale.
pub(crate) fn decode_grayscale(bytes: &[u8]) -> Result<GrayImage, TaskError> {
    match image::load_from_memory(bytes) {
        Ok(decoded) => Ok(decoded.to_luma8()),
        Err(err) => {
            tracing::debug!(len = bytes.len(), error = %err, "image decode failed");
            Err(TaskError::domain("Cannot decode input image"))
        }
    }
}

/// Pixel dimensions of a decoded image as a [`Size`].
pub(crate) fn image_size(image: &GrayImage) -> Size {
    let (w, h) = image.dimensions();
    Size::new(w as i32, h as i32)
}
