//! Tasks behind the calibration call sites.

use std::sync::Arc;

use bytes::Bytes;
use cvbridge_types::{Point2f, Size, Task, TaskError, TaskResult, Value};

use crate::algorithm::{self, CalibrationAlgorithm, Intrinsics, PatternType};

/// Finds a calibration pattern in one encoded image.
pub struct DetectPatternTask {
    algorithm: Arc<dyn CalibrationAlgorithm>,
    image: Bytes,
    board_size: Size,
    pattern: PatternType,
}

impl DetectPatternTask {
    /// `image` holds the encoded bytes, already copied out of the host.
    pub fn new(
        algorithm: Arc<dyn CalibrationAlgorithm>,
        image: Bytes,
        board_size: Size,
        pattern: PatternType,
    ) -> Self {
        Self {
            algorithm,
            image,
            board_size,
            pattern,
        }
    }
}

/// Outcome of [`DetectPatternTask`].
#[derive(Debug, Clone, PartialEq)]
pub struct PatternDetection {
    /// Detected corners, or `None` when the pattern was not found.
    pub corners: Option<Vec<Point2f>>,
}

impl TaskResult for PatternDetection {
    fn build_result(self) -> Value {
        let builder = Value::object().set("patternFound", self.corners.is_some());
        match self.corners {
            Some(corners) => builder.set("corners", corners).build(),
            None => builder.build(),
        }
    }
}

impl Task for DetectPatternTask {
    const NAME: &'static str = "detect_pattern";
    type Output = PatternDetection;

    fn run_native(&mut self) -> Result<PatternDetection, TaskError> {
        let frame = algorithm::decode_grayscale(&self.image)?;
        let corners = self
            .algorithm
            .detect_corners(&frame, self.board_size, self.pattern);
        tracing::debug!(
            pattern = %self.pattern,
            found = corners.is_some(),
            "pattern detection finished"
        );
        Ok(PatternDetection { corners })
    }
}

/// Where calibration views come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationInput {
    /// Encoded image files on disk; the pattern is detected in each.
    ImageFiles(Vec<String>),
    /// Corners already detected, one list per view.
    GridCorners {
        /// Per-view corner lists.
        corners: Vec<Vec<Point2f>>,
        /// Pixel size of the images the corners came from.
        image_size: Size,
    },
}

/// Estimates camera intrinsics from several views of a board.
pub struct ComputeIntrinsicParametersTask {
    algorithm: Arc<dyn CalibrationAlgorithm>,
    input: CalibrationInput,
    board_size: Size,
    pattern: PatternType,
}

impl ComputeIntrinsicParametersTask {
    /// Calibrate from `input` for a board of `board_size` inner corners.
    pub fn new(
        algorithm: Arc<dyn CalibrationAlgorithm>,
        input: CalibrationInput,
        board_size: Size,
        pattern: PatternType,
    ) -> Self {
        Self {
            algorithm,
            input,
            board_size,
            pattern,
        }
    }

    /// Read, decode and detect in every file. Files without a visible
    /// pattern are skipped.
    fn detect_in_files(&self, files: &[String]) -> Result<(Vec<Vec<Point2f>>, Size), TaskError> {
        let mut views = Vec::with_capacity(files.len());
        let mut size: Option<Size> = None;

        for path in files {
            let bytes = std::fs::read(path).map_err(|err| {
                tracing::debug!(path = %path, error = %err, "image file unreadable");
                TaskError::domain(format!("Cannot read image file \"{path}\""))
            })?;
            let frame = algorithm::decode_grayscale(&bytes)
                .map_err(|_| TaskError::domain(format!("Cannot decode image file \"{path}\"")))?;

            let frame_size = algorithm::image_size(&frame);
            match size {
                None => size = Some(frame_size),
                Some(expected) if expected != frame_size => {
                    return Err(TaskError::domain(format!(
                        "Image file \"{path}\" is {}x{}, expected {}x{}",
                        frame_size.width, frame_size.height, expected.width, expected.height
                    )));
                }
                Some(_) => {}
            }

            match self
                .algorithm
                .detect_corners(&frame, self.board_size, self.pattern)
            {
                Some(corners) => views.push(corners),
                None => tracing::debug!(path = %path, "pattern not found; view skipped"),
            }
        }

        Ok((views, size.unwrap_or_default()))
    }

    fn check_views(&self, views: &[Vec<Point2f>]) -> Result<(), TaskError> {
        let expected = self.board_size.area();
        for (i, view) in views.iter().enumerate() {
            if view.len() != expected {
                return Err(TaskError::domain(format!(
                    "View {i} has {} corners, expected {expected}",
                    view.len()
                )));
            }
        }
        Ok(())
    }

    fn calibrate(&self, views: &[Vec<Point2f>], image_size: Size) -> Result<Intrinsics, TaskError> {
        if views.is_empty() {
            tracing::debug!("no usable views");
            return Err(TaskError::domain("Calibration failed"));
        }
        self.algorithm
            .calibrate(views, image_size, self.board_size, self.pattern)
            .ok_or_else(|| TaskError::domain("Calibration failed"))
    }
}

/// Outcome of [`ComputeIntrinsicParametersTask`].
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration(pub Intrinsics);

impl TaskResult for Calibration {
    fn build_result(self) -> Value {
        Value::object()
            .set("intrinsic", self.0.camera_matrix)
            .set("distCoeffs", self.0.dist_coeffs)
            .build()
    }
}

impl Task for ComputeIntrinsicParametersTask {
    const NAME: &'static str = "compute_intrinsic_parameters";
    type Output = Calibration;

    fn run_native(&mut self) -> Result<Calibration, TaskError> {
        let intrinsics = match &self.input {
            CalibrationInput::ImageFiles(files) if !files.is_empty() => {
                let (views, image_size) = self.detect_in_files(files)?;
                self.calibrate(&views, image_size)?
            }
            CalibrationInput::GridCorners {
                corners,
                image_size,
            } if !corners.is_empty() => {
                self.check_views(corners)?;
                self.calibrate(corners, *image_size)?
            }
            _ => {
                return Err(TaskError::domain(
                    "Neither image files nor grid corners were passed",
                ));
            }
        };
        Ok(Calibration(intrinsics))
    }
}
