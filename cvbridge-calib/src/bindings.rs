//! Host-facing call sites.

use std::fmt;
use std::sync::Arc;

use cvbridge_dispatch::Dispatcher;
use cvbridge_types::{
    ArrayOf, BindingError, BindingSpec, Buffer, Callback, Function, Overloads, Point2f, Size,
    StringEnum, Typed, Value,
};

use crate::algorithm::{CalibrationAlgorithm, PatternType};
use crate::tasks::{CalibrationInput, ComputeIntrinsicParametersTask, DetectPatternTask};

type DetectParams = (Buffer, Typed<Size>, StringEnum<PatternType>, Callback);

/// A bound `calibrateCamera` call, by form.
enum CalibrateCall {
    Files {
        files: Vec<String>,
        board_size: Size,
        pattern: PatternType,
        callback: Function,
    },
    Corners {
        corners: Vec<Vec<Point2f>>,
        image_size: Size,
        board_size: Size,
        pattern: PatternType,
        callback: Function,
    },
}

fn patterns() -> StringEnum<PatternType> {
    StringEnum::new(PatternType::LABELS)
}

/// The camera-calibration module: argument binding for each call site plus
/// the algorithm every task shares.
///
/// Lives on the runtime thread alongside the [`Dispatcher`].
pub struct CameraCalibration {
    algorithm: Arc<dyn CalibrationAlgorithm>,
    detect: BindingSpec<DetectParams>,
    calibrate: Overloads<'static, CalibrateCall>,
}

impl CameraCalibration {
    /// Build the call sites around `algorithm`.
    pub fn new(algorithm: Arc<dyn CalibrationAlgorithm>) -> Self {
        let detect = BindingSpec::new(
            "calibrationPatternDetect",
            (Buffer, Typed::new(), patterns(), Callback),
        );

        let calibrate = Overloads::new(
            BindingSpec::new(
                "calibrateCamera",
                (ArrayOf::<String>::new(), Typed::<Size>::new(), patterns(), Callback),
            ),
            |(files, board_size, pattern, callback)| CalibrateCall::Files {
                files,
                board_size,
                pattern,
                callback,
            },
        )
        .or(
            BindingSpec::new(
                "calibrateCamera",
                (
                    ArrayOf::<Vec<Point2f>>::new(),
                    Typed::<Size>::new(),
                    Typed::<Size>::new(),
                    patterns(),
                    Callback,
                ),
            ),
            |(corners, image_size, board_size, pattern, callback)| CalibrateCall::Corners {
                corners,
                image_size,
                board_size,
                pattern,
                callback,
            },
        );

        Self {
            algorithm,
            detect,
            calibrate,
        }
    }

    /// `calibrationPatternDetect(buffer, size, pattern, callback)`.
    ///
    /// Returns `undefined`; the callback later receives
    /// `{patternFound, corners?}`.
    pub fn calibration_pattern_detect(
        &self,
        dispatcher: &Dispatcher,
        args: &[Value],
    ) -> Result<Value, BindingError> {
        let (image, board_size, pattern, callback) = self.detect.bind(args)?;
        let task = DetectPatternTask::new(self.algorithm.clone(), image, board_size, pattern);
        let id = dispatcher.submit(task, callback);
        tracing::debug!(job = %id, %pattern, "pattern detection submitted");
        Ok(Value::Undefined)
    }

    /// `calibrateCamera(files, boardSize, pattern, callback)` or
    /// `calibrateCamera(corners, imageSize, boardSize, pattern, callback)`.
    ///
    /// Returns `true`; the callback later receives `{intrinsic, distCoeffs}`.
    pub fn calibrate_camera(
        &self,
        dispatcher: &Dispatcher,
        args: &[Value],
    ) -> Result<Value, BindingError> {
        let (input, board_size, pattern, callback) = match self.calibrate.bind(args)? {
            CalibrateCall::Files {
                files,
                board_size,
                pattern,
                callback,
            } => (CalibrationInput::ImageFiles(files), board_size, pattern, callback),
            CalibrateCall::Corners {
                corners,
                image_size,
                board_size,
                pattern,
                callback,
            } => (
                CalibrationInput::GridCorners {
                    corners,
                    image_size,
                },
                board_size,
                pattern,
                callback,
            ),
        };

        let task =
            ComputeIntrinsicParametersTask::new(self.algorithm.clone(), input, board_size, pattern);
        let id = dispatcher.submit(task, callback);
        tracing::debug!(job = %id, %pattern, "calibration submitted");
        Ok(Value::Bool(true))
    }
}

impl fmt::Debug for CameraCalibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraCalibration")
            .field("detect", &self.detect.signature())
            .field("calibrate_forms", &self.calibrate.len())
            .finish()
    }
}
