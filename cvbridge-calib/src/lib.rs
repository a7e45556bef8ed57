#![deny(missing_docs)]
//! Camera-calibration call sites built on the cvbridge framework.
//!
//! | Call | Arguments | Returns | Callback result |
//! |------|-----------|---------|-----------------|
//! | `calibrationPatternDetect` | buffer, size, pattern, callback | `undefined` | `{patternFound, corners?}` |
//! | `calibrateCamera` | files, boardSize, pattern, callback | `true` | `{intrinsic, distCoeffs}` |
//! | `calibrateCamera` | corners, imageSize, boardSize, pattern, callback | `true` | `{intrinsic, distCoeffs}` |
//!
//! Pattern labels are `CHESSBOARD`, `CIRCLES_GRID` and `ACIRCLES_GRID`.
//! The vision algorithms themselves sit behind [`CalibrationAlgorithm`].

pub mod algorithm;
pub mod bindings;
pub mod tasks;

pub use algorithm::{CalibrationAlgorithm, Intrinsics, PatternType, board_points};
pub use bindings::CameraCalibration;
pub use tasks::{
    Calibration, CalibrationInput, ComputeIntrinsicParametersTask, DetectPatternTask,
    PatternDetection,
};
