//! End-to-end scenarios: host call, native detection, callback delivery.

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;
use std::sync::Arc;

use cvbridge_calib::{CalibrationAlgorithm, CameraCalibration, Intrinsics, PatternType};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use cvbridge_dispatch::{Dispatcher, DispatcherConfig};
use cvbridge_imageview::ImageView;
use cvbridge_types::{FromDynamic, Function, HostBuffer, Mat, Point2f, Size, Value};
use image::{GrayImage, Luma};

const SQUARE: u32 = 8;

/// Finds the inner corners of a crisp, axis-aligned chessboard: pixels
/// where the four surrounding pixels alternate in colour.
struct GridCorners;

impl CalibrationAlgorithm for GridCorners {
    fn detect_corners(
        &self,
        image: &GrayImage,
        board_size: Size,
        pattern: PatternType,
    ) -> Option<Vec<Point2f>> {
        if pattern != PatternType::Chessboard {
            return None;
        }
        let dark = |x: u32, y: u32| image.get_pixel(x, y).0[0] < 128;
        let mut corners = Vec::new();
        for y in 1..image.height() {
            for x in 1..image.width() {
                let diagonal = dark(x - 1, y - 1) == dark(x, y);
                let anti = dark(x, y - 1) == dark(x - 1, y);
                if diagonal && anti && dark(x, y) != dark(x - 1, y) {
                    corners.push(Point2f::new(x as f32, y as f32));
                }
            }
        }
        (corners.len() == board_size.area()).then_some(corners)
    }

    fn calibrate(
        &self,
        image_points: &[Vec<Point2f>],
        image_size: Size,
        _board_size: Size,
        _pattern: PatternType,
    ) -> Option<Intrinsics> {
        let mut camera_matrix = Mat::identity(3);
        camera_matrix.set(0, 0, image_points.len() as f64);
        camera_matrix.set(0, 2, f64::from(image_size.width) / 2.0);
        camera_matrix.set(1, 2, f64::from(image_size.height) / 2.0);
        Some(Intrinsics {
            camera_matrix,
            dist_coeffs: Mat::zeros(1, 5),
        })
    }
}

/// A PNG chessboard with `inner` inner corners and a one-square white margin.
fn chessboard_png(inner: Size) -> Vec<u8> {
    let cols = inner.width as u32 + 1;
    let rows = inner.height as u32 + 1;
    let width = (cols + 2) * SQUARE;
    let height = (rows + 2) * SQUARE;
    let image = GrayImage::from_fn(width, height, |x, y| {
        let (sx, sy) = (x / SQUARE, y / SQUARE);
        let on_board = (1..=cols).contains(&sx) && (1..=rows).contains(&sy);
        if on_board && (sx + sy) % 2 == 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    GrayImage::from_pixel(width, height, Luma([255]))
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn size(w: i32, h: i32) -> Value {
    Value::object().set("width", w).set("height", h).build()
}

type Calls = Rc<RefCell<Vec<Vec<Value>>>>;

fn recorder() -> (Calls, Value) {
    let calls: Calls = Rc::default();
    let sink = calls.clone();
    (
        calls,
        Value::Function(Function::new(move |args| sink.borrow_mut().push(args))),
    )
}

fn setup() -> (CameraCalibration, Dispatcher) {
    let module = CameraCalibration::new(Arc::new(GridCorners));
    let dispatcher = Dispatcher::new(DispatcherConfig::default().native_threads(4)).unwrap();
    (module, dispatcher)
}

fn detect_args(image: Value, board: Size, label: &str, callback: Value) -> Vec<Value> {
    vec![image, size(board.width, board.height), Value::from(label), callback]
}

// --- Pattern detection ---

#[test]
fn chessboard_is_found_with_ordered_corners() {
    let (module, d) = setup();
    let (calls, callback) = recorder();
    let board = Size::new(9, 6);
    let image = Value::Buffer(HostBuffer::new(chessboard_png(board)));

    module
        .calibration_pattern_detect(&d, &detect_args(image, board, "CHESSBOARD", callback))
        .unwrap();
    assert_eq!(d.run_until_idle(), 1);

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    let [err, result] = calls[0].as_slice() else {
        panic!("expected (null, result), got {:?}", calls[0]);
    };
    assert_eq!(*err, Value::Null);
    assert_eq!(result.get("patternFound"), Some(&Value::Bool(true)));

    let corners = Vec::<Point2f>::from_dynamic(result.get("corners").unwrap()).unwrap();
    assert_eq!(corners.len(), 54);
    assert_eq!(corners[0], Point2f::new(16.0, 16.0));
    assert_eq!(corners[1], Point2f::new(24.0, 16.0));
    assert_eq!(corners[9], Point2f::new(16.0, 24.0));
}

#[test]
fn wrong_board_size_is_not_found() {
    let (module, d) = setup();
    let (calls, callback) = recorder();
    let image = Value::Buffer(HostBuffer::new(chessboard_png(Size::new(9, 6))));

    module
        .calibration_pattern_detect(&d, &detect_args(image, Size::new(7, 5), "CHESSBOARD", callback))
        .unwrap();
    d.run_until_idle();

    let calls = calls.borrow();
    assert_eq!(calls[0][1].get("patternFound"), Some(&Value::Bool(false)));
    assert_eq!(calls[0][1].get("corners"), None);
}

#[test]
fn corrupt_buffer_reports_decode_error_only() {
    let (module, d) = setup();
    for bytes in [Vec::new(), vec![0xFF, 0xD8, 0xFF, 0x00]] {
        let (calls, callback) = recorder();
        let image = Value::Buffer(HostBuffer::new(bytes));
        module
            .calibration_pattern_detect(&d, &detect_args(image, Size::new(9, 6), "CHESSBOARD", callback))
            .unwrap();
        d.run_until_idle();

        assert_eq!(
            *calls.borrow(),
            vec![vec![Value::Error("Cannot decode input image".into())]]
        );
    }
}

#[test]
fn buffer_mutated_after_submission_does_not_leak_in() {
    let (module, d) = setup();
    let (calls, callback) = recorder();
    let board = Size::new(9, 6);
    let host = HostBuffer::new(chessboard_png(board));

    module
        .calibration_pattern_detect(
            &d,
            &detect_args(Value::Buffer(host.clone()), board, "CHESSBOARD", callback),
        )
        .unwrap();
    host.with_mut(|bytes| bytes.fill(0));
    d.run_until_idle();

    assert_eq!(
        calls.borrow()[0][1].get("patternFound"),
        Some(&Value::Bool(true))
    );
}

#[test]
fn concurrent_calls_keep_results_apart() {
    let (module, d) = setup();
    let boards = [
        Size::new(9, 6),
        Size::new(4, 3),
        Size::new(7, 7),
        Size::new(5, 8),
        Size::new(3, 2),
        Size::new(6, 4),
    ];

    let mut recorded = Vec::new();
    for board in boards {
        let (calls, callback) = recorder();
        let image = Value::Buffer(HostBuffer::new(chessboard_png(board)));
        module
            .calibration_pattern_detect(&d, &detect_args(image, board, "CHESSBOARD", callback))
            .unwrap();
        recorded.push((board, calls));
    }
    assert_eq!(d.pending(), boards.len());
    assert_eq!(d.run_until_idle(), boards.len());

    for (board, calls) in recorded {
        let calls = calls.borrow();
        assert_eq!(calls.len(), 1, "board {board:?}");
        let corners = calls[0][1].get("corners").and_then(Value::as_array).unwrap();
        assert_eq!(corners.len(), board.area(), "board {board:?}");
    }
}

// --- Detection feeding calibration ---

#[test]
fn detected_corners_calibrate_the_camera() {
    let (module, d) = setup();
    let board = Size::new(9, 6);
    let views: Rc<RefCell<Vec<Value>>> = Rc::default();

    for _ in 0..3 {
        let sink = views.clone();
        let callback = Value::Function(Function::new(move |args| {
            if let Some(corners) = args.get(1).and_then(|r| r.get("corners")) {
                sink.borrow_mut().push(corners.clone());
            }
        }));
        let image = Value::Buffer(HostBuffer::new(chessboard_png(board)));
        module
            .calibration_pattern_detect(&d, &detect_args(image, board, "CHESSBOARD", callback))
            .unwrap();
    }
    d.run_until_idle();
    assert_eq!(views.borrow().len(), 3);

    let (calls, callback) = recorder();
    let args = [
        Value::Array(views.borrow().clone()),
        size(176, 128),
        size(board.width, board.height),
        Value::from("CHESSBOARD"),
        callback,
    ];
    assert_eq!(module.calibrate_camera(&d, &args).unwrap(), Value::Bool(true));
    d.run_until_idle();

    let calls = calls.borrow();
    assert_eq!(calls[0][0], Value::Null);
    let intrinsic = Mat::from_dynamic(calls[0][1].get("intrinsic").unwrap()).unwrap();
    assert_eq!(intrinsic.get(0, 0), Some(3.0));
    assert_eq!(intrinsic.get(0, 2), Some(88.0));
    assert_eq!(intrinsic.get(1, 2), Some(64.0));
    let dist = Mat::from_dynamic(calls[0][1].get("distCoeffs").unwrap()).unwrap();
    assert_eq!((dist.rows(), dist.cols()), (1, 5));
}

#[test]
fn calibrate_from_image_files() {
    let dir = tempfile::tempdir().unwrap();
    let board = Size::new(4, 3);
    let mut files = Vec::new();
    for i in 0..2 {
        let path = dir.path().join(format!("view-{i}.png"));
        std::fs::write(&path, chessboard_png(board)).unwrap();
        files.push(Value::from(path.to_string_lossy().into_owned()));
    }
    // Same dimensions, no board: detection misses and the view is skipped.
    let skipped = dir.path().join("blank.png");
    std::fs::write(&skipped, blank_png(56, 48)).unwrap();
    files.push(Value::from(skipped.to_string_lossy().into_owned()));

    let (module, d) = setup();
    let (calls, callback) = recorder();
    let args = [
        Value::Array(files),
        size(board.width, board.height),
        Value::from("CHESSBOARD"),
        callback,
    ];
    module.calibrate_camera(&d, &args).unwrap();
    d.run_until_idle();

    let calls = calls.borrow();
    let result = &calls[0];
    assert_eq!(result[0], Value::Null, "{:?}", result);
    let intrinsic = Mat::from_dynamic(result[1].get("intrinsic").unwrap()).unwrap();
    assert_eq!(intrinsic.get(0, 0), Some(2.0));
}

// --- Image views feeding detection ---

#[test]
fn encoded_image_view_feeds_pattern_detection() {
    let dir = tempfile::tempdir().unwrap();
    let board = Size::new(5, 4);
    let path = dir.path().join("board.png");
    std::fs::write(&path, chessboard_png(board)).unwrap();

    let (module, d) = setup();
    let view = ImageView::open(&[Value::from(path.to_string_lossy().into_owned())]).unwrap();
    assert_eq!(view.width(&[]).unwrap(), Value::Number(64.0));

    let streamed: Rc<RefCell<Option<Value>>> = Rc::default();
    let sink = streamed.clone();
    let callback = Value::Function(Function::new(move |mut args| {
        *sink.borrow_mut() = args.pop();
    }));
    view.as_png_stream(&d, &[callback]).unwrap();
    d.run_until_idle();

    let stream = streamed.borrow_mut().take().unwrap();
    let (calls, callback) = recorder();
    module
        .calibration_pattern_detect(&d, &detect_args(stream, board, "CHESSBOARD", callback))
        .unwrap();
    d.run_until_idle();

    let corners = calls.borrow()[0][1].get("corners").and_then(Value::as_array).map(<[_]>::len);
    assert_eq!(corners, Some(board.area()));
}

#[test]
fn data_uri_payload_decodes_to_the_same_board() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.png");
    std::fs::write(&path, chessboard_png(Size::new(3, 2))).unwrap();

    let d = Dispatcher::new(DispatcherConfig::default().native_threads(1)).unwrap();
    let view = ImageView::open(&[Value::from(path.to_string_lossy().into_owned())]).unwrap();
    let (calls, callback) = recorder();
    view.as_png_data_uri(&d, &[callback]).unwrap();
    d.run_until_idle();

    let calls = calls.borrow();
    let uri = calls[0][1].as_str().unwrap();
    let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
    let decoded = image::load_from_memory(&BASE64_STANDARD.decode(payload).unwrap()).unwrap();
    let original = image::load_from_memory(&chessboard_png(Size::new(3, 2))).unwrap();
    assert_eq!(decoded.to_luma8(), original.to_luma8());
}
