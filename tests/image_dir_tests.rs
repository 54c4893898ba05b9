//! Image directory tests: scanning, PNG round trip, full runs over a temp directory.

use imgpipe::compare::compare_modes;
use imgpipe::engine::image_dir::{ImageDir, load_png, save_png};
use imgpipe::pipeline::CancelToken;
use imgpipe::process::process_dir;
use imgpipe::{Image, ImageId, Mode, Opts, Pixel, PipelineOpts, ProgressStyle};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_png(dir: &Path, name: &str, fill: Pixel) {
    let img = Image::filled(2, 3, fill).unwrap();
    save_png(&img, &dir.join(name)).unwrap();
}

/// Input dir with `a.png`, `b.png`, a corrupt `bad.png` and a non-image file.
fn input_fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "b.png", Pixel([1, 2, 3, 255]));
    write_png(tmp.path(), "a.png", Pixel([9, 8, 7, 255]));
    fs::write(tmp.path().join("bad.png"), b"not a png").unwrap();
    fs::write(tmp.path().join("notes.txt"), b"hello").unwrap();
    fs::create_dir(tmp.path().join("nested")).unwrap();
    write_png(&tmp.path().join("nested"), "deep.png", Pixel::default());
    tmp
}

// --- scanning ---

#[test]
fn test_open_lists_pngs_sorted_at_depth_one() {
    let input = input_fixture();
    let out = TempDir::new().unwrap();
    let dir = ImageDir::open(input.path(), &out.path().join("new"), "p-").unwrap();
    let names: Vec<_> = dir
        .inputs()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["a.png", "b.png", "bad.png"]);
    assert_eq!(dir.len(), 3);
    assert!(out.path().join("new").is_dir());
}

#[test]
fn test_open_missing_input_fails() {
    let tmp = TempDir::new().unwrap();
    assert!(ImageDir::open(&tmp.path().join("missing"), tmp.path(), "").is_err());
}

#[test]
fn test_source_skips_undecodable_files() {
    let input = input_fixture();
    let out = TempDir::new().unwrap();
    let (source, sink) = ImageDir::open(input.path(), out.path(), "p-")
        .unwrap()
        .split();
    let loaded: Vec<Image> = source.collect();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].pixel(0, 0), Some(Pixel([9, 8, 7, 255])));
    let named = loaded.into_iter().next().unwrap().with_id(ImageId(4));
    assert_eq!(sink.path_for(&named), out.path().join("p-4.png"));
}

// --- PNG round trip ---

#[test]
fn test_png_round_trip_keeps_pixels() {
    let tmp = TempDir::new().unwrap();
    let img = Image::from_rgba(2, 1, vec![1, 2, 3, 4, 250, 251, 252, 253]).unwrap();
    let path = tmp.path().join("rt.png");
    save_png(&img, &path).unwrap();
    let back = load_png(&path).unwrap();
    assert_eq!((back.width(), back.height()), (2, 1));
    assert_eq!(back.pixels(), img.pixels());
}

// --- full runs ---

#[test]
fn test_process_dir_writes_prefixed_outputs() {
    let input = input_fixture();
    let out = TempDir::new().unwrap();
    let opts = PipelineOpts {
        mode: Mode::Threads,
        num_threads: Some(2),
        scale_factor: 2,
        ..Default::default()
    };
    let report = process_dir(
        input.path(),
        out.path(),
        "threads-",
        &opts,
        ProgressStyle::Quiet,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(report.loaded, 2);
    assert_eq!(report.saved, 2);
    let first = load_png(&out.path().join("threads-0.png")).unwrap();
    assert_eq!((first.width(), first.height()), (4, 6));
    // a.png sorts first, gets id 0 and tag byte 4.
    assert_eq!(first.pixel(3, 5), Some(Pixel([13, 8, 7, 255])));
    assert!(out.path().join("threads-1.png").is_file());
    assert!(!out.path().join("threads-2.png").exists());
}

#[test]
fn test_compare_modes_runs_every_mode() {
    let input = input_fixture();
    let out = TempDir::new().unwrap();
    let opts = Opts {
        input_dir: input.path().to_path_buf(),
        output_dir: out.path().to_path_buf(),
        num_threads: Some(2),
        progress: ProgressStyle::Quiet,
        ..Default::default()
    };
    let reports = compare_modes(&opts, &CancelToken::new()).unwrap();

    let modes: Vec<_> = reports.iter().map(|r| r.mode).collect();
    assert_eq!(modes, Mode::ALL);
    assert!(reports.iter().all(|r| r.saved == 2));
    for prefix in ["serial-", "threads-", "tasks-"] {
        for id in 0..2 {
            assert!(out.path().join(format!("{prefix}{id}.png")).is_file());
        }
    }
}
