//! Engine module: CLI, filters, image directory, progress

pub mod arg_parser;
pub mod cli;
pub mod filters;
pub mod image_dir;
pub mod parallel;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use filters::{AddTagPixel, ScaleUp, Transform, add_pixel, scale_up, tag_pixel};
pub use image_dir::{DirSink, DirSource, ImageDir, load_png, save_png};
pub use progress::{ProgressFn, RunProgress, dots_callback, no_progress};
pub use tools::{has_input_extension, output_file_name, output_path_for};
