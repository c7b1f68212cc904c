//! Asset tasks and path mapping.
//!
//! ```text
//! asset/
//! ├── pattern     # source globs: base directory + matcher
//! ├── route       # source → output mapping, `.min` naming
//! ├── minify      # CSS (lightningcss) and JS (oxc) minifiers
//! ├── transform   # CSS/JS transform tasks
//! ├── copy        # passthrough tasks
//! └── report      # TaskReport with isolated failures
//! ```

mod copy;
pub mod minify;
mod pattern;
mod report;
mod route;
mod transform;

pub use copy::run_copy;
pub use pattern::SourcePattern;
pub use report::TaskReport;
pub use route::{AssetRoute, scan_category};
pub use transform::run_transform;

pub(crate) use transform::{prepare_dest_dir, write_output};
