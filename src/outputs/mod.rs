//! Report output for the `top` command.
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── techno.json
//!     └── hard-techno.json
//! ```

pub mod json;
