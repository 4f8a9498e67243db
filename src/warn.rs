//! Development-mode diagnostics (ยง7 error class 2: "misuse warnings").
//!
//! In development builds these log; in production builds they are silent. "Development build"
//! here means either `debug_assertions` (the default for `cargo test`/`cargo build`) or the
//! `trace` feature being enabled, so that a release build compiled with `--features trace` still
//! gets diagnostics routed through `tracing` for whoever is watching its spans.

#[macro_export]
macro_rules! dev_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "trace")]
        {
            tracing::warn!($($arg)*);
        }
        #[cfg(all(not(feature = "trace"), debug_assertions))]
        {
            eprintln!("[reactivity] {}", format!($($arg)*));
        }
        #[cfg(all(not(feature = "trace"), not(debug_assertions)))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

pub use crate::dev_warn;
