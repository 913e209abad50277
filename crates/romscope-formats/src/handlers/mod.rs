//! Built-in format handlers
//!
//! | Handler    | Extensions                 | Content                          |
//! |------------|----------------------------|----------------------------------|
//! | `dds`      | `.dds`                     | DirectDraw Surface texture       |
//! | `didj-tex` | `.tex`                     | Leapster Didj texture            |
//! | `snes`     | `.sfc` `.smc` `.swc` `.fig`| Super Nintendo ROM image         |

pub mod dds;
pub mod didj;
pub mod snes;

use std::sync::Arc;

use crate::traits::FormatHandler;

pub use dds::DdsHandler;
pub use didj::DidjTexHandler;
pub use snes::SnesHandler;

/// Built-in handlers with their dispatch priorities.
///
/// Handlers with a strong magic number go first; SNES images have no magic
/// and are recognized heuristically, so they are tried last.
pub fn builtin() -> Vec<(Arc<dyn FormatHandler>, i32)> {
    let dds: Arc<dyn FormatHandler> = Arc::new(DdsHandler);
    let didj: Arc<dyn FormatHandler> = Arc::new(DidjTexHandler);
    let snes: Arc<dyn FormatHandler> = Arc::new(SnesHandler);
    vec![(dds, 100), (didj, 80), (snes, 10)]
}
