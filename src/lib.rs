mod assembly;
mod codec;
mod dataset;
mod error;
mod midi_importer;
mod model;
mod renderer;
mod util;

pub use assembly::*;
pub use codec::*;
pub use dataset::*;
pub use error::*;
pub use midi_importer::*;
pub use model::config::*;
pub use model::pitch::*;
pub use model::score::*;
pub use renderer::*;
pub use util::*;
