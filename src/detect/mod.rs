mod outputs;
mod parser;
mod result;

pub use outputs::{Candidate, RawOutputs};
pub use parser::{DetectionParser, DEFAULT_THRESHOLD};
pub use result::{Detection, PixelBox};
