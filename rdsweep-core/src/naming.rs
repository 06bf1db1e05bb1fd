//! Artifact naming.
//!
//! Every artifact path is derived from the input base name and the full
//! configuration, so two different configurations (or two repetitions of the
//! same one) never share a file. Axis values are percent-encoded when they
//! contain characters that are unsafe in file names, which keeps the mapping
//! injective.

use crate::codecs::{Axis, CodecDescriptor};
use crate::media::Resolution;
use crate::sweep::{Configuration, RateControl};

/// Pipeline stage an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encoded,
    Decoded,
    /// Decoded artifact rescaled to the reference resolution
    Rescaled { target: Resolution },
}

/// Name of the normalized reference for `base`.
#[must_use]
pub fn reference_name(base: &str, resolution: Resolution) -> String {
    format!("{}.ref_{}.y4m", encode_segment(base), resolution)
}

/// Suffix appended to a decoded artifact name once it is rescaled.
#[must_use]
pub fn rescaled_suffix(target: Resolution) -> String {
    format!(".scaled.resolution_{target}.y4m")
}

/// Name of the artifact of `config` at `stage`.
#[must_use]
pub fn name_for(base: &str, config: &Configuration, descriptor: &CodecDescriptor, stage: Stage) -> String {
    let mut name = encode_segment(base);
    name.push_str(".codec_");
    name.push_str(&encode_segment(&config.codec));
    if descriptor.declares(Axis::Resolution) {
        if let Some(res) = config.resolution {
            name.push_str(&format!(".resolution_{res}"));
        }
    }
    name.push_str(&match config.rate {
        RateControl::Bitrate(v) => format!(".bitrate_{v}"),
        RateControl::Quality(v) => format!(".quality_{v}"),
    });
    if descriptor.declares(Axis::Preset) {
        if let Some(preset) = &config.preset {
            name.push_str(".preset_");
            name.push_str(&encode_segment(preset));
        }
    }
    name.push_str(".rcmode_");
    name.push_str(&config.rate.mode().to_string());
    if config.run > 0 {
        name.push_str(&format!(".run_{}", config.run));
    }
    name.push_str(descriptor.extension);

    match stage {
        Stage::Encoded => {}
        Stage::Decoded => name.push_str(".y4m"),
        Stage::Rescaled { target } => {
            name.push_str(".y4m");
            name.push_str(&rescaled_suffix(target));
        }
    }
    name
}

/// Percent-encodes characters that are unsafe in a single path component.
fn encode_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        let unsafe_char = matches!(c, '/' | '\\' | '%' | ':') || c.is_control() || c.is_whitespace();
        if unsafe_char {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}
