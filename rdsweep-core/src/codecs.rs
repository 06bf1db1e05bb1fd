// ============================================================================
// rdsweep-core/src/codecs.rs
// ============================================================================
//
// CODEC REGISTRY: Immutable Descriptions of the Supported Codecs
//
// Each `CodecDescriptor` states how a codec is driven (ffmpeg encoder or a
// standalone encoder binary), which container it writes, which fixed
// parameters it always receives and which sweep axes it consumes. The
// registry is built once at startup and passed explicitly to the sweep
// builder and the encode stage; nothing mutates it afterwards.

use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// AXES AND ENCODER KINDS
// ============================================================================

/// Sweep axes a codec may or may not consume.
///
/// Rate control and the rate/quality value are consumed by every codec and
/// are therefore not part of the capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    Resolution,
    Preset,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Resolution => write!(f, "resolution"),
            Axis::Preset => write!(f, "preset"),
        }
    }
}

/// How the encoder is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderKind {
    /// ffmpeg with `-c:v <codec>`
    Ffmpeg { codec: &'static str },
    /// Standalone SVT-AV1 encoder application with its own flag dialect
    SvtAv1App,
}

/// The preset axis of a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetAxis {
    /// Flag name without the leading dash (`preset`, `cpu-used`, ...)
    pub flag: &'static str,
    /// Ordered legal values
    pub values: &'static [&'static str],
    /// Value used when the sweep does not list presets
    pub default: &'static str,
}

impl PresetAxis {
    #[must_use]
    pub fn accepts(&self, preset: &str) -> bool {
        self.values.contains(&preset)
    }
}

// ============================================================================
// CODEC DESCRIPTOR
// ============================================================================

/// Immutable description of one supported codec variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    pub name: &'static str,
    pub encoder: EncoderKind,
    /// Container extension including the dot
    pub extension: &'static str,
    /// Parameters appended to every encode, in order
    pub parameters: &'static [(&'static str, &'static str)],
    pub preset: Option<PresetAxis>,
    /// Flag carrying the quality index in constant-quality mode
    pub quality_flag: &'static str,
    /// Emit `-bf 0`
    pub disable_bframes: bool,
    /// Fixed binary path override
    pub binary: Option<&'static str>,
    /// ffmpeg requires `-strict experimental` for this encoder
    pub experimental: bool,
}

impl CodecDescriptor {
    /// Whether the codec consumes `axis`.
    #[must_use]
    pub fn declares(&self, axis: Axis) -> bool {
        match axis {
            Axis::Resolution => matches!(self.encoder, EncoderKind::Ffmpeg { .. }),
            Axis::Preset => self.preset.is_some(),
        }
    }

    /// The tool/codec identifier written to the result table.
    #[must_use]
    pub fn codec_id(&self) -> &'static str {
        match self.encoder {
            EncoderKind::Ffmpeg { codec } => codec,
            EncoderKind::SvtAv1App => "libsvtav1-raw",
        }
    }

    /// Fixed parameters rendered as `k=v;` pairs.
    #[must_use]
    pub fn parameters_string(&self) -> String {
        self.parameters
            .iter()
            .map(|(k, v)| format!("{k}={v};"))
            .collect()
    }
}

// ============================================================================
// DEFAULT REGISTRY
// ============================================================================

const X26X_PRESETS: &[&str] = &[
    "ultrafast", "superfast", "veryfast", "faster", "fast", "medium", "slow", "slower", "veryslow",
    "placebo",
];
const OPENH264_COMPLEXITY: &[&str] = &["0", "1", "2"];
const VP8_CPU_USED: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16",
];
const VP9_CPU_USED: &[&str] = &["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
const AOM_CPU_USED: &[&str] = &["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11"];
const SVT_PRESETS: &[&str] = &[
    "-1", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13",
];

fn ffmpeg_codec(name: &'static str, codec: &'static str, extension: &'static str) -> CodecDescriptor {
    CodecDescriptor {
        name,
        encoder: EncoderKind::Ffmpeg { codec },
        extension,
        parameters: &[],
        preset: None,
        quality_flag: "-crf",
        disable_bframes: false,
        binary: None,
        experimental: false,
    }
}

fn default_descriptors() -> Vec<CodecDescriptor> {
    vec![
        CodecDescriptor {
            quality_flag: "-q:v",
            ..ffmpeg_codec("mjpeg", "mjpeg", ".mp4")
        },
        CodecDescriptor {
            preset: Some(PresetAxis { flag: "preset", values: X26X_PRESETS, default: "medium" }),
            disable_bframes: true,
            ..ffmpeg_codec("x264", "libx264", ".mp4")
        },
        CodecDescriptor {
            preset: Some(PresetAxis { flag: "complexity", values: OPENH264_COMPLEXITY, default: "0" }),
            ..ffmpeg_codec("openh264", "libopenh264", ".mp4")
        },
        CodecDescriptor {
            preset: Some(PresetAxis { flag: "preset", values: X26X_PRESETS, default: "medium" }),
            disable_bframes: true,
            ..ffmpeg_codec("x265", "libx265", ".mp4")
        },
        CodecDescriptor {
            parameters: &[("quality", "realtime")],
            preset: Some(PresetAxis { flag: "cpu-used", values: VP8_CPU_USED, default: "0" }),
            ..ffmpeg_codec("vp8", "libvpx", ".webm")
        },
        CodecDescriptor {
            parameters: &[("quality", "realtime"), ("qmin", "2"), ("qmax", "56")],
            preset: Some(PresetAxis { flag: "cpu-used", values: VP9_CPU_USED, default: "0" }),
            ..ffmpeg_codec("vp9", "libvpx-vp9", ".webm")
        },
        CodecDescriptor {
            preset: Some(PresetAxis { flag: "cpu-used", values: AOM_CPU_USED, default: "1" }),
            experimental: true,
            ..ffmpeg_codec("libaom-av1", "libaom-av1", ".mp4")
        },
        CodecDescriptor {
            preset: Some(PresetAxis { flag: "preset", values: SVT_PRESETS, default: "10" }),
            ..ffmpeg_codec("libsvtav1", "libsvtav1", ".mp4")
        },
        CodecDescriptor {
            name: "libsvtav1-raw",
            encoder: EncoderKind::SvtAv1App,
            extension: ".ivf",
            parameters: &[],
            preset: Some(PresetAxis { flag: "preset", values: SVT_PRESETS, default: "10" }),
            quality_flag: "--crf",
            disable_bframes: false,
            binary: Some("SvtAv1EncApp"),
            experimental: false,
        },
    ]
}

/// Immutable name → descriptor mapping.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: BTreeMap<&'static str, CodecDescriptor>,
    order: Vec<&'static str>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::from_descriptors(default_descriptors())
    }
}

impl CodecRegistry {
    /// Builds a registry; later descriptors replace earlier ones with the
    /// same name.
    #[must_use]
    pub fn from_descriptors(descriptors: Vec<CodecDescriptor>) -> Self {
        let mut codecs = BTreeMap::new();
        let mut order = Vec::new();
        for d in descriptors {
            if !codecs.contains_key(d.name) {
                order.push(d.name);
            }
            codecs.insert(d.name, d);
        }
        Self { codecs, order }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CodecDescriptor> {
        self.codecs.get(name)
    }

    /// Codec names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodecDescriptor> {
        self.order.iter().filter_map(|n| self.codecs.get(n))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_contents() {
        let registry = CodecRegistry::default();
        assert_eq!(registry.len(), 9);
        assert_eq!(registry.names()[0], "mjpeg");
        let x264 = registry.get("x264").unwrap();
        assert_eq!(x264.codec_id(), "libx264");
        assert!(x264.declares(Axis::Preset));
        assert!(x264.declares(Axis::Resolution));
        assert!(x264.preset.as_ref().unwrap().accepts("medium"));
        assert!(!x264.preset.as_ref().unwrap().accepts("5"));
    }

    #[test]
    fn test_capabilities() {
        let registry = CodecRegistry::default();
        let mjpeg = registry.get("mjpeg").unwrap();
        assert!(!mjpeg.declares(Axis::Preset));
        let raw = registry.get("libsvtav1-raw").unwrap();
        assert!(!raw.declares(Axis::Resolution));
        assert!(raw.declares(Axis::Preset));
    }

    #[test]
    fn test_parameters_string() {
        let registry = CodecRegistry::default();
        assert_eq!(
            registry.get("vp9").unwrap().parameters_string(),
            "quality=realtime;qmin=2;qmax=56;"
        );
        assert_eq!(registry.get("x264").unwrap().parameters_string(), "");
    }
}
