// ============================================================================
// rdsweep-core/src/sweep.rs
// ============================================================================
//
// CONFIGURATION SPACE: Expansion of Sweep Axes into Configurations
//
// `ConfigurationSpaceBuilder` validates the requested axis values against the
// codec registry and expands them into the ordered list of configurations a
// batch runs. All validation happens here, before any external process is
// started.
//
// Expansion order: codec → resolution → rate-control mode → preset →
// rate value → run index. Axes a codec does not consume collapse to a single
// `None` value.

use crate::codecs::{Axis, CodecDescriptor, CodecRegistry};
use crate::error::{CoreError, CoreResult};
use crate::media::Resolution;

use log::warn;

use std::fmt;
use std::str::FromStr;

/// Resolution token selecting the reference resolution.
pub const SOURCE_RESOLUTION: &str = "source";

// ============================================================================
// RATE CONTROL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateControlMode {
    /// Target bitrate
    Cbr,
    /// Constant quality index
    Crf,
}

impl fmt::Display for RateControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateControlMode::Cbr => write!(f, "cbr"),
            RateControlMode::Crf => write!(f, "crf"),
        }
    }
}

impl FromStr for RateControlMode {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "cbr" => Ok(Self::Cbr),
            "crf" => Ok(Self::Crf),
            other => Err(CoreError::Configuration(format!(
                "unknown rate-control mode '{other}' (expected cbr or crf)"
            ))),
        }
    }
}

/// Exactly one of a target bitrate (kbps) or a quality index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateControl {
    Bitrate(u32),
    Quality(u32),
}

impl RateControl {
    #[must_use]
    pub fn mode(&self) -> RateControlMode {
        match self {
            RateControl::Bitrate(_) => RateControlMode::Cbr,
            RateControl::Quality(_) => RateControlMode::Crf,
        }
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        match self {
            RateControl::Bitrate(v) | RateControl::Quality(v) => *v,
        }
    }

    #[must_use]
    pub fn bitrate(&self) -> Option<u32> {
        match self {
            RateControl::Bitrate(v) => Some(*v),
            RateControl::Quality(_) => None,
        }
    }

    #[must_use]
    pub fn quality(&self) -> Option<u32> {
        match self {
            RateControl::Quality(v) => Some(*v),
            RateControl::Bitrate(_) => None,
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// One point of the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Configuration {
    pub codec: String,
    /// `None` selects the reference resolution
    pub resolution: Option<Resolution>,
    pub rate: RateControl,
    pub preset: Option<String>,
    /// Repetition index, 0-based
    pub run: u32,
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.codec)?;
        if let Some(res) = self.resolution {
            write!(f, " {res}")?;
        }
        write!(f, " {} {}", self.rate.mode(), self.rate.value())?;
        if let Some(preset) = &self.preset {
            write!(f, " preset {preset}")?;
        }
        if self.run > 0 {
            write!(f, " run {}", self.run)?;
        }
        Ok(())
    }
}

/// Raw axis values as given by the user.
#[derive(Debug, Clone)]
pub struct AxisValues {
    /// `WxH` tokens or `source`; empty means `source`
    pub resolutions: Vec<String>,
    pub rcmodes: Vec<String>,
    pub bitrates: Vec<String>,
    pub qualities: Vec<String>,
    /// `None` (or empty) uses each codec's default preset
    pub presets: Option<Vec<String>>,
    pub repetitions: u32,
}

impl Default for AxisValues {
    fn default() -> Self {
        Self {
            resolutions: Vec::new(),
            rcmodes: vec!["cbr".to_string()],
            bitrates: Vec::new(),
            qualities: Vec::new(),
            presets: None,
            repetitions: 1,
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Validates axis values and expands them into configurations.
pub struct ConfigurationSpaceBuilder<'a> {
    registry: &'a CodecRegistry,
}

impl<'a> ConfigurationSpaceBuilder<'a> {
    pub fn new(registry: &'a CodecRegistry) -> Self {
        Self { registry }
    }

    /// Expands `codecs` × axes into the ordered configuration list.
    pub fn build(&self, codecs: &[String], axes: &AxisValues) -> CoreResult<Vec<Configuration>> {
        if codecs.is_empty() {
            return Err(CoreError::Configuration("no codecs selected".to_string()));
        }
        if axes.repetitions == 0 {
            return Err(CoreError::Configuration("repetitions must be at least 1".to_string()));
        }

        let descriptors = dedup("codec", codecs)
            .into_iter()
            .map(|name| {
                self.registry.get(&name).ok_or_else(|| {
                    CoreError::Configuration(format!(
                        "unknown codec '{name}' (known: {})",
                        self.registry.names().join(", ")
                    ))
                })
            })
            .collect::<CoreResult<Vec<&CodecDescriptor>>>()?;

        let resolutions = parse_resolutions(&axes.resolutions)?;
        let modes = parse_modes(&axes.rcmodes)?;
        let bitrates = parse_numbers("bitrate", &axes.bitrates)?;
        let qualities = parse_numbers("quality", &axes.qualities)?;
        if modes.contains(&RateControlMode::Cbr) && bitrates.is_empty() {
            return Err(CoreError::Configuration("cbr selected but no bitrates given".to_string()));
        }
        if modes.contains(&RateControlMode::Crf) && qualities.is_empty() {
            return Err(CoreError::Configuration("crf selected but no qualities given".to_string()));
        }
        if let Some(zero) = bitrates.iter().find(|b| **b == 0) {
            return Err(CoreError::Configuration(format!("bitrate must be positive (got {zero})")));
        }
        let presets = axes
            .presets
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| dedup("preset", p));

        let mut configurations = Vec::new();
        for descriptor in descriptors {
            let codec_presets = presets_for(descriptor, presets.as_deref())?;
            let codec_resolutions: Vec<Option<Resolution>> =
                if descriptor.declares(Axis::Resolution) {
                    resolutions.clone()
                } else {
                    vec![None]
                };

            for resolution in &codec_resolutions {
                for mode in &modes {
                    for preset in &codec_presets {
                        let values: Vec<RateControl> = match mode {
                            RateControlMode::Cbr => bitrates.iter().map(|b| RateControl::Bitrate(*b)).collect(),
                            RateControlMode::Crf => qualities.iter().map(|q| RateControl::Quality(*q)).collect(),
                        };
                        for rate in values {
                            for run in 0..axes.repetitions {
                                configurations.push(Configuration {
                                    codec: descriptor.name.to_string(),
                                    resolution: *resolution,
                                    rate,
                                    preset: preset.clone(),
                                    run,
                                });
                            }
                        }
                    }
                }
            }
        }

        log::debug!("Expanded sweep into {} configurations", configurations.len());
        Ok(configurations)
    }
}

/// Removes repeated tokens, keeping the first occurrence.
fn dedup(axis: &str, values: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if unique.iter().any(|u| u == value) {
            warn!("Ignoring duplicate {} '{}'", axis, value);
        } else {
            unique.push(value.to_string());
        }
    }
    unique
}

fn parse_resolutions(tokens: &[String]) -> CoreResult<Vec<Option<Resolution>>> {
    if tokens.is_empty() {
        return Ok(vec![None]);
    }
    let mut parsed = Vec::new();
    for token in dedup("resolution", tokens) {
        let value = if token == SOURCE_RESOLUTION {
            None
        } else {
            Some(token.parse::<Resolution>()?)
        };
        if parsed.contains(&value) {
            warn!("Ignoring duplicate resolution '{}'", token);
        } else {
            parsed.push(value);
        }
    }
    Ok(parsed)
}

fn parse_modes(tokens: &[String]) -> CoreResult<Vec<RateControlMode>> {
    if tokens.is_empty() {
        return Err(CoreError::Configuration("no rate-control modes selected".to_string()));
    }
    dedup("rate-control mode", tokens)
        .iter()
        .map(|t| t.parse::<RateControlMode>())
        .collect()
}

fn parse_numbers(axis: &str, tokens: &[String]) -> CoreResult<Vec<u32>> {
    dedup(axis, tokens)
        .iter()
        .map(|t| {
            t.parse::<u32>().map_err(|_| {
                CoreError::Configuration(format!("invalid {axis} '{t}' (expected a non-negative integer)"))
            })
        })
        .collect()
}

fn presets_for(descriptor: &CodecDescriptor, requested: Option<&[String]>) -> CoreResult<Vec<Option<String>>> {
    let Some(axis) = &descriptor.preset else {
        return Ok(vec![None]);
    };
    match requested {
        None => Ok(vec![Some(axis.default.to_string())]),
        Some(presets) => presets
            .iter()
            .map(|p| {
                if axis.accepts(p) {
                    Ok(Some(p.clone()))
                } else {
                    Err(CoreError::Configuration(format!(
                        "preset '{p}' is not valid for codec '{}' (valid: {})",
                        descriptor.name,
                        axis.values.join(", ")
                    )))
                }
            })
            .collect(),
    }
}
