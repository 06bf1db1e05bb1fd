//! Implementation of the 'codecs' subcommand.
//!
//! Lists the registry: name, encoder, container, preset axis and the fixed
//! parameters every encode of the codec carries.

use crate::cli::CodecsArgs;
use crate::error::CliResult;

use rdsweep_core::CodecRegistry;
use rdsweep_core::codecs::{Axis, CodecDescriptor, EncoderKind};
use serde_json::{Value, json};

fn encoder(descriptor: &CodecDescriptor) -> String {
    match &descriptor.encoder {
        EncoderKind::Ffmpeg { codec } => format!("ffmpeg -c:v {codec}"),
        EncoderKind::SvtAv1App => descriptor.binary.unwrap_or("SvtAv1EncApp").to_string(),
    }
}

fn to_json(descriptor: &CodecDescriptor) -> Value {
    json!({
        "name": descriptor.name,
        "encoder": encoder(descriptor),
        "extension": descriptor.extension,
        "resolution_axis": descriptor.declares(Axis::Resolution),
        "preset": descriptor.preset.as_ref().map(|p| json!({
            "flag": p.flag,
            "values": p.values,
            "default": p.default,
        })),
        "quality_flag": descriptor.quality_flag,
        "parameters": descriptor.parameters_string(),
    })
}

pub fn render(registry: &CodecRegistry, as_json: bool) -> String {
    if as_json {
        let all: Vec<Value> = registry.iter().map(to_json).collect();
        return Value::Array(all).to_string();
    }
    let mut out = String::new();
    for descriptor in registry.iter() {
        let presets = match &descriptor.preset {
            Some(p) => format!("-{} {} (default {})", p.flag, p.values.join("|"), p.default),
            None => "-".to_string(),
        };
        out.push_str(&format!(
            "{:<14} {:<24} {:<6} {:<40} {}\n",
            descriptor.name,
            encoder(descriptor),
            descriptor.extension,
            presets,
            descriptor.parameters_string()
        ));
    }
    out
}

pub fn run_codecs(args: &CodecsArgs) -> CliResult<()> {
    print!("{}", render(&CodecRegistry::default(), args.json));
    if args.json {
        println!();
    }
    Ok(())
}
