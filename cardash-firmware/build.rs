//! Build script for cardash-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates device.toml at compile time
//! - Generates the parameter, telemetry and profile tables from it

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Telemetry sources the firmware knows how to sample
const SOURCES: &[(&str, &str)] = &[
    ("vsys", "Vsys"),
    ("core_temp", "CoreTemp"),
    ("uptime", "Uptime"),
];

/// Must match cardash_core::telemetry::MAX_CHANNELS
const MAX_CHANNELS: usize = 16;

/// Must match cardash_protocol::config::MAX_PAYLOAD_SIZE (DICT_RSP limit)
const MAX_PAYLOAD_SIZE: usize = 1009;

/// Worst-case postcard size of a `ParamValue` (variant tag + 5-byte varint)
const VALUE_MAX_LEN: usize = 6;

fn main() {
    setup_linker();
    let device = load_config();
    let generated = generate(&device);

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_dir.join("device_config.rs"), generated).unwrap();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

#[derive(Clone, Copy, PartialEq)]
enum Kind {
    F32,
    I32,
    U32,
}

impl Kind {
    fn variant(self) -> &'static str {
        match self {
            Kind::F32 => "F32",
            Kind::I32 => "I32",
            Kind::U32 => "U32",
        }
    }
}

struct Param {
    id: u16,
    name: String,
    kind: Kind,
    min: String,
    max: String,
    default: String,
    writable: bool,
    unit: String,
    group: String,
}

struct Channel {
    name: String,
    source: &'static str,
    unit: String,
    group: String,
}

struct ProfileEntry {
    id: u8,
    name: String,
    values: Vec<(u16, Kind, String)>,
}

struct Device {
    baudrate: u32,
    data_bits: &'static str,
    parity: &'static str,
    stop_bits: &'static str,
    period_ms: u64,
    experiment_period_ms: u64,
    log_capacity: usize,
    channels: Vec<Channel>,
    params: Vec<Param>,
    profiles: Vec<ProfileEntry>,
}

/// Read, parse and validate device.toml
fn load_config() -> Device {
    println!("cargo:rerun-if-changed=device.toml");

    let config_path = Path::new("device.toml");
    if !config_path.exists() {
        fail(
            "device.toml not found",
            &["The firmware requires a device.toml in the cardash-firmware directory.".into()],
        );
    }

    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => fail("Failed to read device.toml", &[e.to_string()]),
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => fail(
            "Invalid TOML syntax in device.toml",
            &e.to_string().lines().map(String::from).collect::<Vec<_>>(),
        ),
    };

    let mut errors = Vec::new();
    let (baudrate, data_bits, parity, stop_bits) = validate_uart(&config, &mut errors);
    let (period_ms, experiment_period_ms, log_capacity, channels) =
        validate_telemetry(&config, &mut errors);
    let params = validate_params(&config, &mut errors);
    let profiles = validate_profiles(&config, &params, &mut errors);
    validate_dictionary_size(&params, &channels, &mut errors);

    if !errors.is_empty() {
        fail("Invalid device.toml", &errors);
    }

    println!("cargo:warning=device.toml validated successfully");
    Device {
        baudrate,
        data_bits,
        parity,
        stop_bits,
        period_ms,
        experiment_period_ms,
        log_capacity,
        channels,
        params,
        profiles,
    }
}

/// Abort the build with a boxed error report
fn fail(title: &str, lines: &[String]) -> ! {
    let body = lines
        .iter()
        .map(|line| {
            let truncated = if line.len() > 62 {
                format!("{}...", &line[..59])
            } else {
                line.clone()
            };
            format!("║  • {:<62} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n");
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title, body
    );
}

fn integer(value: Option<&toml::Value>) -> Option<i64> {
    match value {
        Some(toml::Value::Integer(i)) => Some(*i),
        _ => None,
    }
}

fn number(value: Option<&toml::Value>) -> Option<f64> {
    match value {
        Some(toml::Value::Integer(i)) => Some(*i as f64),
        Some(toml::Value::Float(f)) => Some(*f),
        _ => None,
    }
}

fn string(value: Option<&toml::Value>) -> Option<&str> {
    match value {
        Some(toml::Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn validate_uart(
    config: &toml::Value,
    errors: &mut Vec<String>,
) -> (u32, &'static str, &'static str, &'static str) {
    let Some(uart) = config.get("uart") else {
        return (115_200, "Eight", "None", "One");
    };

    let baudrate = match integer(uart.get("baudrate")) {
        Some(b) if (9_600..=3_000_000).contains(&b) => b as u32,
        Some(_) => {
            errors.push("[uart] baudrate must be 9600-3000000".into());
            115_200
        }
        None => 115_200,
    };
    let data_bits = match integer(uart.get("data_bits")) {
        None | Some(8) => "Eight",
        Some(7) => "Seven",
        Some(_) => {
            errors.push("[uart] data_bits must be 7 or 8".into());
            "Eight"
        }
    };
    let parity = match string(uart.get("parity")) {
        None | Some("none") => "None",
        Some("even") => "Even",
        Some("odd") => "Odd",
        Some(_) => {
            errors.push("[uart] parity must be 'none', 'even' or 'odd'".into());
            "None"
        }
    };
    let stop_bits = match integer(uart.get("stop_bits")) {
        None | Some(1) => "One",
        Some(2) => "Two",
        Some(_) => {
            errors.push("[uart] stop_bits must be 1 or 2".into());
            "One"
        }
    };
    (baudrate, data_bits, parity, stop_bits)
}

fn validate_telemetry(
    config: &toml::Value,
    errors: &mut Vec<String>,
) -> (u64, u64, usize, Vec<Channel>) {
    let Some(telemetry) = config.get("telemetry") else {
        errors.push("Missing [telemetry] section".into());
        return (0, 0, 0, Vec::new());
    };

    let period_ms = match integer(telemetry.get("period_ms")) {
        Some(p) if (1..=60_000).contains(&p) => p as u64,
        _ => {
            errors.push("[telemetry] period_ms must be 1-60000".into());
            0
        }
    };
    let experiment_period_ms = match integer(telemetry.get("experiment_period_ms")) {
        None => period_ms,
        Some(p) if (1..=60_000).contains(&p) => p as u64,
        Some(_) => {
            errors.push("[telemetry] experiment_period_ms must be 1-60000".into());
            0
        }
    };
    let log_capacity = match integer(telemetry.get("log_capacity")) {
        Some(c) if (1..=1024).contains(&c) => c as usize,
        _ => {
            errors.push("[telemetry] log_capacity must be 1-1024".into());
            0
        }
    };

    let mut channels = Vec::new();
    let mut seen = BTreeSet::new();
    let entries = match telemetry.get("channel") {
        Some(toml::Value::Array(a)) => a.as_slice(),
        _ => {
            errors.push("[telemetry] needs at least one [[telemetry.channel]]".into());
            &[][..]
        }
    };
    for (i, entry) in entries.iter().enumerate() {
        let Some(name) = string(entry.get("name")) else {
            errors.push(format!("[[telemetry.channel]] #{} missing 'name'", i));
            continue;
        };
        let Some(&(_, source)) = SOURCES.iter().find(|(n, _)| *n == name) else {
            errors.push(format!("telemetry channel '{}' has no sampler", name));
            continue;
        };
        if !seen.insert(name.to_string()) {
            errors.push(format!("telemetry channel '{}' listed twice", name));
        }
        channels.push(Channel {
            name: name.to_string(),
            source,
            unit: string(entry.get("unit")).unwrap_or("").to_string(),
            group: string(entry.get("group")).unwrap_or("Default").to_string(),
        });
    }
    if channels.len() > MAX_CHANNELS {
        errors.push(format!("at most {} telemetry channels", MAX_CHANNELS));
    }

    (period_ms, experiment_period_ms, log_capacity, channels)
}

/// Render a TOML number as a literal of the parameter's kind
fn literal(kind: Kind, value: f64) -> Option<String> {
    match kind {
        Kind::F32 if value.is_finite() => Some(format!("{:?}", value)),
        Kind::I32 if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 => {
            Some(format!("{}", value as i64))
        }
        Kind::U32 if value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64 => {
            Some(format!("{}", value as u64))
        }
        _ => None,
    }
}

fn validate_params(config: &toml::Value, errors: &mut Vec<String>) -> Vec<Param> {
    let entries = match config.get("param") {
        Some(toml::Value::Array(a)) => a.as_slice(),
        _ => {
            errors.push("Missing [[param]] entries - at least one is required".into());
            return Vec::new();
        }
    };

    let mut params = Vec::new();
    let mut ids = BTreeSet::new();
    let mut names = BTreeSet::new();

    for (i, entry) in entries.iter().enumerate() {
        let Some(name) = string(entry.get("name")).filter(|n| !n.is_empty()) else {
            errors.push(format!("[[param]] #{} missing 'name'", i));
            continue;
        };
        let id = match integer(entry.get("id")) {
            Some(id) if (0..=u16::MAX as i64).contains(&id) => id as u16,
            _ => {
                errors.push(format!("param '{}' id must be 0-65535", name));
                continue;
            }
        };
        if !ids.insert(id) {
            errors.push(format!("param id {} used twice", id));
        }
        if !names.insert(name.to_string()) {
            errors.push(format!("param name '{}' used twice", name));
        }

        let kind = match string(entry.get("kind")) {
            Some("f32") => Kind::F32,
            Some("i32") => Kind::I32,
            Some("u32") => Kind::U32,
            _ => {
                errors.push(format!("param '{}' kind must be f32, i32 or u32", name));
                continue;
            }
        };

        let (Some(min), Some(max), Some(default)) = (
            number(entry.get("min")),
            number(entry.get("max")),
            number(entry.get("default")),
        ) else {
            errors.push(format!("param '{}' needs numeric min, max and default", name));
            continue;
        };
        if !(min <= default && default <= max) {
            errors.push(format!("param '{}' needs min <= default <= max", name));
        }
        let (Some(min), Some(max), Some(default)) =
            (literal(kind, min), literal(kind, max), literal(kind, default))
        else {
            errors.push(format!("param '{}' bounds do not fit its kind", name));
            continue;
        };

        let writable = match entry.get("writable") {
            None => true,
            Some(toml::Value::Boolean(b)) => *b,
            Some(_) => {
                errors.push(format!("param '{}' writable must be a boolean", name));
                true
            }
        };

        params.push(Param {
            id,
            name: name.to_string(),
            kind,
            min,
            max,
            default,
            writable,
            unit: string(entry.get("unit")).unwrap_or("").to_string(),
            group: string(entry.get("group")).unwrap_or("Default").to_string(),
        });
    }
    params
}

fn validate_profiles(
    config: &toml::Value,
    params: &[Param],
    errors: &mut Vec<String>,
) -> Vec<ProfileEntry> {
    let entries = match config.get("profile") {
        Some(toml::Value::Array(a)) => a.as_slice(),
        None => return Vec::new(),
        Some(_) => {
            errors.push("profiles must be [[profile]] entries".into());
            return Vec::new();
        }
    };

    let by_name: BTreeMap<&str, &Param> = params.iter().map(|p| (p.name.as_str(), p)).collect();
    let mut profiles = Vec::new();
    let mut ids = BTreeSet::new();

    for (i, entry) in entries.iter().enumerate() {
        let name = string(entry.get("name")).unwrap_or("").to_string();
        let id = match integer(entry.get("id")) {
            Some(id) if (0..=255).contains(&id) => id as u8,
            _ => {
                errors.push(format!("[[profile]] #{} id must be 0-255", i));
                continue;
            }
        };
        if !ids.insert(id) {
            errors.push(format!("profile id {} used twice", id));
        }

        let Some(toml::Value::Table(table)) = entry.get("values") else {
            errors.push(format!("profile '{}' needs a 'values' table", name));
            continue;
        };

        let mut values = Vec::new();
        for (param_name, value) in table {
            let Some(param) = by_name.get(param_name.as_str()) else {
                errors.push(format!("profile '{}': unknown param '{}'", name, param_name));
                continue;
            };
            if !param.writable {
                errors.push(format!("profile '{}': '{}' is read-only", name, param_name));
                continue;
            }
            let Some(v) = number(Some(value)) else {
                errors.push(format!("profile '{}': '{}' must be a number", name, param_name));
                continue;
            };
            let in_range = literal(param.kind, v).is_some()
                && v >= param.min.parse::<f64>().unwrap_or(f64::MIN)
                && v <= param.max.parse::<f64>().unwrap_or(f64::MAX);
            if !in_range {
                errors.push(format!("profile '{}': '{}' out of range", name, param_name));
                continue;
            }
            if let Some(lit) = literal(param.kind, v) {
                values.push((param.id, param.kind, lit));
            }
        }

        profiles.push(ProfileEntry { id, name, values });
    }
    profiles
}

/// Bytes postcard uses for a varint-encoded unsigned integer
fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Bytes postcard uses for a length-prefixed string
fn str_len(s: &str) -> usize {
    varint_len(s.len() as u64) + s.len()
}

/// Upper bound on the serialized DICT_RSP payload
///
/// Mirrors the field order of cardash_core::Dictionary: version, then
/// the param sequence, then the telemetry sequence.
fn dictionary_max_len(params: &[Param], channels: &[Channel]) -> usize {
    let params_len: usize = params
        .iter()
        .map(|p| {
            varint_len(u64::from(p.id))
                + str_len(&p.name)
                + 1 // kind
                + 3 * VALUE_MAX_LEN
                + 1 // writable
                + str_len(&p.unit)
                + str_len(&p.group)
        })
        .sum();
    let channels_len: usize = channels
        .iter()
        .map(|c| str_len(&c.name) + str_len(&c.unit) + str_len(&c.group) + 1)
        .sum();

    1 + varint_len(params.len() as u64)
        + params_len
        + varint_len(channels.len() as u64)
        + channels_len
}

fn validate_dictionary_size(params: &[Param], channels: &[Channel], errors: &mut Vec<String>) {
    let len = dictionary_max_len(params, channels);
    if len > MAX_PAYLOAD_SIZE {
        errors.push(format!(
            "dictionary may need {} bytes, DICT_RSP holds {}",
            len, MAX_PAYLOAD_SIZE
        ));
        errors.push("shorten names/units/groups or drop params".into());
    }
}

/// Emit the Rust tables included by src/config.rs
fn generate(device: &Device) -> String {
    let version = |key: &str| -> u8 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };

    let mut out = String::new();
    writeln!(out, "// Generated from device.toml by build.rs").unwrap();
    writeln!(
        out,
        "pub const FIRMWARE_VERSION: [u8; 3] = [{}, {}, {}];",
        version("CARGO_PKG_VERSION_MAJOR"),
        version("CARGO_PKG_VERSION_MINOR"),
        version("CARGO_PKG_VERSION_PATCH"),
    )
    .unwrap();
    writeln!(
        out,
        "pub const UART: UartConfig = UartConfig {{ baudrate: {}, data_bits: DataBits::{}, parity: Parity::{}, stop_bits: StopBits::{} }};",
        device.baudrate, device.data_bits, device.parity, device.stop_bits
    )
    .unwrap();
    writeln!(out, "pub const TELEMETRY_PERIOD_MS: u64 = {};", device.period_ms).unwrap();
    writeln!(
        out,
        "pub const EXPERIMENT_PERIOD_MS: u64 = {};",
        device.experiment_period_ms
    )
    .unwrap();
    writeln!(out, "pub const LOG_CAPACITY: usize = {};", device.log_capacity).unwrap();

    writeln!(out, "pub const PARAM_COUNT: usize = {};", device.params.len()).unwrap();
    writeln!(out, "pub static PARAM_DEFS: [ParamDef; PARAM_COUNT] = [").unwrap();
    for p in &device.params {
        let k = p.kind.variant();
        writeln!(
            out,
            "    ParamDef {{ id: {}, name: {:?}, kind: ParamKind::{k}, min: ParamValue::{k}({}), max: ParamValue::{k}({}), default: ParamValue::{k}({}), writable: {}, unit: {:?}, group: {:?} }},",
            p.id, p.name, p.min, p.max, p.default, p.writable, p.unit, p.group
        )
        .unwrap();
    }
    writeln!(out, "];").unwrap();

    writeln!(out, "pub const CHANNEL_COUNT: usize = {};", device.channels.len()).unwrap();
    writeln!(out, "pub static TELEMETRY_DEFS: [TelemetryDef; CHANNEL_COUNT] = [").unwrap();
    for c in &device.channels {
        writeln!(
            out,
            "    TelemetryDef {{ name: {:?}, unit: {:?}, group: {:?}, kind: ParamKind::F32 }},",
            c.name, c.unit, c.group
        )
        .unwrap();
    }
    writeln!(out, "];").unwrap();
    writeln!(out, "pub static TELEMETRY_SOURCES: [Source; CHANNEL_COUNT] = [").unwrap();
    for c in &device.channels {
        writeln!(out, "    Source::{},", c.source).unwrap();
    }
    writeln!(out, "];").unwrap();

    writeln!(
        out,
        "pub static PROFILES: [Profile<'static>; {}] = [",
        device.profiles.len()
    )
    .unwrap();
    for profile in &device.profiles {
        let values = profile
            .values
            .iter()
            .map(|(id, kind, lit)| format!("({}, ParamValue::{}({}))", id, kind.variant(), lit))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            out,
            "    Profile {{ id: {}, name: {:?}, values: &[{}] }},",
            profile.id, profile.name, values
        )
        .unwrap();
    }
    writeln!(out, "];").unwrap();

    out
}
