use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use crate::error::IoError;

/// This module is used to parse pandapower network parameters

/// Deserializes a number from JSON format.
fn from_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Deserialize::deserialize(deserializer)?;
    Ok(val.as_f64().map(|n| n as i64))
}

/// Deserializes a string from JSON format.
fn from_str<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Deserialize::deserialize(deserializer)?;
    match val {
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// pandapower writes NaN as `null`; treat it as "not set".
fn nan_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn one() -> f64 {
    1.0
}

fn one_i32() -> i32 {
    1
}

fn yes() -> bool {
    true
}

/// Represents a bus in the network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Bus {
    #[serde(default)]
    pub index: i64,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(default)]
    pub max_vm_pu: Option<f64>,
    #[serde(default)]
    pub min_vm_pu: Option<f64>,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    pub vn_kv: f64,
    #[serde(default, deserialize_with = "from_number")]
    pub zone: Option<i64>,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            index: 0,
            in_service: true,
            max_vm_pu: None,
            min_vm_pu: None,
            name: None,
            type_: Some("b".to_string()),
            vn_kv: 0.0,
            zone: None,
        }
    }
}

/// Represents a voltage-controlled generator (PV bus) in the network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Gen {
    pub bus: i64,
    #[serde(default)]
    pub controllable: Option<bool>,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
    pub p_mw: f64,
    #[serde(default = "one")]
    pub scaling: f64,
    #[serde(default)]
    pub sn_mva: Option<f64>,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    pub vm_pu: f64,
    #[serde(default)]
    pub slack: bool,
    #[serde(default)]
    pub max_p_mw: Option<f64>,
    #[serde(default)]
    pub min_p_mw: Option<f64>,
    #[serde(default)]
    pub max_q_mvar: Option<f64>,
    #[serde(default)]
    pub min_q_mvar: Option<f64>,
    #[serde(default = "one", deserialize_with = "nan_as_default")]
    pub slack_weight: f64,
}

impl Default for Gen {
    fn default() -> Self {
        Self {
            bus: 0,
            controllable: None,
            in_service: true,
            name: None,
            p_mw: 0.0,
            scaling: 1.0,
            sn_mva: None,
            type_: None,
            vm_pu: 1.0,
            slack: false,
            max_p_mw: None,
            min_p_mw: None,
            max_q_mvar: None,
            min_q_mvar: None,
            slack_weight: 1.0,
        }
    }
}

/// Represents a constant-power load in the network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Load {
    pub bus: i64,
    #[serde(default)]
    pub const_i_percent: f64,
    #[serde(default)]
    pub const_z_percent: f64,
    #[serde(default)]
    pub controllable: Option<bool>,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
    pub p_mw: f64,
    #[serde(default)]
    pub q_mvar: f64,
    #[serde(default = "one")]
    pub scaling: f64,
    #[serde(default)]
    pub sn_mva: Option<f64>,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
}

impl Default for Load {
    fn default() -> Self {
        Self {
            bus: 0,
            const_i_percent: 0.0,
            const_z_percent: 0.0,
            controllable: None,
            in_service: true,
            name: None,
            p_mw: 0.0,
            q_mvar: 0.0,
            scaling: 1.0,
            sn_mva: None,
            type_: Some("wye".to_string()),
        }
    }
}

/// Represents a line in the network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Line {
    #[serde(default)]
    pub c_nf_per_km: f64,
    #[serde(default = "one")]
    pub df: f64,
    pub from_bus: i64,
    pub to_bus: i64,
    #[serde(default)]
    pub g_us_per_km: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
    pub length_km: f64,
    pub max_i_ka: f64,
    #[serde(default)]
    pub max_loading_percent: Option<f64>,
    #[serde(default = "one_i32")]
    pub parallel: i32,
    pub r_ohm_per_km: f64,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    pub x_ohm_per_km: f64,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
    #[serde(default)]
    pub std_type: Option<String>,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            c_nf_per_km: 0.0,
            df: 1.0,
            from_bus: 0,
            to_bus: 0,
            g_us_per_km: 0.0,
            in_service: true,
            length_km: 1.0,
            max_i_ka: 1.0,
            max_loading_percent: None,
            parallel: 1,
            r_ohm_per_km: 0.0,
            type_: Some("ol".to_string()),
            x_ohm_per_km: 0.0,
            name: None,
            std_type: None,
        }
    }
}

/// Represents a two-winding transformer in the network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Transformer {
    #[serde(default = "one")]
    pub df: f64,
    pub hv_bus: i64,
    #[serde(default)]
    pub i0_percent: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
    pub lv_bus: i64,
    #[serde(default)]
    pub max_loading_percent: Option<f64>,
    #[serde(default = "one_i32")]
    pub parallel: i32,
    #[serde(default)]
    pub pfe_kw: f64,
    #[serde(default)]
    pub shift_degree: f64,
    pub sn_mva: f64,
    #[serde(default)]
    pub tap_phase_shifter: bool,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    pub vk_percent: f64,
    #[serde(default)]
    pub vkr_percent: f64,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
    #[serde(default)]
    pub std_type: Option<String>,
    #[serde(default)]
    pub tap_side: Option<String>,
    #[serde(default)]
    pub tap_neutral: Option<f64>,
    #[serde(default)]
    pub tap_max: Option<f64>,
    #[serde(default)]
    pub tap_pos: Option<f64>,
    #[serde(default)]
    pub tap_min: Option<f64>,
    #[serde(default)]
    pub tap_step_degree: Option<f64>,
    #[serde(default)]
    pub tap_step_percent: Option<f64>,
}

impl Default for Transformer {
    fn default() -> Self {
        Self {
            df: 1.0,
            hv_bus: 0,
            i0_percent: 0.0,
            in_service: true,
            lv_bus: 0,
            max_loading_percent: None,
            parallel: 1,
            pfe_kw: 0.0,
            shift_degree: 0.0,
            sn_mva: 1.0,
            tap_phase_shifter: false,
            vn_hv_kv: 1.0,
            vn_lv_kv: 1.0,
            vk_percent: 0.0,
            vkr_percent: 0.0,
            name: None,
            std_type: None,
            tap_side: None,
            tap_neutral: None,
            tap_max: None,
            tap_pos: None,
            tap_min: None,
            tap_step_degree: None,
            tap_step_percent: None,
        }
    }
}

/// Represents an external grid (slack bus) in the network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtGrid {
    pub bus: i64,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(default)]
    pub va_degree: f64,
    #[serde(default = "one")]
    pub vm_pu: f64,
    #[serde(default)]
    pub max_p_mw: Option<f64>,
    #[serde(default)]
    pub min_p_mw: Option<f64>,
    #[serde(default)]
    pub max_q_mvar: Option<f64>,
    #[serde(default)]
    pub min_q_mvar: Option<f64>,
    #[serde(default = "one", deserialize_with = "nan_as_default")]
    pub slack_weight: f64,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
}

impl Default for ExtGrid {
    fn default() -> Self {
        Self {
            bus: 0,
            in_service: true,
            va_degree: 0.0,
            vm_pu: 1.0,
            max_p_mw: None,
            min_p_mw: None,
            max_q_mvar: None,
            min_q_mvar: None,
            slack_weight: 1.0,
            name: None,
        }
    }
}

/// Represents a static generator, modelled as a negative PQ load.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SGen {
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    #[serde(default)]
    pub q_mvar: f64,
    #[serde(default)]
    pub sn_mva: Option<f64>,
    #[serde(default = "one")]
    pub scaling: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(default)]
    pub current_source: bool,
    #[serde(default)]
    pub controllable: Option<bool>,
}

/// Represents a shunt in the network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Shunt {
    pub bus: i64,
    #[serde(default)]
    pub q_mvar: f64,
    #[serde(default)]
    pub p_mw: f64,
    pub vn_kv: f64,
    #[serde(default = "one_i32")]
    pub step: i32,
    #[serde(default = "one_i32")]
    pub max_step: i32,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
}

/// A pandapower network: one vector per element table.
///
/// Elements are addressed by their position in the vector. Buses are
/// referenced by their `index` field.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Network {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub r#gen: Vec<Gen>,
    pub bus: Vec<Bus>,
    #[serde(default)]
    pub load: Vec<Load>,
    #[serde(default)]
    pub line: Vec<Line>,
    #[serde(default)]
    pub trafo: Vec<Transformer>,
    #[serde(default)]
    pub shunt: Vec<Shunt>,
    #[serde(default)]
    pub ext_grid: Vec<ExtGrid>,
    #[serde(default)]
    pub sgen: Vec<SGen>,
    pub f_hz: f64,
    pub sn_mva: f64,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            name: None,
            r#gen: Vec::new(),
            bus: Vec::new(),
            load: Vec::new(),
            line: Vec::new(),
            trafo: Vec::new(),
            shunt: Vec::new(),
            ext_grid: Vec::new(),
            sgen: Vec::new(),
            f_hz: 60.0,
            sn_mva: 100.0,
        }
    }
}

/// Parses one pandapower CSV table. pandas writes booleans as `True`/`False`.
fn parse_csv_table<T: DeserializeOwned>(table: &str, content: &str) -> Result<Vec<T>, IoError> {
    let content = content.replace("True", "true").replace("False", "false");
    let mut rdr = ReaderBuilder::new().from_reader(content.as_bytes());
    let headers = rdr.headers()?.to_owned();
    // pandas writes the frame index as an unnamed first column
    let headers = csv::StringRecord::from(
        headers
            .iter()
            .map(|h| if h.is_empty() { "index" } else { h })
            .collect::<Vec<_>>(),
    );
    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let record = row
            .deserialize(Some(&headers))
            .map_err(|e| IoError::Malformed {
                table: table.to_string(),
                what: e.to_string(),
            })?;
        records.push(record);
    }
    Ok(records)
}

/// Reads a CSV table from a map of file contents; absent tables are empty.
fn csv_from_map<T: DeserializeOwned>(
    map: &HashMap<String, String>,
    key: &str,
) -> Result<Vec<T>, IoError> {
    match map.get(key) {
        Some(content) => parse_csv_table(key, content),
        None => Ok(Vec::new()),
    }
}

/// Macro to read network data from csv contents held in a map.
macro_rules! read_csv_network {
    ($net:ident, $map:ident, { $($field:ident: $file:expr),* $(,)? }) => {
        $(
            $net.$field = csv_from_map(&$map, $file)?;
        )*
    };
}

/// Macro to read network data from a json key.
macro_rules! read_json_network {
    ($net:ident, $map:ident, { $($field:ident: $key:expr),* $(,)? }) => {
        $(
            $net.$field = load_pandapower_element_json(&$map, $key)?;
        )*
    };
}

fn network_from_csv_map(map: &HashMap<String, String>) -> Result<Network, IoError> {
    if !map.contains_key("bus.csv") {
        return Err(IoError::MissingTable("bus"));
    }
    let mut net = Network::default();
    read_csv_network!(net, map, {
        bus: "bus.csv",
        r#gen: "gen.csv",
        line: "line.csv",
        shunt: "shunt.csv",
        trafo: "trafo.csv",
        ext_grid: "ext_grid.csv",
        load: "load.csv",
        sgen: "sgen.csv",
    });
    Ok(net)
}

/// Loads a folder of pandapower CSV tables (`bus.csv`, `line.csv`, ...).
pub fn load_csv_folder(folder: impl AsRef<Path>) -> Result<Network, IoError> {
    let folder = folder.as_ref();
    let mut map = HashMap::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            map.insert(name.to_owned(), fs::read_to_string(&path)?);
        }
    }
    network_from_csv_map(&map)
}

/// Loads a network from a ZIP file containing CSV files.
pub fn load_csv_zip(name: impl AsRef<Path>) -> Result<Network, IoError> {
    let f = File::open(name)?;
    let mut zip = zip::ZipArchive::new(f)?;
    let mut map = HashMap::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        if file.is_file() {
            let mut s = String::with_capacity(file.size() as usize);
            file.read_to_string(&mut s)?;
            let name = file.name().rsplit('/').next().unwrap_or_default().to_owned();
            map.insert(name, s);
        }
    }
    network_from_csv_map(&map)
}

fn malformed(table: &str, what: &str) -> IoError {
    IoError::Malformed {
        table: table.to_string(),
        what: what.to_string(),
    }
}

/// Decodes one pandas `split` frame stored under `<key>._object`.
fn load_pandapower_element_json<T: DeserializeOwned>(
    object: &Map<String, Value>,
    key: &str,
) -> Result<Vec<T>, IoError> {
    let Some(element) = object
        .get(key)
        .and_then(|v| v.as_object())
        .and_then(|v| v.get("_object"))
    else {
        return Ok(Vec::new());
    };
    let frame: Map<String, Value> = match element {
        Value::String(s) => serde_json::from_str(s)?,
        Value::Object(m) => m.clone(),
        _ => return Err(malformed(key, "frame is neither a string nor an object")),
    };

    let headers = frame
        .get("columns")
        .and_then(|v| v.as_array())
        .ok_or_else(|| malformed(key, "missing `columns`"))?;
    let rows = frame
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| malformed(key, "missing `data`"))?;
    let index = frame.get("index").and_then(|v| v.as_array());

    let mut elements = Vec::with_capacity(rows.len());
    for (pos, row) in rows.iter().enumerate() {
        let row = row
            .as_array()
            .ok_or_else(|| malformed(key, "row is not an array"))?;
        let mut obj = Map::new();
        for (k, v) in headers.iter().zip(row.iter()) {
            if let Some(k) = k.as_str() {
                obj.insert(k.to_string(), v.clone());
            }
        }
        let idx = index
            .and_then(|ix| ix.get(pos))
            .cloned()
            .unwrap_or_else(|| Value::from(pos as i64));
        obj.insert("index".to_string(), idx);

        let elem: T = serde_json::from_value(Value::Object(obj))
            .map_err(|e| malformed(key, &e.to_string()))?;
        elements.push(elem);
    }
    Ok(elements)
}

/// Parses a network written by `pandapower.to_json`.
pub fn load_pandapower_json_str(content: &str) -> Result<Network, IoError> {
    let map: Map<String, Value> = serde_json::from_str(content)?;
    let object = map
        .get("_object")
        .and_then(|v| v.as_object())
        .ok_or_else(|| malformed("_object", "top level `_object` missing"))?;

    let mut net = Network::default();
    read_json_network!(net, object, {
        bus: "bus",
        r#gen: "gen",
        line: "line",
        shunt: "shunt",
        trafo: "trafo",
        ext_grid: "ext_grid",
        load: "load",
        sgen: "sgen",
    });
    if net.bus.is_empty() {
        return Err(IoError::MissingTable("bus"));
    }
    if let Some(f) = object.get("f_hz").and_then(|v| v.as_f64()) {
        net.f_hz = f;
    }
    if let Some(s) = object.get("sn_mva").and_then(|v| v.as_f64()) {
        net.sn_mva = s;
    }
    net.name = object
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    Ok(net)
}

/// Loads a network written by `pandapower.to_json`.
pub fn load_pandapower_json(file_path: impl AsRef<Path>) -> Result<Network, IoError> {
    let content = fs::read_to_string(file_path)?;
    load_pandapower_json_str(&content)
}

/// Loads a case from a pandapower JSON file, a CSV folder or a zipped CSV folder.
pub fn load_case(path: impl AsRef<Path>) -> Result<Network, IoError> {
    let path = path.as_ref();
    if path.is_dir() {
        return load_csv_folder(path);
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("zip") => load_csv_zip(path),
        _ => load_pandapower_json(path),
    }
}
