use serde::Deserialize;

/// Wire shape of the JSON label bundle served at `Config::label_bundle_url`
/// (spec §4.1, §9 "in-memory label registry ... refreshable dictionary
/// loaded from a JSON bundle").
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LabelBundle {
    #[serde(default)]
    pub addresses: Vec<BundleEntry>,
    #[serde(default)]
    pub procedures: Vec<BundleProcedure>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleEntry {
    pub address: String,
    pub label: String,
    pub kind: String,
    #[serde(default)]
    pub contract_index: Option<u16>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleProcedure {
    pub contract_address: String,
    pub input_type: u16,
    pub name: String,
}
