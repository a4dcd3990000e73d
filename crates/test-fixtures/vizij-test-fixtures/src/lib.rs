use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    sharing: HashMap<String, SharingEntry>,
}

#[derive(Debug, Deserialize)]
struct SharingEntry {
    setup: String,
    #[serde(default)]
    assets: Option<String>,
}

/// Mesh names and clip lengths a fixture setup refers to.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AssetTable {
    #[serde(default)]
    pub meshes: Vec<String>,
    #[serde(default)]
    pub clips: HashMap<String, f32>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod sharing {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.sharing.keys().cloned().collect()
    }

    pub fn setup_json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.sharing, "sharing", name)?;
        read_to_string(&entry.setup)
    }

    pub fn setup<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.sharing, "sharing", name)?;
        super::load_json(&entry.setup)
    }

    /// Asset table of a setup; empty when the manifest lists none.
    pub fn assets(name: &str) -> Result<AssetTable> {
        let entry = lookup(&MANIFEST.sharing, "sharing", name)?;
        match &entry.assets {
            Some(rel) => super::load_json(rel),
            None => Ok(AssetTable::default()),
        }
    }

    pub fn setup_path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.sharing, "sharing", name)?;
        Ok(resolve_path(&entry.setup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_entries_resolve() {
        for key in sharing::keys() {
            let path = sharing::setup_path(&key).unwrap();
            assert!(path.exists(), "missing setup for {key}");
            let value: serde_json::Value = sharing::setup(&key).unwrap();
            assert!(value.get("skeletons").is_some());
        }
    }

    #[test]
    fn crowd_assets_list_clips() {
        let assets = sharing::assets("crowd").unwrap();
        assert!(assets.meshes.iter().any(|m| m == "crowd_mesh"));
        assert_eq!(assets.clips.get("wave"), Some(&2.0));
    }

    #[test]
    fn unknown_fixture_is_an_error() {
        assert!(sharing::setup_json("nope").is_err());
    }
}
