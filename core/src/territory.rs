//! Territory lookup: the four fixed geographic groupings of branches,
//! the registered point-of-service names, and head-office detection.
//!
//! The built-in table covers the current network; `territories.json` in
//! the data directory can extend or override it without a rebuild. A
//! missing file is not an error, a malformed one is.

use std::collections::{BTreeMap, HashMap};

use log::info;
use serde::Deserialize;

use crate::matching::normalize_name;

/// Branch code of the head-office (grand compte) account.
pub const HEAD_OFFICE_CODE: &str = "526";

/// Name variants the head office shows up under.
const HEAD_OFFICE_NAMES: [&str; 3] = ["GRAND COMPTE", "AGENCE GRAND COMPTE", "GRAND COMPTES"];

/// The grand compte is excluded from every territory and reported
/// standalone; detection is by branch code or known name variant.
pub fn is_head_office(name: &str, branch_code: Option<&str>) -> bool {
    if branch_code == Some(HEAD_OFFICE_CODE) {
        return true;
    }
    HEAD_OFFICE_NAMES.contains(&normalize_name(name).as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Territory {
    DakarVille,
    DakarBanlieue,
    ProvinceCentreSud,
    ProvinceNord,
}

/// Where unmapped agencies land, with a logged warning.
pub const DEFAULT_TERRITORY: Territory = Territory::DakarVille;

impl Territory {
    pub fn all() -> [Territory; 4] {
        [
            Territory::DakarVille,
            Territory::DakarBanlieue,
            Territory::ProvinceCentreSud,
            Territory::ProvinceNord,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            Territory::DakarVille => "territoire_dakar_ville",
            Territory::DakarBanlieue => "territoire_dakar_banlieue",
            Territory::ProvinceCentreSud => "territoire_province_centre_sud",
            Territory::ProvinceNord => "territoire_province_nord",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Territory::DakarVille => "TERRITOIRE DAKAR VILLE",
            Territory::DakarBanlieue => "TERRITOIRE DAKAR BANLIEUE",
            Territory::ProvinceCentreSud => "TERRITOIRE PROVINCE CENTRE SUD",
            Territory::ProvinceNord => "TERRITOIRE PROVINCE NORD",
        }
    }

    pub fn from_key(key: &str) -> Option<Territory> {
        Territory::all().into_iter().find(|t| t.key() == key)
    }
}

// File shape for territories.json: every section optional.
#[derive(Debug, Clone, Deserialize)]
struct TerritoriesFile {
    branch_codes: Option<HashMap<String, String>>,
    agency_names: Option<HashMap<String, String>>,
    service_points: Option<Vec<String>>,
    territory_names: Option<BTreeMap<String, String>>,
}

/// The static lookup collaborator: branch code → territory, normalized
/// agency name → territory, registered service-point names, and the
/// territory-key → display-name map the reducer validates against.
pub struct TerritoryMap {
    by_code: HashMap<String, Territory>,
    by_name: HashMap<String, Territory>,
    service_points: Vec<String>,
    names: BTreeMap<String, String>,
}

impl TerritoryMap {
    /// The built-in network table.
    pub fn builtin() -> Self {
        let codes: &[(&str, Territory)] = &[
            ("001", Territory::DakarVille),
            ("002", Territory::DakarVille),
            ("003", Territory::DakarVille),
            ("004", Territory::DakarVille),
            ("005", Territory::DakarVille),
            ("011", Territory::DakarBanlieue),
            ("012", Territory::DakarBanlieue),
            ("013", Territory::DakarBanlieue),
            ("014", Territory::DakarBanlieue),
            ("015", Territory::DakarBanlieue),
            ("021", Territory::ProvinceCentreSud),
            ("022", Territory::ProvinceCentreSud),
            ("023", Territory::ProvinceCentreSud),
            ("024", Territory::ProvinceCentreSud),
            ("025", Territory::ProvinceCentreSud),
            ("031", Territory::ProvinceNord),
            ("032", Territory::ProvinceNord),
            ("033", Territory::ProvinceNord),
            ("034", Territory::ProvinceNord),
        ];
        let agency_names: &[(&str, Territory)] = &[
            ("DAKAR PLATEAU", Territory::DakarVille),
            ("MEDINA", Territory::DakarVille),
            ("POINT E", Territory::DakarVille),
            ("SANDAGA", Territory::DakarVille),
            ("GRAND DAKAR", Territory::DakarVille),
            ("PIKINE", Territory::DakarBanlieue),
            ("GUEDIAWAYE", Territory::DakarBanlieue),
            ("RUFISQUE", Territory::DakarBanlieue),
            ("KEUR MASSAR", Territory::DakarBanlieue),
            ("PARCELLES ASSAINIES", Territory::DakarBanlieue),
            ("THIES", Territory::ProvinceCentreSud),
            ("MBOUR", Territory::ProvinceCentreSud),
            ("KAOLACK", Territory::ProvinceCentreSud),
            ("ZIGUINCHOR", Territory::ProvinceCentreSud),
            ("DIOURBEL", Territory::ProvinceCentreSud),
            ("SAINT-LOUIS", Territory::ProvinceNord),
            ("LOUGA", Territory::ProvinceNord),
            ("MATAM", Territory::ProvinceNord),
            ("RICHARD-TOLL", Territory::ProvinceNord),
        ];
        let service_points = [
            "SACRE COEUR",
            "LIBERTE 6",
            "OUEST FOIRE",
            "CASTORS",
            "NIARY TALLY",
        ];

        Self {
            by_code: codes
                .iter()
                .map(|(c, t)| (c.to_string(), *t))
                .collect(),
            by_name: agency_names
                .iter()
                .map(|(n, t)| (normalize_name(n), *t))
                .collect(),
            service_points: service_points.iter().map(|s| s.to_string()).collect(),
            names: Territory::all()
                .into_iter()
                .map(|t| (t.key().to_string(), t.display_name().to_string()))
                .collect(),
        }
    }

    /// Load `{data_dir}/territories.json` on top of the built-in table.
    /// Branch-code and agency-name sections extend/override the
    /// defaults; a `territory_names` section replaces the display-name
    /// map outright (the reducer validates its completeness).
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/territories.json");
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let map = Self::from_json_str(&content)
                    .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
                info!("territory map loaded from {path}");
                Ok(map)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::builtin()),
            Err(e) => Err(anyhow::anyhow!("Cannot read {path}: {e}")),
        }
    }

    /// Parse a territories.json document on top of the built-in table.
    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        let file: TerritoriesFile = serde_json::from_str(content)?;
        let mut map = Self::builtin();

        if let Some(codes) = file.branch_codes {
            for (code, key) in codes {
                let territory = Territory::from_key(&key)
                    .ok_or_else(|| anyhow::anyhow!("Unknown territory key '{key}'"))?;
                map.by_code.insert(code, territory);
            }
        }
        if let Some(names) = file.agency_names {
            for (name, key) in names {
                let territory = Territory::from_key(&key)
                    .ok_or_else(|| anyhow::anyhow!("Unknown territory key '{key}'"))?;
                map.by_name.insert(normalize_name(&name), territory);
            }
        }
        if let Some(points) = file.service_points {
            map.service_points = points;
        }
        if let Some(names) = file.territory_names {
            map.names = names;
        }
        Ok(map)
    }

    pub fn territory_from_branch_code(&self, code: &str) -> Option<Territory> {
        self.by_code.get(code.trim()).copied()
    }

    /// Name lookup fallback: normalized compare, tolerating an
    /// "AGENCE" prefix on the incoming name.
    pub fn territory_from_agency_name(&self, name: &str) -> Option<Territory> {
        let normalized = normalize_name(name);
        if let Some(t) = self.by_name.get(&normalized) {
            return Some(*t);
        }
        let without_prefix = normalized.strip_prefix("AGENCE ").unwrap_or(&normalized);
        self.by_name.get(without_prefix).copied()
    }

    pub fn service_point_names(&self) -> &[String] {
        &self.service_points
    }

    /// Territory key → display name, as the output envelope needs it.
    pub fn display_names(&self) -> &BTreeMap<String, String> {
        &self.names
    }
}
