use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Looks up release codenames, like `bionic` or `focal`.
///
/// Images named by codename instead of release version (e.g.
/// `bionic-server-cloudimg-amd64.img`) are not counted.
pub trait CodenameRegistry: Send + Sync {
    fn is_known_codename(&self, token: &str) -> bool;
}

impl CodenameRegistry for HashSet<String> {
    fn is_known_codename(&self, token: &str) -> bool {
        self.contains(token)
    }
}

/// Series names known at the time of writing, used when no `distro-info`
/// data is installed.
const BUILTIN_SERIES: &[&str] = &[
    "warty", "hoary", "breezy", "dapper", "edgy", "feisty", "gutsy", "hardy", "intrepid",
    "jaunty", "karmic", "lucid", "maverick", "natty", "oneiric", "precise", "quantal", "raring",
    "saucy", "trusty", "utopic", "vivid", "wily", "xenial", "yakkety", "zesty", "artful",
    "bionic", "cosmic", "disco", "eoan", "focal", "groovy", "hirsute", "impish", "jammy",
    "kinetic", "lunar", "mantic", "noble", "oracular", "plucky", "questing", "resolute",
];

/// Ubuntu release codenames, usually read from the `distro-info-data` CSV.
#[derive(Debug, Clone)]
pub struct UbuntuCodenames(HashSet<String>);

#[derive(Debug, Deserialize)]
struct DistroInfoRow {
    series: String,
}

impl UbuntuCodenames {
    pub const DEFAULT_CSV_PATH: &'static str = "/usr/share/distro-info/ubuntu.csv";

    pub fn builtin() -> Self {
        Self(BUILTIN_SERIES.iter().map(|series| series.to_string()).collect())
    }

    /// Reads the `series` column of a `distro-info-data` CSV file.
    pub fn from_csv(reader: impl Read) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);

        let series = reader
            .deserialize::<DistroInfoRow>()
            .map(|row| row.map(|row| row.series))
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(Self(series))
    }

    /// Loads the codenames from the given CSV file, or falls back to the
    /// builtin list if the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let path_display = path.display();
        if !path.exists() {
            warn!("Falling back to builtin codename list because {path_display} does not exist");
            return Ok(Self::builtin());
        }

        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {path_display}"))?;

        let codenames =
            Self::from_csv(file).with_context(|| format!("Failed to parse {path_display}"))?;

        debug!(num_codenames = codenames.0.len(), "Loaded codenames from {path_display}");
        Ok(codenames)
    }
}

impl CodenameRegistry for UbuntuCodenames {
    fn is_known_codename(&self, token: &str) -> bool {
        self.0.contains(token)
    }
}
