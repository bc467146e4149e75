use crate::record::IsoImage;
use derive_more::Deref;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

/// The (release, architecture, flavor) combination that downloads are
/// counted for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    pub release: String,
    pub arch: String,
    pub flavor: String,
}

impl From<&IsoImage> for AggregateKey {
    fn from(image: &IsoImage) -> Self {
        Self {
            release: image.release.clone(),
            arch: image.arch.clone(),
            flavor: image.flavor.clone(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Deref)]
pub struct DownloadsMap(HashMap<AggregateKey, u64>);

impl DownloadsMap {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Increments the download count for the release, architecture and
    /// flavor of the given image.
    pub fn add(&mut self, image: &IsoImage) {
        *self.0.entry(AggregateKey::from(image)).or_default() += 1;
    }

    /// Returns a [HashSet] of all releases in the map.
    pub fn unique_releases(&self) -> HashSet<&str> {
        self.0.keys().map(|key| key.release.as_str()).collect()
    }

    /// Returns the total number of downloads across all keys.
    pub fn sum_downloads(&self) -> u64 {
        self.0.values().sum()
    }

    /// Converts the map into a vector of `(key, downloads)` tuples, sorted by
    /// release, architecture and flavor.
    pub fn into_vec(self) -> Vec<(AggregateKey, u64)> {
        let mut downloads = self.0.into_iter().collect::<Vec<_>>();
        downloads.sort();
        downloads
    }
}

impl<'a> Extend<&'a IsoImage> for DownloadsMap {
    fn extend<I: IntoIterator<Item = &'a IsoImage>>(&mut self, images: I) {
        for image in images {
            self.add(image);
        }
    }
}

impl<'a> FromIterator<&'a IsoImage> for DownloadsMap {
    fn from_iter<I: IntoIterator<Item = &'a IsoImage>>(images: I) -> Self {
        let mut downloads = DownloadsMap::new();
        downloads.extend(images);
        downloads
    }
}

/// Counts the downloads per release, architecture and flavor.
///
/// Only successfully extracted [IsoImage]s can be counted, so rejected log
/// lines never reach this stage.
pub fn aggregate<'a>(images: impl IntoIterator<Item = &'a IsoImage>) -> DownloadsMap {
    images.into_iter().collect()
}

impl Debug for DownloadsMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut downloads = self.0.iter().collect::<Vec<_>>();
        downloads.sort();

        f.write_str("DownloadsMap {\n")?;
        for (key, downloads) in downloads {
            let AggregateKey {
                release,
                arch,
                flavor,
            } = key;

            f.write_str("    ")?;
            f.write_fmt(format_args!("{release}  {arch}  {flavor} .. {downloads}"))?;
            f.write_str("\n")?;
        }
        f.write_str("}")?;

        Ok(())
    }
}
