use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

const ACCESS_LOG_MARKER: &str = "ubuntu.com-access.log-";
const ACCESS_LOG_EXTENSION: &str = ".gz";
const MEASUREMENT_PREFIX: &str = "iso_";

/// Returns `true` for file names like
/// `releases.ubuntu.com-access.log-20190310.anonymised.gz`.
pub fn is_access_log(file_name: &str) -> bool {
    file_name
        .split_once(ACCESS_LOG_MARKER)
        .is_some_and(|(_, rest)| rest.ends_with(ACCESS_LOG_EXTENSION))
}

/// The server, mirror and date that a single access log file belongs to.
///
/// Log files are stored as `<server>-<bucket suffix>/<mirror>/<file name>`,
/// with the date embedded in the file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogUnit {
    pub server: String,
    pub mirror: String,
    pub date: NaiveDate,
}

impl LogUnit {
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name().and_then(OsStr::to_str)?;
        let mirror_dir = path.parent()?;
        let mirror = mirror_dir.file_name().and_then(OsStr::to_str)?;
        let server_dir = mirror_dir.parent()?.file_name().and_then(OsStr::to_str)?;
        let server = server_dir.split('-').next()?;

        if server.is_empty() || mirror.is_empty() {
            return None;
        }

        Some(Self {
            server: server.to_string(),
            mirror: mirror.to_string(),
            date: parse_date(file_name)?,
        })
    }

    /// The InfluxDB measurement that the downloads of this server are
    /// stored in.
    pub fn measurement(&self) -> String {
        format!("{MEASUREMENT_PREFIX}{}", self.server)
    }

    /// The log date at midnight UTC.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.date.and_time(NaiveTime::MIN).and_utc()
    }
}

impl fmt::Display for LogUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.server, self.mirror, self.date.format("%Y%m%d"))
    }
}

/// Parses the `YYYYMMDD` token that follows `access.log-` in the file name.
fn parse_date(file_name: &str) -> Option<NaiveDate> {
    let (_, rest) = file_name.split_once("access.log-")?;
    let token = rest.split('.').next()?;
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year = token[..4].parse().ok()?;
    let month = token[4..6].parse().ok()?;
    let day = token[6..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
