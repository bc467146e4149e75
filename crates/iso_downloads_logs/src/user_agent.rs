use std::fmt;

/// The bare user agent that the Raspberry Pi Imager sends.
const GENERIC_BROWSER_USER_AGENT: &str = "Mozilla/5.0";

/// A download client recognized from the request signature.
///
/// This is informational only and does not affect how downloads are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientTag {
    RaspberryPiImager,
}

impl ClientTag {
    /// Detects the client from the user agent and the image subarchitecture.
    ///
    /// The Raspberry Pi Imager does not identify itself, but it is the only
    /// client that downloads `raspi` images with a bare `Mozilla/5.0` user
    /// agent.
    pub fn from_request(user_agent: &str, subarch: &str) -> Option<Self> {
        if user_agent == GENERIC_BROWSER_USER_AGENT && subarch.starts_with("raspi") {
            return Some(ClientTag::RaspberryPiImager);
        }

        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientTag::RaspberryPiImager => "raspi-imager",
        }
    }
}

impl fmt::Display for ClientTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the content of the quoted section that ends the line, which is the
/// user agent in the combined log format.
///
/// Returns `None` if the line doesn't end with a quote or if the section
/// contains a `#`.
pub fn trailing_user_agent(line: &str) -> Option<&str> {
    let (_, user_agent) = line.strip_suffix('"')?.rsplit_once('"')?;
    if user_agent.contains('#') {
        return None;
    }

    Some(user_agent)
}
