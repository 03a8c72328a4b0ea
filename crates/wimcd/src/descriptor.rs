use std::fmt;

use anyhow::bail;

/// An artifact reference on the command line, written `name:tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub tag: String,
}

impl TryFrom<&str> for Descriptor {
    type Error = anyhow::Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let mut parts = s.trim().split(':');
        let name = parts.next().unwrap_or_default();
        let Some(tag) = parts.next() else {
            bail!("'{s}' is missing a tag, expected name:tag");
        };
        if parts.next().is_some() {
            bail!("'{s}' has too many ':' separators, expected name:tag");
        }
        if name.is_empty() || tag.is_empty() {
            bail!("'{s}' has an empty name or tag, expected name:tag");
        }
        Ok(Descriptor {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_tag() {
        let d = Descriptor::try_from("radio-ctl:v1.2").unwrap();
        assert_eq!(d.name, "radio-ctl");
        assert_eq!(d.tag, "v1.2");
        assert_eq!(d.to_string(), "radio-ctl:v1.2");
    }

    #[test]
    fn trailing_whitespace_is_tolerated() {
        assert!(Descriptor::try_from("radio-ctl:v1\n").is_ok());
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in ["radio-ctl", "radio-ctl:", ":v1", "a:b:c", ":"] {
            assert!(Descriptor::try_from(bad).is_err(), "{bad}");
        }
    }
}
