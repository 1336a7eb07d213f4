//! Profile entities handed out by the [`ProfileStore`](crate::ProfileStore).

use std::fmt;
use std::rc::{Rc, Weak};

use crate::engine::{ColorSpace, DeviceClass, ProfileHandle};
use crate::{IccError, IccResult};

/// Fields of the 128-byte ICC header the caches care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IccHeader {
    /// Device class, if the signature is known.
    pub device_class: Option<DeviceClass>,
    /// Data colour space.
    pub color_space: ColorSpace,
    /// Profile connection space.
    pub pcs: ColorSpace,
    /// Creation date: year, month, day, hour, minute, second.
    pub created: [u16; 6],
    /// MD5 profile ID; all zero when the writer did not compute one.
    pub profile_id: [u8; 16],
}

impl IccHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 128;

    /// Parses the header of raw ICC bytes.
    pub fn parse(data: &[u8]) -> IccResult<Self> {
        if data.len() < Self::SIZE {
            return Err(IccError::ProfileOpen(format!(
                "{} bytes is shorter than an ICC header",
                data.len()
            )));
        }
        if &data[36..40] != b"acsp" {
            return Err(IccError::ProfileOpen("missing 'acsp' signature".into()));
        }
        let be32 = |at: usize| u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let be16 = |at: usize| u16::from_be_bytes([data[at], data[at + 1]]);
        let mut created = [0u16; 6];
        for (i, field) in created.iter_mut().enumerate() {
            *field = be16(24 + 2 * i);
        }
        let mut profile_id = [0u8; 16];
        profile_id.copy_from_slice(&data[84..100]);
        Ok(Self {
            device_class: DeviceClass::from_signature(be32(12)),
            color_space: ColorSpace::from_signature(be32(16)),
            pcs: ColorSpace::from_signature(be32(20)),
            created,
            profile_id,
        })
    }

    /// Whether the writer stored an MD5 profile ID.
    pub fn has_profile_id(&self) -> bool {
        self.profile_id.iter().any(|b| *b != 0)
    }
}

/// Identity key of a parsed profile: description, creation date and,
/// when present, the profile ID.
pub(crate) fn identity_key(description: &str, header: &IccHeader) -> String {
    let [y, mo, d, h, mi, s] = header.created;
    let mut key = format!("{description}|{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}");
    if header.has_profile_id() {
        key.push('|');
        for b in header.profile_id {
            key.push_str(&format!("{b:02x}"));
        }
    }
    key
}

/// Reads the description tag, falling back to the model name.
pub(crate) fn read_description(data: &[u8]) -> String {
    let Ok(profile) = lcms2::Profile::new_icc(data) else {
        return String::new();
    };
    [lcms2::InfoType::Description, lcms2::InfoType::Model]
        .into_iter()
        .filter_map(|info| profile.info(info, lcms2::Locale::none()))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// A profile as stored: engine handle plus the raw bytes it came from.
#[derive(Debug)]
pub(crate) struct ProfileEntry {
    pub(crate) key: Rc<str>,
    pub(crate) handle: ProfileHandle,
    pub(crate) data: Vec<u8>,
    pub(crate) header: IccHeader,
    pub(crate) description: String,
}

/// Shared, non-owning reference to a registered profile.
///
/// Cloning a `Profile` does not change its reference count; use
/// [`ProfileStore::duplicate`](crate::ProfileStore::duplicate) for that.
/// Once the store removes the entry the reference is stale: metadata stays
/// readable, but store operations reject it.
#[derive(Clone)]
pub struct Profile {
    pub(crate) entry: Weak<ProfileEntry>,
    key: Rc<str>,
    color_space: ColorSpace,
    device_class: Option<DeviceClass>,
    description: Rc<str>,
}

impl Profile {
    pub(crate) fn new(entry: &Rc<ProfileEntry>) -> Self {
        Self {
            entry: Rc::downgrade(entry),
            key: entry.key.clone(),
            color_space: entry.header.color_space,
            device_class: entry.header.device_class,
            description: entry.description.as_str().into(),
        }
    }

    /// Identity key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Data colour space.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Device class, if known.
    pub fn device_class(&self) -> Option<DeviceClass> {
        self.device_class
    }

    /// Profile description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether both references point at the same stored entity.
    pub fn same_entity(&self, other: &Profile) -> bool {
        Weak::ptr_eq(&self.entry, &other.entry)
    }

    pub(crate) fn upgrade(&self) -> Option<Rc<ProfileEntry>> {
        self.entry.upgrade()
    }
}

impl PartialEq for Profile {
    fn eq(&self, other: &Self) -> bool {
        self.same_entity(other)
    }
}

impl Eq for Profile {}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("key", &self.key)
            .field("color_space", &self.color_space)
            .field("alive", &(self.entry.strong_count() > 0))
            .finish()
    }
}

/// Descriptive strings of a profile, for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileInfo {
    /// Description tag.
    pub description: String,
    /// Manufacturer tag.
    pub manufacturer: String,
    /// Model tag.
    pub model: String,
    /// Copyright tag.
    pub copyright: String,
    /// Profile connection space.
    pub pcs: String,
    /// Data colour space.
    pub color_space: String,
    /// One name per colour channel, then `Alpha`.
    pub channel_names: Vec<String>,
    /// Device class.
    pub device_class: String,
}

impl ProfileInfo {
    pub(crate) fn from_entry(entry: &ProfileEntry) -> Self {
        let text = |kind: lcms2::InfoType| {
            lcms2::Profile::new_icc(&entry.data)
                .ok()
                .and_then(|p| p.info(kind, lcms2::Locale::none()))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let mut channel_names = entry.header.color_space.channel_names();
        channel_names.push("Alpha".into());
        Self {
            description: entry.description.clone(),
            manufacturer: text(lcms2::InfoType::Manufacturer),
            model: text(lcms2::InfoType::Model),
            copyright: text(lcms2::InfoType::Copyright),
            pcs: entry.header.pcs.name(),
            color_space: entry.header.color_space.name(),
            channel_names,
            device_class: entry
                .header
                .device_class
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "unknown".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuiltinProfile;

    #[test]
    fn test_header_of_srgb() {
        let data = BuiltinProfile::Srgb.to_icc().unwrap();
        let header = IccHeader::parse(&data).unwrap();
        assert_eq!(header.color_space, ColorSpace::Rgb);
        assert_eq!(header.pcs, ColorSpace::Xyz);
        assert_eq!(header.device_class, Some(DeviceClass::Display));
    }

    #[test]
    fn test_header_rejects_junk() {
        assert!(IccHeader::parse(&[0u8; 20]).is_err());
        assert!(IccHeader::parse(&[0u8; 200]).is_err());
    }

    #[test]
    fn test_identity_key_includes_date() {
        let data = BuiltinProfile::Srgb.to_icc().unwrap();
        let header = IccHeader::parse(&data).unwrap();
        let key = identity_key("sRGB", &header);
        assert!(key.starts_with("sRGB|"));
        assert!(key.contains('T'));
    }

    #[test]
    fn test_description_read() {
        let data = BuiltinProfile::Srgb.to_icc().unwrap();
        assert!(!read_description(&data).is_empty());
    }
}
