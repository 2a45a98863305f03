//! Key profiles
//!
//! A profile is the full set of keys and IVs one environment needs to
//! process KELF containers. Key bytes are wiped on drop.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CommandError;

/// Environment a key set belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ProfileKind {
    Retail,
    Dev,
    Proto,
    Arcade,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 4] = [
        ProfileKind::Retail,
        ProfileKind::Dev,
        ProfileKind::Proto,
        ProfileKind::Arcade,
    ];

    /// Map a keystore section name (exact, case-sensitive)
    pub fn from_section(name: &str) -> Option<Self> {
        match name {
            "Retail" => Some(ProfileKind::Retail),
            "Dev" => Some(ProfileKind::Dev),
            "Proto" => Some(ProfileKind::Proto),
            "Arcade" => Some(ProfileKind::Arcade),
            _ => None,
        }
    }

    /// Map a `-k` flag value (exact, lowercase)
    pub fn from_flag(token: &str) -> Option<Self> {
        match token {
            "retail" => Some(ProfileKind::Retail),
            "dev" => Some(ProfileKind::Dev),
            "proto" => Some(ProfileKind::Proto),
            "arcade" => Some(ProfileKind::Arcade),
            _ => None,
        }
    }

    pub fn section_name(self) -> &'static str {
        match self {
            ProfileKind::Retail => "Retail",
            ProfileKind::Dev => "Dev",
            ProfileKind::Proto => "Proto",
            ProfileKind::Arcade => "Arcade",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section_name())
    }
}

impl FromStr for ProfileKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_flag(s).ok_or_else(|| CommandError::UnknownProfileKind(s.to_string()))
    }
}

/// Container header template selected for encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeaderKind {
    /// Retail memory cards
    FreeMcBoot,
    /// Retail HDD (HDD OSD / BB Navigator)
    FreeHDBoot,
    /// Retail HDD, MBR injection
    MBR,
    /// Arcade memory cards
    BootMcCade,
}

impl HeaderKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "fmcb" => Some(HeaderKind::FreeMcBoot),
            "fhdb" => Some(HeaderKind::FreeHDBoot),
            "mbr" => Some(HeaderKind::MBR),
            "bmcc" => Some(HeaderKind::BootMcCade),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            HeaderKind::FreeMcBoot => "fmcb",
            HeaderKind::FreeHDBoot => "fhdb",
            HeaderKind::MBR => "mbr",
            HeaderKind::BootMcCade => "bmcc",
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One named key slot in a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    SignatureMasterKey,
    SignatureHashKey,
    KbitMasterKey,
    KbitIv,
    KcMasterKey,
    KcIv,
    RootSignatureMasterKey,
    RootSignatureHashKey,
    ContentTableIv,
    ContentIv,
    ArcadeKbit,
    ArcadeKc,
}

/// Keystore key names, the field each fills, and whether the key is only
/// read inside the Arcade section
pub const KEY_TABLE: [(&str, KeyField, bool); 12] = [
    ("MG_SIG_MASTER_KEY", KeyField::SignatureMasterKey, false),
    ("MG_SIG_HASH_KEY", KeyField::SignatureHashKey, false),
    ("MG_KBIT_MASTER_KEY", KeyField::KbitMasterKey, false),
    ("MG_KBIT_IV", KeyField::KbitIv, false),
    ("MG_KC_MASTER_KEY", KeyField::KcMasterKey, false),
    ("MG_KC_IV", KeyField::KcIv, false),
    ("MG_ROOTSIG_MASTER_KEY", KeyField::RootSignatureMasterKey, false),
    ("MG_ROOTSIG_HASH_KEY", KeyField::RootSignatureHashKey, false),
    ("MG_CONTENT_TABLE_IV", KeyField::ContentTableIv, false),
    ("MG_CONTENT_IV", KeyField::ContentIv, false),
    ("ARCADE_KBIT", KeyField::ArcadeKbit, true),
    ("ARCADE_KC", KeyField::ArcadeKc, true),
];

impl KeyField {
    /// Look up the field a keystore key fills in a section of `kind`
    pub fn for_key(name: &str, kind: ProfileKind) -> Option<Self> {
        KEY_TABLE
            .iter()
            .find(|(key, _, arcade_only)| {
                *key == name && (!*arcade_only || kind == ProfileKind::Arcade)
            })
            .map(|(_, field, _)| *field)
    }

    pub fn key_name(self) -> &'static str {
        KEY_TABLE
            .iter()
            .find(|(_, field, _)| *field == self)
            .map(|(key, _, _)| *key)
            .unwrap_or("?")
    }

    /// Whether a profile of `kind` must carry this field
    pub fn required_for(self, kind: ProfileKind) -> bool {
        match self {
            KeyField::ArcadeKbit | KeyField::ArcadeKc => kind == ProfileKind::Arcade,
            _ => true,
        }
    }
}

/// Key material for one profile kind
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyProfile {
    #[zeroize(skip)]
    kind: ProfileKind,
    signature_master_key: Vec<u8>,
    signature_hash_key: Vec<u8>,
    kbit_master_key: Vec<u8>,
    kbit_iv: Vec<u8>,
    kc_master_key: Vec<u8>,
    kc_iv: Vec<u8>,
    root_signature_master_key: Vec<u8>,
    root_signature_hash_key: Vec<u8>,
    content_table_iv: Vec<u8>,
    content_iv: Vec<u8>,
    arcade_kbit: Vec<u8>,
    arcade_kc: Vec<u8>,
}

impl KeyProfile {
    /// Empty profile, filled in by the loader
    pub(crate) fn empty(kind: ProfileKind) -> Self {
        Self {
            kind,
            signature_master_key: Vec::new(),
            signature_hash_key: Vec::new(),
            kbit_master_key: Vec::new(),
            kbit_iv: Vec::new(),
            kc_master_key: Vec::new(),
            kc_iv: Vec::new(),
            root_signature_master_key: Vec::new(),
            root_signature_hash_key: Vec::new(),
            content_table_iv: Vec::new(),
            content_iv: Vec::new(),
            arcade_kbit: Vec::new(),
            arcade_kc: Vec::new(),
        }
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    /// Bytes stored for `field`
    pub fn get(&self, field: KeyField) -> &[u8] {
        match field {
            KeyField::SignatureMasterKey => &self.signature_master_key,
            KeyField::SignatureHashKey => &self.signature_hash_key,
            KeyField::KbitMasterKey => &self.kbit_master_key,
            KeyField::KbitIv => &self.kbit_iv,
            KeyField::KcMasterKey => &self.kc_master_key,
            KeyField::KcIv => &self.kc_iv,
            KeyField::RootSignatureMasterKey => &self.root_signature_master_key,
            KeyField::RootSignatureHashKey => &self.root_signature_hash_key,
            KeyField::ContentTableIv => &self.content_table_iv,
            KeyField::ContentIv => &self.content_iv,
            KeyField::ArcadeKbit => &self.arcade_kbit,
            KeyField::ArcadeKc => &self.arcade_kc,
        }
    }

    fn slot_mut(&mut self, field: KeyField) -> &mut Vec<u8> {
        match field {
            KeyField::SignatureMasterKey => &mut self.signature_master_key,
            KeyField::SignatureHashKey => &mut self.signature_hash_key,
            KeyField::KbitMasterKey => &mut self.kbit_master_key,
            KeyField::KbitIv => &mut self.kbit_iv,
            KeyField::KcMasterKey => &mut self.kc_master_key,
            KeyField::KcIv => &mut self.kc_iv,
            KeyField::RootSignatureMasterKey => &mut self.root_signature_master_key,
            KeyField::RootSignatureHashKey => &mut self.root_signature_hash_key,
            KeyField::ContentTableIv => &mut self.content_table_iv,
            KeyField::ContentIv => &mut self.content_iv,
            KeyField::ArcadeKbit => &mut self.arcade_kbit,
            KeyField::ArcadeKc => &mut self.arcade_kc,
        }
    }

    /// Replace a slot, wiping whatever it held before
    pub(crate) fn set(&mut self, field: KeyField, bytes: Vec<u8>) {
        let slot = self.slot_mut(field);
        slot.zeroize();
        *slot = bytes;
    }

    /// Key names this profile still lacks, in table order
    pub fn missing(&self) -> Vec<&'static str> {
        KEY_TABLE
            .iter()
            .filter(|(_, field, _)| field.required_for(self.kind) && self.get(*field).is_empty())
            .map(|(key, _, _)| *key)
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn signature_master_key(&self) -> &[u8] {
        &self.signature_master_key
    }

    pub fn signature_hash_key(&self) -> &[u8] {
        &self.signature_hash_key
    }

    pub fn kbit_master_key(&self) -> &[u8] {
        &self.kbit_master_key
    }

    pub fn kbit_iv(&self) -> &[u8] {
        &self.kbit_iv
    }

    pub fn kc_master_key(&self) -> &[u8] {
        &self.kc_master_key
    }

    pub fn kc_iv(&self) -> &[u8] {
        &self.kc_iv
    }

    pub fn root_signature_master_key(&self) -> &[u8] {
        &self.root_signature_master_key
    }

    pub fn root_signature_hash_key(&self) -> &[u8] {
        &self.root_signature_hash_key
    }

    pub fn content_table_iv(&self) -> &[u8] {
        &self.content_table_iv
    }

    pub fn content_iv(&self) -> &[u8] {
        &self.content_iv
    }

    /// Empty unless `kind` is Arcade
    pub fn arcade_kbit(&self) -> &[u8] {
        &self.arcade_kbit
    }

    /// Empty unless `kind` is Arcade
    pub fn arcade_kc(&self) -> &[u8] {
        &self.arcade_kc
    }
}

// Never print key bytes
impl fmt::Debug for KeyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("KeyProfile");
        s.field("kind", &self.kind);
        for (key, field, _) in KEY_TABLE.iter() {
            s.field(key, &format_args!("<{} bytes>", self.get(*field).len()));
        }
        s.finish()
    }
}
