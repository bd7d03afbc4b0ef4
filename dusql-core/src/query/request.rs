use serde::{Deserialize, Serialize};

use crate::record::{InodeKey, InventoryRecord};
use crate::{DusqlError, Result};

/// A find/du request as received from a client
///
/// Every predicate field is optional; an absent field imposes no constraint.
/// `mtime` and `size` use the sign convention of [`Predicate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindRequest {
    /// `[device, inode]` pairs
    #[serde(default)]
    pub root_inodes: Vec<(u64, u64)>,
    #[serde(default)]
    pub gid: Option<u32>,
    #[serde(default)]
    pub not_gid: Option<u32>,
    #[serde(default)]
    pub uid: Option<u32>,
    #[serde(default)]
    pub not_uid: Option<u32>,
    #[serde(default)]
    pub mtime: Option<f64>,
    #[serde(default)]
    pub size: Option<f64>,
}

impl FindRequest {
    pub fn new(roots: impl IntoIterator<Item = InodeKey>, predicate: Predicate) -> Self {
        Self {
            root_inodes: roots.into_iter().map(|k| (k.device, k.inode)).collect(),
            gid: predicate.gid,
            not_gid: predicate.not_gid,
            uid: predicate.uid,
            not_uid: predicate.not_uid,
            mtime: predicate.mtime,
            size: predicate.size,
        }
    }

    /// Parse and validate a JSON request body
    pub fn from_json(body: &str) -> Result<Self> {
        let request: FindRequest =
            serde_json::from_str(body).map_err(|e| DusqlError::InvalidRequest(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("mtime", self.mtime), ("size", self.size)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(DusqlError::InvalidRequest(format!(
                    "{name} must be a finite number"
                )));
            }
        }
        Ok(())
    }

    pub fn roots(&self) -> Vec<InodeKey> {
        self.root_inodes
            .iter()
            .map(|&(device, inode)| InodeKey::new(device, inode))
            .collect()
    }

    pub fn predicate(&self) -> Predicate {
        Predicate {
            gid: self.gid,
            not_gid: self.not_gid,
            uid: self.uid,
            not_uid: self.not_uid,
            mtime: self.mtime,
            size: self.size,
        }
    }
}

/// Conjunction of optional clauses over a record
///
/// `mtime` and `size` carry their direction in the sign: a value `n >= 0`
/// matches records with field `>= n`, a negative value `-n` matches records
/// with field `<= n`. A clause over a null field never matches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Predicate {
    pub gid: Option<u32>,
    pub not_gid: Option<u32>,
    pub uid: Option<u32>,
    pub not_uid: Option<u32>,
    pub mtime: Option<f64>,
    pub size: Option<f64>,
}

impl Predicate {
    /// Predicate without clauses
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_unfiltered(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &InventoryRecord) -> bool {
        equals(self.gid, record.gid)
            && differs(self.not_gid, record.gid)
            && equals(self.uid, record.uid)
            && differs(self.not_uid, record.uid)
            && signed_threshold(self.mtime, record.mtime)
            && signed_threshold(self.size, record.size.map(|s| s as f64))
    }
}

fn equals(clause: Option<u32>, value: Option<u32>) -> bool {
    match clause {
        None => true,
        Some(want) => value == Some(want),
    }
}

fn differs(clause: Option<u32>, value: Option<u32>) -> bool {
    match clause {
        None => true,
        Some(unwanted) => value.is_some_and(|v| v != unwanted),
    }
}

fn signed_threshold(clause: Option<f64>, value: Option<f64>) -> bool {
    match (clause, value) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(limit), Some(v)) if limit < 0.0 => v <= -limit,
        (Some(limit), Some(v)) => v >= limit,
    }
}
